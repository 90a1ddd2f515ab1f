use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::{
    non_blocking,
    non_blocking::WorkerGuard,
    rolling::{RollingFileAppender, Rotation},
};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, time::UtcTime},
    prelude::*,
    EnvFilter, Registry,
};

/// The log file name for the service.
const LOG_FILE: &str = "transhla-service.log";
/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "info,transhla_service=info,transhla_inference=info";

/// Configure logging with JSON formatting, file output, and console output
///
/// The returned guard flushes the file writer on drop and must be kept alive
/// for the lifetime of the process.
///
/// # Errors
///
/// Returns an error if the logs directory cannot be created or a global
/// subscriber is already set.
pub fn setup_logging<P: AsRef<Path>>(log_dir: P) -> Result<WorkerGuard> {
    std::fs::create_dir_all(log_dir.as_ref()).context("Failed to create logs directory")?;

    // Set up file appender with rotation
    let file_appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE);
    let (non_blocking_appender, guard) = non_blocking(file_appender);

    let file_layer = fmt::layer()
        .json()
        .with_timer(UtcTime::rfc_3339())
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_line_number(true)
        .with_file(true)
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_appender);

    let console_layer = fmt::layer()
        .pretty()
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true)
        .with_file(true)
        .with_span_events(FmtSpan::ENTER);

    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .context("Failed to set global default subscriber")?;

    Ok(guard)
}
