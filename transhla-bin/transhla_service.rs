use std::future::Future;

use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use tokio::{net::TcpListener, sync::watch, task::JoinHandle, try_join};
use tracing::info;
use transhla_inference::EpitopePredictor;
use transhla_service::{cors_layer, run_server, telemetry, AppState, TransHlaServiceConfig};

/// The name of the environment variable for the Hugging Face token
const HF_TOKEN: &str = "HF_TOKEN";
/// The directory where the logs are stored.
const LOGS: &str = "./logs";

/// Command line arguments for the TransHLA service
#[derive(Parser)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config_path: String,
}

/// Spawns `f` and sends the shutdown signal if it fails, so the remaining
/// tasks stop as well.
fn spawn_with_shutdown<F>(f: F, shutdown_sender: watch::Sender<bool>) -> JoinHandle<Result<()>>
where
    F: Future<Output = Result<()>> + Send + 'static,
{
    tokio::task::spawn(async move {
        let res = f.await;
        if res.is_err() {
            shutdown_sender
                .send(true)
                .context("Failed to send shutdown signal")?;
        }
        res
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    // Keep the guard alive so buffered file logs are flushed on exit
    let _log_guard = telemetry::setup_logging(LOGS).context("Failed to setup logging")?;
    dotenv().ok();

    let args = Args::parse();
    let config = TransHlaServiceConfig::from_file_path(&args.config_path)
        .with_context(|| format!("Failed to load configuration from {}", args.config_path))?;

    info!(
        target = "transhla-service",
        event = "predictor_load",
        tokenizer = %config.predictor.tokenizer.repo_id,
        class_i_model = %config.predictor.class_i_model.repo_id,
        class_ii_model = %config.predictor.class_ii_model.repo_id,
        "Loading tokenizer and models"
    );
    let hf_token = std::env::var(HF_TOKEN).ok();
    let predictor_config = config.predictor.clone();
    let predictor =
        tokio::task::spawn_blocking(move || EpitopePredictor::load(&predictor_config, hf_token))
            .await?
            .context("Failed to load predictor")?;

    let app_state = AppState::new(predictor);
    let cors = cors_layer(&config.allowed_origins).context("Invalid allowed origin")?;
    let tcp_listener = TcpListener::bind(&config.service_bind_address)
        .await
        .context("Failed to bind TCP listener")?;

    info!(
        target = "transhla-service",
        event = "transhla_service_start",
        bind_address = %config.service_bind_address,
        "Starting TransHLA service"
    );

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    let server_handle = spawn_with_shutdown(
        run_server(app_state, cors, tcp_listener, shutdown_receiver.clone()),
        shutdown_sender.clone(),
    );

    let mut ctrl_c_receiver = shutdown_receiver;
    let ctrl_c = tokio::task::spawn(async move {
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                info!(
                    target = "transhla-service",
                    event = "transhla_service_stop",
                    "ctrl-c received, sending shutdown signal"
                );
                shutdown_sender
                    .send(true)
                    .context("Failed to send shutdown signal")?;
                result.map_err(anyhow::Error::from)
            }
            _ = ctrl_c_receiver.changed() => {
                Ok(())
            }
        }
    });

    let (server_result, ctrl_c_result) = try_join!(server_handle, ctrl_c)?;
    server_result?;
    ctrl_c_result?;

    info!(
        target = "transhla-service",
        event = "transhla_service_stop",
        "TransHLA service stopped gracefully"
    );
    Ok(())
}
