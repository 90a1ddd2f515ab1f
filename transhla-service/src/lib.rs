#![allow(clippy::module_name_repetitions)]

pub(crate) mod components;
pub mod config;
pub mod error;
pub(crate) mod handlers;
pub mod server;
pub mod telemetry;
pub mod types;


pub use crate::{
    config::TransHlaServiceConfig,
    server::{create_router, cors_layer, run_server, AppState},
};
