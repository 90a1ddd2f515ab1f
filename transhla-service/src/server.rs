use std::sync::Arc;

use axum::{
    http::{HeaderValue, StatusCode},
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use tokio::{net::TcpListener, sync::watch::Receiver};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tracing::{info, instrument};
use transhla_inference::EpitopePredictor;

use crate::{components::openapi::openapi_routes, handlers::predict::predict_router, types::WelcomeResponse};

pub(crate) const ROOT_PATH: &str = "/";
pub(crate) const HEALTH_PATH: &str = "/health";
const WELCOME_MESSAGE: &str = "Welcome to TransHLA API";

/// Shared state of the HTTP service.
///
/// Built once at startup and cloned into every handler. The predictor holds
/// the tokenizer, both classifiers and the device, and is only read after
/// construction, so no locking is needed.
#[derive(Clone)]
pub struct AppState {
    /// Tokenizer, HLA class I/II classifiers and execution device
    pub predictor: Arc<EpitopePredictor>,
}

impl AppState {
    pub fn new(predictor: EpitopePredictor) -> Self {
        Self {
            predictor: Arc::new(predictor),
        }
    }
}

/// Builds the cross-origin policy: the listed origins only, any method and
/// header, credentials allowed.
///
/// Methods and headers mirror the preflight request, since wildcards are not
/// allowed together with credentials.
///
/// # Errors
///
/// Returns an error if an origin is not a valid header value.
pub fn cors_layer<S: AsRef<str>>(allowed_origins: &[S]) -> anyhow::Result<CorsLayer> {
    let origins = allowed_origins
        .iter()
        .map(|origin| HeaderValue::from_str(origin.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true))
}

/// Creates and configures the main router for the TransHLA service.
///
/// # API Endpoints
///
/// * `GET /` - Welcome message
/// * `GET /health` - Check service health status
/// * `POST /predict` - Score peptides for HLA class I or II
/// * `GET /swagger-ui` - Interactive API documentation UI
/// * `GET /api-docs/openapi.json` - OpenAPI specification in JSON format
pub fn create_router(app_state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route(ROOT_PATH, get(root))
        .route(HEALTH_PATH, get(health))
        .merge(predict_router())
        .with_state(app_state)
        .merge(openapi_routes())
        .layer(cors)
}

/// Starts and runs the HTTP server until a shutdown signal is received.
///
/// # Arguments
///
/// * `app_state` - The shared state holding the loaded predictor
/// * `cors` - Cross-origin policy applied to every route
/// * `tcp_listener` - A pre-configured TCP listener that the HTTP server will bind to
/// * `shutdown_receiver` - Flips once the process should stop; in-flight requests
///   are allowed to complete
pub async fn run_server(
    app_state: AppState,
    cors: CorsLayer,
    tcp_listener: TcpListener,
    mut shutdown_receiver: Receiver<bool>,
) -> anyhow::Result<()> {
    let router = create_router(app_state, cors);
    let server = axum::serve(tcp_listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            // A dropped sender also means shutdown.
            let _ = shutdown_receiver.changed().await;
            info!(
                target = "transhla-service",
                event = "server_shutdown",
                "Shutting down server..."
            );
        },
    );
    server.await?;
    Ok(())
}

/// Welcome endpoint.
#[utoipa::path(
    get,
    path = "/",
    tag = "root",
    responses(
        (status = OK, description = "Welcome message", body = WelcomeResponse)
    )
)]
#[instrument(level = "trace")]
pub async fn root() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: WELCOME_MESSAGE.to_string(),
    })
}

/// Health check endpoint.
///
/// Models are loaded before the listener is bound, so a responding server is
/// always ready to predict.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = OK, description = "Service is healthy")
    )
)]
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}
