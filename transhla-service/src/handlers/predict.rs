use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use tracing::{info, instrument};
use transhla_inference::{validation::validate_request, InferenceError};
use utoipa::OpenApi;

use crate::{
    error::ServiceError,
    server::AppState,
    types::{ErrorResponse, PredictionRequest, PredictionResult},
};

pub const PREDICT_PATH: &str = "/predict";

#[derive(OpenApi)]
#[openapi(
    paths(predict_handler),
    components(schemas(PredictionRequest, PredictionResult, ErrorResponse))
)]
pub(crate) struct PredictOpenApi;

/// Router for the epitope prediction endpoint
pub fn predict_router() -> Router<AppState> {
    Router::new().route(PREDICT_PATH, post(predict_handler))
}

/// Scores a batch of peptides for one HLA class.
///
/// The request is validated in full before any model work: an unknown class
/// or a single peptide of the wrong length fails the whole batch with `400`.
/// The tokenize, pad and forward steps then run on a blocking thread; any
/// failure there fails the whole batch with `500`.
///
/// # Errors
///
/// * `422` if the body is not a valid `PredictionRequest`
/// * `400` if `hla_class` is not 1 or 2, or a peptide length is out of bounds
/// * `500` if encoding or inference fails
#[utoipa::path(
    post,
    path = "/predict",
    tag = "predict",
    request_body = PredictionRequest,
    responses(
        (status = OK, description = "One result per peptide, in request order", body = Vec<PredictionResult>),
        (status = BAD_REQUEST, description = "Invalid HLA class or peptide length", body = ErrorResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Malformed request body", body = ErrorResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Inference failed", body = ErrorResponse)
    )
)]
#[instrument(level = "info", skip_all, fields(path = PREDICT_PATH))]
pub async fn predict_handler(
    State(state): State<AppState>,
    payload: Result<Json<PredictionRequest>, JsonRejection>,
) -> Result<Json<Vec<PredictionResult>>, ServiceError> {
    let Json(PredictionRequest {
        sequences,
        hla_class,
    }) = payload.map_err(|rejection| ServiceError::InvalidBody {
        message: rejection.body_text(),
        endpoint: PREDICT_PATH,
    })?;
    info!(
        target = "transhla-service",
        event = "predict_request",
        num_sequences = sequences.len(),
        hla_class = %hla_class,
        "Received prediction request"
    );

    let class = validate_request(&sequences, &hla_class)
        .map_err(|e| ServiceError::validation(e, PREDICT_PATH))?;

    let predictor = state.predictor.clone();
    let predictions = tokio::task::spawn_blocking(move || predictor.predict(&sequences, class))
        .await
        .map_err(|e| ServiceError::Inference {
            message: e.to_string(),
            endpoint: PREDICT_PATH,
        })?
        .map_err(|e: InferenceError| ServiceError::inference(&e, PREDICT_PATH))?;

    Ok(Json(
        predictions
            .into_iter()
            .map(PredictionResult::from)
            .collect(),
    ))
}
