use axum::Router;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{handlers::predict::PredictOpenApi, types::WelcomeResponse};

pub(crate) const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

/// OpenAPI documentation for the TransHLA API.
#[derive(OpenApi)]
#[openapi(
    paths(crate::server::root, crate::server::health),
    components(schemas(WelcomeResponse)),
    tags(
        (name = "root", description = "Welcome message"),
        (name = "health", description = "Health check endpoint"),
        (name = "predict", description = "HLA class I/II epitope prediction")
    ),
    servers(
        (url = "http://localhost:8000", description = "Local development server")
    )
)]
pub(crate) struct ApiDoc;

/// The full document, including the prediction endpoint.
pub(crate) fn openapi() -> utoipa::openapi::OpenApi {
    let mut openapi = ApiDoc::openapi();
    openapi.merge(PredictOpenApi::openapi());
    openapi
}

pub fn openapi_routes() -> Router {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_JSON_PATH, openapi()))
}
