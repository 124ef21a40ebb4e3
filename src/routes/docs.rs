use axum::{Json, Router, routing::get};
use utoipa::OpenApi;

use crate::{services::documentation::ApiDoc, state::SharedState};

#[utoipa::path(
    get,
    path = "/api-doc/openapi.json",
    tag = "docs",
    responses((status = 200, description = "OpenAPI document for this server"))
)]
/// Serve the generated OpenAPI document.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Configure the documentation routes.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/api-doc/openapi.json", get(openapi_json))
}
