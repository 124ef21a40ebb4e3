use axum::{Json, Router, extract::State, routing::get};

use crate::{
    dto::health::HealthResponse, error::AppError, services::health_service, state::SharedState,
};

#[utoipa::path(
    get,
    path = "/healthcheck",
    tag = "health",
    responses(
        (status = 200, description = "Relay is up", body = HealthResponse),
        (status = 503, description = "Relay loop stopped")
    )
)]
/// Return liveness plus the number of connected players and tracked sessions.
pub async fn healthcheck(
    State(state): State<SharedState>,
) -> Result<Json<HealthResponse>, AppError> {
    Ok(Json(health_service::health_status(&state)?))
}

/// Configure the health routes subtree.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/healthcheck", get(healthcheck))
}
