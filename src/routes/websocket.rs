use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::{HeaderMap, header::ORIGIN},
    response::IntoResponse,
    routing::get,
};
use tracing::warn;

use crate::{error::AppError, services::websocket_service, state::SharedState};

#[utoipa::path(
    get,
    path = "/ws",
    tag = "relay",
    responses(
        (status = 101, description = "Switching protocols to WebSocket"),
        (status = 403, description = "Origin not in the allow-list")
    )
)]
/// Upgrade the HTTP connection into a relay WebSocket session.
///
/// Browsers do not apply CORS to WebSocket upgrades, so the `Origin` header is
/// checked against the configured allow-list here.
pub async fn ws_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Result<impl IntoResponse, AppError> {
    check_origin(&headers, &state.config().allowed_origins)?;
    Ok(ws.on_upgrade(move |socket| websocket_service::handle_socket(state, socket)))
}

/// Refuse upgrades whose `Origin` is not allowed; requests without one are not from a browser.
fn check_origin(headers: &HeaderMap, allowed_origins: &[String]) -> Result<(), AppError> {
    let Some(origin) = headers.get(ORIGIN) else {
        return Ok(());
    };

    let allowed = origin
        .to_str()
        .is_ok_and(|origin| allowed_origins.iter().any(|allowed| allowed == origin));
    if allowed {
        return Ok(());
    }

    warn!(origin = ?origin, "refusing websocket upgrade from disallowed origin");
    Err(AppError::Forbidden(format!(
        "origin {origin:?} may not open the relay channel"
    )))
}

/// Configure the WebSocket endpoint.
pub fn router() -> Router<SharedState> {
    Router::<SharedState>::new().route("/ws", get(ws_handler))
}
