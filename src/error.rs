use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::dto::common::{CabinetId, ConnectionId};

/// Relay events refused by session policy.
///
/// These never reach the socket: the relay loop logs them and carries on, the
/// same way malformed frames are dropped.
#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    /// Only the ball-physics host may publish this update.
    #[error("{sender} is not the host of cabinet {cabinet_id}")]
    NotHost {
        cabinet_id: CabinetId,
        sender: ConnectionId,
    },
    /// Sender owns neither paddle of the cabinet.
    #[error("{sender} does not own a paddle on cabinet {cabinet_id}")]
    NotPaddleOwner {
        cabinet_id: CabinetId,
        sender: ConnectionId,
    },
    /// State change sent by a connection that does not name itself as a player.
    #[error("{sender} is not a participant of the state change on cabinet {cabinet_id}")]
    NotParticipant {
        cabinet_id: CabinetId,
        sender: ConnectionId,
    },
    /// Join announced for a connection other than the sender.
    #[error("{sender} tried to join cabinet {cabinet_id} as {player_id}")]
    ForeignPlayerId {
        cabinet_id: CabinetId,
        sender: ConnectionId,
        player_id: ConnectionId,
    },
    /// Cabinet already has a host and the change tries to replace it.
    #[error("cabinet {cabinet_id} is already claimed")]
    CabinetClaimed { cabinet_id: CabinetId },
    /// Join flow already holds two players.
    #[error("cabinet {cabinet_id} already has two players")]
    SessionFull { cabinet_id: CabinetId },
    /// A score went down while the match was running.
    #[error("score regression on cabinet {cabinet_id}")]
    ScoreRegression { cabinet_id: CabinetId },
    /// Game over reported for a session that is not being played.
    #[error("cabinet {cabinet_id} is not in play")]
    NotInPlay { cabinet_id: CabinetId },
    /// Game over reported before either side reached the winning score.
    #[error("game over on cabinet {cabinet_id} before a side reached the winning score")]
    BelowWinningScore { cabinet_id: CabinetId },
    /// Chat line longer than the configured limit.
    #[error("chat message of {len} characters exceeds the {max} limit")]
    ChatTooLong { len: usize, max: usize },
}

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The relay loop has stopped and can no longer accept commands.
    #[error("relay unavailable")]
    RelayUnavailable,
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Service unavailable or shutting down.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Request refused by an access policy.
    #[error("forbidden: {0}")]
    Forbidden(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::RelayUnavailable => AppError::ServiceUnavailable(err.to_string()),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_unavailable_maps_to_503() {
        let response = AppError::from(ServiceError::RelayUnavailable).into_response();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn forbidden_maps_to_403() {
        let response = AppError::Forbidden("origin not allowed".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn relay_errors_name_the_cabinet() {
        let err = RelayError::SessionFull {
            cabinet_id: "12".into(),
        };
        assert_eq!(err.to_string(), "cabinet 12 already has two players");
    }
}
