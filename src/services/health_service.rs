use tracing::debug;

use crate::{dto::health::HealthResponse, error::ServiceError, state::SharedState};

/// Report liveness together with the relay's last published occupancy.
///
/// Fails once the relay loop has stopped, since sockets can no longer be served.
pub fn health_status(state: &SharedState) -> Result<HealthResponse, ServiceError> {
    if !state.relay_running() {
        return Err(ServiceError::RelayUnavailable);
    }
    let stats = state.stats();
    debug!(players = stats.players, sessions = stats.sessions, "health probe");
    Ok(HealthResponse::ok(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::AppConfig,
        state::{AppState, RelayStats},
    };

    #[test]
    fn reports_published_stats() {
        let (state, _inbox) = AppState::new(AppConfig::default());
        state.publish_stats(RelayStats {
            players: 3,
            sessions: 2,
        });

        let health = health_status(&state).unwrap();
        assert_eq!(health.status, "ok");
        assert_eq!(health.players, 3);
        assert_eq!(health.sessions, 2);
    }

    #[test]
    fn fails_once_the_relay_loop_is_gone() {
        let (state, inbox) = AppState::new(AppConfig::default());
        drop(inbox);
        assert!(matches!(
            health_status(&state),
            Err(ServiceError::RelayUnavailable)
        ));
    }
}
