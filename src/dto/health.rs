use serde::Serialize;
use utoipa::ToSchema;

use crate::state::RelayStats;

/// Health response returned by the `/healthcheck` route.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Health status, always "ok" while the process answers.
    pub status: String,
    /// Live WebSocket connections known to the relay.
    pub players: usize,
    /// Cabinet sessions currently in the table.
    pub sessions: usize,
}

impl HealthResponse {
    /// Create a health response from the latest relay occupancy.
    pub fn ok(stats: RelayStats) -> Self {
        Self {
            status: "ok".to_string(),
            players: stats.players,
            sessions: stats.sessions,
        }
    }
}
