use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle phase of a Pong session, covering both wire vocabularies.
///
/// The join flow speaks `WAITING_P2`/`ACTIVE`; the state-change flow (the one
/// driving the shipped cabinet, and therefore canonical) speaks
/// `waiting`/`playing`/`gameover`/`title`. They map as follows:
///
/// | join flow    | state-change flow |
/// |--------------|-------------------|
/// | `WAITING_P2` | `waiting`         |
/// | `ACTIVE`     | `playing`         |
/// | (none)       | `gameover`        |
/// | (none)       | `title`           |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum SessionPhase {
    /// One player joined through the join flow; waiting for a second.
    #[serde(rename = "WAITING_P2")]
    WaitingForOpponent,
    /// Two players joined through the join flow.
    #[serde(rename = "ACTIVE")]
    Active,
    /// Player 1 claimed the cabinet and waits for an opponent or an AI start.
    #[serde(rename = "waiting")]
    Waiting,
    /// A match is running.
    #[serde(rename = "playing")]
    Playing,
    /// A side reached the winning score; the reset timer is armed.
    #[serde(rename = "gameover")]
    GameOver,
    /// Idle attract screen, nobody owns a paddle.
    #[serde(rename = "title")]
    Title,
}

impl SessionPhase {
    /// Project the phase onto the canonical state-change vocabulary.
    pub fn canonical(self) -> Self {
        match self {
            SessionPhase::WaitingForOpponent => SessionPhase::Waiting,
            SessionPhase::Active => SessionPhase::Playing,
            other => other,
        }
    }

    /// True while a match is running and scores may change.
    pub fn is_in_play(self) -> bool {
        self.canonical() == SessionPhase::Playing
    }
}
