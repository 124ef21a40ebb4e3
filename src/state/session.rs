use indexmap::{IndexMap, map::Entry};

use crate::dto::{
    common::{CabinetId, ConnectionId, PongSide},
    phase::SessionPhase,
    ws::{JoinedPlayerSnapshot, SessionSnapshot},
};

/// Resting vertical position of both paddles (screen centre minus half a paddle).
pub const DEFAULT_PADDLE_Y: f32 = 216.0;
/// Ball spawn point on both axes.
pub const DEFAULT_BALL_POS: f32 = 256.0;
/// Horizontal ball speed stored on freshly created sessions.
pub const DEFAULT_BALL_SPEED_X: f32 = 2.0;
/// Points needed to win a match.
pub const WINNING_SCORE: u32 = 10;
/// Most paddle owners a session can have.
pub const MAX_PLAYERS: usize = 2;

/// Join-flow membership entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinedPlayer {
    /// Paddle slot claimed by the player (1 or 2).
    pub number: u8,
    /// Per-player score, unused by the shipped cabinet.
    pub score: u32,
}

/// Ball position and per-tick velocity in 0..512 screen space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallState {
    pub x: f32,
    pub y: f32,
    pub speed_x: f32,
    pub speed_y: f32,
}

impl Default for BallState {
    fn default() -> Self {
        Self {
            x: DEFAULT_BALL_POS,
            y: DEFAULT_BALL_POS,
            speed_x: DEFAULT_BALL_SPEED_X,
            speed_y: 0.0,
        }
    }
}

/// Mutable state of one cabinet's Pong game.
#[derive(Debug, Clone, PartialEq)]
pub struct GameSession {
    /// Current lifecycle phase.
    pub phase: SessionPhase,
    /// Bumped on every lifecycle transition so stale timers can be discarded.
    pub epoch: u64,
    /// Join-flow membership keyed by connection.
    pub players: IndexMap<ConnectionId, JoinedPlayer>,
    /// True when two humans own the paddles, false when paddle 2 is the AI.
    pub is_multiplayer: bool,
    /// Left paddle owner and ball-physics host.
    pub player1_id: Option<ConnectionId>,
    /// Right paddle owner in multiplayer matches.
    pub player2_id: Option<ConnectionId>,
    pub left_score: u32,
    pub right_score: u32,
    pub left_paddle_y: f32,
    pub right_paddle_y: f32,
    pub ball: BallState,
    /// Side that just scored, cleared by the host once the flash ends.
    pub scoring_state: Option<PongSide>,
}

impl GameSession {
    /// Fresh session in `phase` with default scores and kinematics.
    pub fn new(phase: SessionPhase) -> Self {
        Self {
            phase,
            epoch: 0,
            players: IndexMap::new(),
            is_multiplayer: false,
            player1_id: None,
            player2_id: None,
            left_score: 0,
            right_score: 0,
            left_paddle_y: DEFAULT_PADDLE_Y,
            right_paddle_y: DEFAULT_PADDLE_Y,
            ball: BallState::default(),
            scoring_state: None,
        }
    }

    /// True when `id` is the session's ball-physics authority.
    pub fn is_host(&self, id: &ConnectionId) -> bool {
        self.player1_id.as_ref() == Some(id)
    }

    /// True when `id` owns either paddle.
    pub fn owns_paddle(&self, id: &ConnectionId) -> bool {
        self.is_host(id) || self.player2_id.as_ref() == Some(id)
    }

    /// True for a join-flow session nobody is left in and no paddle is owned.
    ///
    /// State-change sessions are never abandoned; they idle on the title screen.
    pub fn is_abandoned(&self) -> bool {
        matches!(
            self.phase,
            SessionPhase::WaitingForOpponent | SessionPhase::Active
        ) && self.players.is_empty()
            && self.player1_id.is_none()
            && self.player2_id.is_none()
    }

    /// Start a new lifecycle generation and return it.
    pub fn advance_epoch(&mut self) -> u64 {
        self.epoch += 1;
        self.epoch
    }

    /// Move to `phase`, zeroing the scores when a new match starts.
    pub fn enter_phase(&mut self, phase: SessionPhase) {
        if phase.is_in_play() && !self.phase.is_in_play() {
            self.left_score = 0;
            self.right_score = 0;
            self.scoring_state = None;
        }
        self.phase = phase;
        self.advance_epoch();
    }

    /// Soft reset back to the attract screen, releasing both paddles.
    pub fn reset_to_title(&mut self) {
        self.phase = SessionPhase::Title;
        self.left_score = 0;
        self.right_score = 0;
        self.player1_id = None;
        self.player2_id = None;
        self.is_multiplayer = false;
        self.scoring_state = None;
        self.left_paddle_y = DEFAULT_PADDLE_Y;
        self.right_paddle_y = DEFAULT_PADDLE_Y;
        self.ball = BallState::default();
        self.advance_epoch();
    }

    /// Public view of the session.
    pub fn snapshot(&self, cabinet_id: &CabinetId) -> SessionSnapshot {
        SessionSnapshot {
            cabinet_id: cabinet_id.clone(),
            state: self.phase,
            is_multiplayer: self.is_multiplayer,
            player1_id: self.player1_id,
            player2_id: self.player2_id,
            left_score: self.left_score,
            right_score: self.right_score,
            left_paddle_y: self.left_paddle_y,
            right_paddle_y: self.right_paddle_y,
            ball_x: self.ball.x,
            ball_y: self.ball.y,
            ball_speed_x: self.ball.speed_x,
            ball_speed_y: self.ball.speed_y,
            scoring_state: self.scoring_state,
            players: self
                .players
                .iter()
                .map(|(id, player)| JoinedPlayerSnapshot {
                    player_id: *id,
                    number: player.number,
                    score: player.score,
                })
                .collect(),
        }
    }
}

/// Sessions keyed by cabinet, created lazily and kept in creation order.
#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: IndexMap<CabinetId, GameSession>,
}

impl SessionTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the session for `cabinet_id`, creating it with `init` if absent.
    ///
    /// The flag is `true` when the session was created by this call.
    pub fn get_or_create<F>(&mut self, cabinet_id: &CabinetId, init: F) -> (&mut GameSession, bool)
    where
        F: FnOnce() -> GameSession,
    {
        match self.sessions.entry(cabinet_id.clone()) {
            Entry::Occupied(entry) => (entry.into_mut(), false),
            Entry::Vacant(entry) => (entry.insert(init()), true),
        }
    }

    /// Look up a session without creating it.
    pub fn get(&self, cabinet_id: &CabinetId) -> Option<&GameSession> {
        self.sessions.get(cabinet_id)
    }

    /// Mutable lookup without creation.
    pub fn get_mut(&mut self, cabinet_id: &CabinetId) -> Option<&mut GameSession> {
        self.sessions.get_mut(cabinet_id)
    }

    /// Remove a session.
    pub fn delete(&mut self, cabinet_id: &CabinetId) -> Option<GameSession> {
        self.sessions.shift_remove(cabinet_id)
    }

    /// Snapshot of every session, replayed to freshly connected clients.
    pub fn snapshot(&self) -> Vec<SessionSnapshot> {
        self.sessions
            .iter()
            .map(|(cabinet_id, session)| session.snapshot(cabinet_id))
            .collect()
    }

    /// Iterate mutably over every session.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&CabinetId, &mut GameSession)> {
        self.sessions.iter_mut()
    }

    /// Number of sessions in the table.
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no cabinet has been touched yet.
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_or_create_only_initialises_once() {
        let mut table = SessionTable::new();
        let cabinet: CabinetId = "12".into();

        let (session, created) = table.get_or_create(&cabinet, || GameSession::new(SessionPhase::Waiting));
        assert!(created);
        session.left_score = 4;

        let (session, created) = table.get_or_create(&cabinet, || GameSession::new(SessionPhase::Title));
        assert!(!created);
        assert_eq!(session.phase, SessionPhase::Waiting);
        assert_eq!(session.left_score, 4);
    }

    #[test]
    fn get_does_not_create() {
        let mut table = SessionTable::new();
        assert!(table.get(&"nope".into()).is_none());
        assert!(table.get_mut(&"nope".into()).is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn snapshot_lists_sessions_in_creation_order() {
        let mut table = SessionTable::new();
        table.get_or_create(&"b".into(), || GameSession::new(SessionPhase::Title));
        table.get_or_create(&"a".into(), || GameSession::new(SessionPhase::Playing));

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].cabinet_id.as_str(), "b");
        assert_eq!(snapshot[1].state, SessionPhase::Playing);

        table.delete(&"b".into());
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn defaults_match_a_fresh_cabinet() {
        let session = GameSession::new(SessionPhase::Playing);
        assert_eq!(session.left_score, 0);
        assert_eq!(session.ball.x, 256.0);
        assert_eq!(session.ball.y, 256.0);
        assert_eq!(session.ball.speed_x, 2.0);
        assert_eq!(session.ball.speed_y, 0.0);
        assert_eq!(session.left_paddle_y, 216.0);
    }

    #[test]
    fn entering_play_zeroes_scores_but_updates_do_not() {
        let mut session = GameSession::new(SessionPhase::GameOver);
        session.left_score = 10;
        session.right_score = 3;

        session.enter_phase(SessionPhase::Playing);
        assert_eq!((session.left_score, session.right_score), (0, 0));

        session.left_score = 2;
        session.enter_phase(SessionPhase::Playing);
        assert_eq!(session.left_score, 2);
    }

    #[test]
    fn title_reset_releases_paddles_and_bumps_epoch() {
        let host = ConnectionId::new();
        let mut session = GameSession::new(SessionPhase::Playing);
        session.player1_id = Some(host);
        session.is_multiplayer = true;
        session.right_score = 7;
        session.right_paddle_y = 0.0;
        session.ball = BallState {
            x: 510.0,
            y: 400.0,
            speed_x: 3.0,
            speed_y: 0.0,
        };
        let before = session.epoch;

        session.reset_to_title();

        assert_eq!(session.phase, SessionPhase::Title);
        assert_eq!(session.player1_id, None);
        assert!(!session.is_multiplayer);
        assert_eq!(session.right_score, 0);
        assert!(session.epoch > before);
        assert!(!session.is_host(&host));
        assert_eq!(session.ball, BallState::default());
        assert_eq!(session.right_paddle_y, DEFAULT_PADDLE_Y);
    }

    #[test]
    fn only_empty_join_flow_sessions_are_abandoned() {
        let mut joined = GameSession::new(SessionPhase::WaitingForOpponent);
        assert!(joined.is_abandoned());
        joined.players.insert(
            ConnectionId::new(),
            JoinedPlayer {
                number: 1,
                score: 0,
            },
        );
        assert!(!joined.is_abandoned());

        let idle = GameSession::new(SessionPhase::Title);
        assert!(!idle.is_abandoned());
    }
}
