//! Relay protocol handler: applies one client event to the registry and session
//! table, then describes what must be broadcast and which timers must be armed.
//!
//! The handler never touches sockets. It returns [`Effects`] that the relay loop
//! delivers, which keeps every transition testable without a network.

use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    dto::{
        common::{CabinetId, ConnectionId},
        phase::SessionPhase,
        ws::{
            ArcadeInteractionPayload, CabinetRef, ChatBroadcastEvent, ChatMessagePayload,
            ClientMessage, InitialPositionPayload, PaddleCommand, PaddleUpdateEvent,
            PlayerInteractionEvent, PlayerLeftEvent, PlayerMovePayload, PlayerMovedEvent,
            PongBallPayload, PongGameOverPayload, PongPaddleMovePayload, PongPlayerJoinedPayload,
            PongPlayerLeftEvent, PongScorePayload, PongStateChangePayload, ServerMessage,
            WelcomeEvent,
        },
    },
    error::RelayError,
    state::{
        RelayStats,
        lifecycle::ResetTicket,
        registry::ConnectionRegistry,
        session::{BallState, GameSession, JoinedPlayer, MAX_PLAYERS, SessionTable, WINNING_SCORE},
    },
};

/// Audience of a single outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Only this connection.
    Connection(ConnectionId),
    /// Everyone except the originating connection.
    AllExcept(ConnectionId),
    /// Every live connection, sender included.
    All,
}

impl Target {
    /// Whether a message with this target reaches `id`.
    pub fn includes(&self, id: &ConnectionId) -> bool {
        match self {
            Target::Connection(target) => target == id,
            Target::AllExcept(excluded) => excluded != id,
            Target::All => true,
        }
    }
}

/// One message and its audience.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    pub target: Target,
    pub message: ServerMessage,
}

/// Everything a handler invocation asks the loop to do, in order.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Effects {
    /// Messages to deliver, in emission order.
    pub dispatches: Vec<Dispatch>,
    /// Deferred resets to arm.
    pub resets: Vec<ResetTicket>,
}

impl Effects {
    fn send_to(&mut self, id: ConnectionId, message: ServerMessage) {
        self.dispatches.push(Dispatch {
            target: Target::Connection(id),
            message,
        });
    }

    fn send_to_others(&mut self, sender: ConnectionId, message: ServerMessage) {
        self.dispatches.push(Dispatch {
            target: Target::AllExcept(sender),
            message,
        });
    }

    fn send_to_all(&mut self, message: ServerMessage) {
        self.dispatches.push(Dispatch {
            target: Target::All,
            message,
        });
    }

    /// True when the invocation produced nothing.
    pub fn is_empty(&self) -> bool {
        self.dispatches.is_empty() && self.resets.is_empty()
    }
}

/// Explicit relay context owning the connection registry and the session table.
#[derive(Debug)]
pub struct Relay {
    registry: ConnectionRegistry,
    sessions: SessionTable,
    max_chat_len: usize,
}

impl Relay {
    /// Build an empty relay that refuses chat lines longer than `max_chat_len` characters.
    pub fn new(max_chat_len: usize) -> Self {
        Self {
            registry: ConnectionRegistry::new(),
            sessions: SessionTable::new(),
            max_chat_len,
        }
    }

    /// Read access to the connection registry.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Read access to the session table.
    pub fn sessions(&self) -> &SessionTable {
        &self.sessions
    }

    /// Current occupancy figures.
    pub fn stats(&self) -> RelayStats {
        RelayStats {
            players: self.registry.len(),
            sessions: self.sessions.len(),
        }
    }

    /// Register a new connection and replay the full session table to it.
    pub fn connect(&mut self, id: ConnectionId) -> Effects {
        self.registry.register(id);
        info!(%id, players = self.registry.len(), "player connected");

        let mut effects = Effects::default();
        effects.send_to(id, ServerMessage::Welcome(WelcomeEvent { id }));
        effects.send_to(id, ServerMessage::PongGamesState(self.sessions.snapshot()));
        effects
    }

    /// Apply one validated client event.
    ///
    /// Events that reference an unknown connection or cabinet are dropped with an
    /// empty [`Effects`]; policy violations come back as [`RelayError`].
    pub fn handle(&mut self, from: ConnectionId, message: ClientMessage) -> Result<Effects, RelayError> {
        match message {
            ClientMessage::InitialPosition(payload) => Ok(self.initial_position(from, payload)),
            ClientMessage::PlayerMove(payload) => Ok(self.player_move(from, payload)),
            ClientMessage::ArcadeInteraction(payload) => Ok(self.arcade_interaction(from, payload)),
            ClientMessage::ChatMessage(payload) => self.chat_message(from, payload),
            ClientMessage::PongPlayerJoined(payload) => self.pong_player_joined(from, payload),
            ClientMessage::PongPlayerLeft(payload) => Ok(self.pong_player_left(from, payload)),
            ClientMessage::PongStateChange(payload) => self.pong_state_change(from, payload),
            ClientMessage::PongPaddleMove(payload) => self.pong_paddle_move(from, payload),
            ClientMessage::PongBallUpdate(payload) => self.pong_ball_update(from, payload),
            ClientMessage::PongScoreUpdate(payload) => self.pong_score_update(from, payload),
            ClientMessage::PongGameOver(payload) => self.pong_game_over(from, payload),
        }
    }

    /// Release everything held by a departing connection.
    pub fn disconnect(&mut self, id: ConnectionId) -> Effects {
        let mut effects = Effects::default();

        let mut abandoned = Vec::new();
        for (cabinet_id, session) in self.sessions.iter_mut() {
            session.players.shift_remove(&id);
            if session.owns_paddle(&id) {
                session.reset_to_title();
                info!(%cabinet_id, %id, "paddle owner left; session reset to title");
                effects.send_to_all(ServerMessage::PongStateUpdate(session.snapshot(cabinet_id)));
            } else if session.is_abandoned() {
                abandoned.push(cabinet_id.clone());
            }
        }
        for cabinet_id in abandoned {
            self.sessions.delete(&cabinet_id);
            debug!(%cabinet_id, "join-flow session emptied by disconnect and removed");
        }

        self.registry.unregister(&id);
        info!(%id, players = self.registry.len(), "player disconnected");
        effects.send_to_all(ServerMessage::PlayerLeft(PlayerLeftEvent { id }));
        effects
    }

    /// Apply a due post-game reset unless the session moved on since it was armed.
    pub fn reset_due(&mut self, ticket: ResetTicket) -> Effects {
        let mut effects = Effects::default();
        let Some(session) = self.sessions.get_mut(&ticket.cabinet_id) else {
            debug!(cabinet_id = %ticket.cabinet_id, "reset due for unknown cabinet");
            return effects;
        };

        if session.epoch != ticket.epoch {
            debug!(
                cabinet_id = %ticket.cabinet_id,
                armed = ticket.epoch,
                current = session.epoch,
                "discarding stale session reset"
            );
            return effects;
        }

        session.reset_to_title();
        info!(cabinet_id = %ticket.cabinet_id, "post-game reset to title");
        effects.send_to_all(ServerMessage::PongStateUpdate(
            session.snapshot(&ticket.cabinet_id),
        ));
        effects
    }

    fn initial_position(&mut self, from: ConnectionId, payload: InitialPositionPayload) -> Effects {
        let mut effects = Effects::default();
        if !self
            .registry
            .set_initial_position(&from, payload.position, payload.rotation)
        {
            debug!(%from, "initialPosition for unknown connection");
            return effects;
        }

        if let Some(record) = self.registry.get(&from) {
            effects.send_to_others(from, ServerMessage::PlayerJoined(record.snapshot()));
        }
        effects.send_to(from, ServerMessage::ExistingPlayers(self.registry.others(&from)));
        effects
    }

    fn player_move(&mut self, from: ConnectionId, payload: PlayerMovePayload) -> Effects {
        let mut effects = Effects::default();
        if !self
            .registry
            .update_transform(&from, payload.position, payload.rotation)
        {
            debug!(%from, "playerMove for unknown connection");
            return effects;
        }

        effects.send_to_others(
            from,
            ServerMessage::PlayerMoved(PlayerMovedEvent {
                id: from,
                position: payload.position,
                rotation: payload.rotation,
                velocity_y: payload.velocity_y,
            }),
        );
        effects
    }

    fn arcade_interaction(&mut self, from: ConnectionId, payload: ArcadeInteractionPayload) -> Effects {
        let mut effects = Effects::default();
        effects.send_to_others(
            from,
            ServerMessage::PlayerInteraction(PlayerInteractionEvent {
                id: from,
                machine_id: payload.machine_id,
                action: payload.action,
            }),
        );
        effects
    }

    fn chat_message(&mut self, from: ConnectionId, payload: ChatMessagePayload) -> Result<Effects, RelayError> {
        let len = payload.text.chars().count();
        if len > self.max_chat_len {
            return Err(RelayError::ChatTooLong {
                len,
                max: self.max_chat_len,
            });
        }

        let mut effects = Effects::default();
        if !self.registry.set_chat_message(&from, payload.text.clone()) {
            debug!(%from, "chatMessage for unknown connection");
            return Ok(effects);
        }

        effects.send_to_all(ServerMessage::ChatMessage(ChatBroadcastEvent {
            id: from,
            text: payload.text,
            timestamp: unix_millis(),
        }));
        Ok(effects)
    }

    fn pong_player_joined(
        &mut self,
        from: ConnectionId,
        payload: PongPlayerJoinedPayload,
    ) -> Result<Effects, RelayError> {
        let cabinet_id = payload.cabinet_id.clone();
        if payload.player_id != from {
            return Err(RelayError::ForeignPlayerId {
                cabinet_id,
                sender: from,
                player_id: payload.player_id,
            });
        }
        let (session, _) = self.sessions.get_or_create(&cabinet_id, || {
            GameSession::new(SessionPhase::WaitingForOpponent)
        });

        let already_joined = session.players.contains_key(&payload.player_id);
        if !already_joined && session.players.len() >= MAX_PLAYERS {
            return Err(RelayError::SessionFull { cabinet_id });
        }

        let before = session.players.len();
        session.players.insert(
            payload.player_id,
            JoinedPlayer {
                number: payload.player_number,
                score: 0,
            },
        );
        let starting = before < MAX_PLAYERS && session.players.len() == MAX_PLAYERS;
        if starting {
            session.phase = SessionPhase::Active;
            session.advance_epoch();
        }

        let mut effects = Effects::default();
        effects.send_to_others(from, ServerMessage::PongPlayerJoined(payload));
        if starting {
            info!(%cabinet_id, "second player joined; starting game");
            effects.send_to_all(ServerMessage::PongGameStart(CabinetRef { cabinet_id }));
        }
        Ok(effects)
    }

    fn pong_player_left(&mut self, from: ConnectionId, payload: CabinetRef) -> Effects {
        let mut effects = Effects::default();
        let cabinet_id = payload.cabinet_id;
        let Some(session) = self.sessions.get_mut(&cabinet_id) else {
            debug!(%cabinet_id, "pongPlayerLeft for unknown cabinet");
            return effects;
        };

        session.players.shift_remove(&from);
        if session.is_abandoned() {
            self.sessions.delete(&cabinet_id);
            debug!(%cabinet_id, "join-flow session emptied and removed");
        }

        effects.send_to_all(ServerMessage::PongPlayerLeft(PongPlayerLeftEvent {
            player_id: from,
            cabinet_id,
        }));
        effects
    }

    fn pong_state_change(
        &mut self,
        from: ConnectionId,
        payload: PongStateChangePayload,
    ) -> Result<Effects, RelayError> {
        let named = payload.player1_id == Some(from) || payload.player2_id == Some(from);
        if !named {
            return Err(RelayError::NotParticipant {
                cabinet_id: payload.cabinet_id,
                sender: from,
            });
        }

        let cabinet_id = payload.cabinet_id.clone();
        if let Some(existing) = self.sessions.get(&cabinet_id) {
            let claimed = matches!(
                existing.phase.canonical(),
                SessionPhase::Waiting | SessionPhase::Playing
            );
            if claimed && existing.player1_id.is_some() && existing.player1_id != payload.player1_id {
                return Err(RelayError::CabinetClaimed { cabinet_id });
            }
        }

        let (session, created) = self
            .sessions
            .get_or_create(&cabinet_id, || GameSession::new(payload.state));
        session.is_multiplayer = payload.is_multiplayer.unwrap_or(false);
        session.player1_id = payload.player1_id;
        session.player2_id = payload.player2_id;
        session.enter_phase(payload.state);
        info!(%cabinet_id, state = ?payload.state, created, "pong state change");

        let mut effects = Effects::default();
        effects.send_to_all(ServerMessage::PongStateUpdate(session.snapshot(&cabinet_id)));
        Ok(effects)
    }

    fn pong_paddle_move(
        &mut self,
        from: ConnectionId,
        payload: PongPaddleMovePayload,
    ) -> Result<Effects, RelayError> {
        let mut effects = Effects::default();
        let Some(command) = payload.command() else {
            return Ok(effects);
        };
        let cabinet_id = payload.cabinet_id;
        let Some(session) = self.sessions.get_mut(&cabinet_id) else {
            debug!(%cabinet_id, "pongPaddleMove for unknown cabinet");
            return Ok(effects);
        };

        let update = match command {
            PaddleCommand::Both { left, right } => {
                if !session.is_host(&from) {
                    return Err(RelayError::NotHost {
                        cabinet_id,
                        sender: from,
                    });
                }
                session.left_paddle_y = left;
                session.right_paddle_y = right;
                PaddleUpdateEvent::Ai {
                    cabinet_id,
                    is_ai: true,
                    left_paddle_y: left,
                    right_paddle_y: right,
                }
            }
            PaddleCommand::Own(paddle_y) => {
                if session.is_host(&from) {
                    session.left_paddle_y = paddle_y;
                } else if session.player2_id == Some(from) {
                    session.right_paddle_y = paddle_y;
                } else {
                    return Err(RelayError::NotPaddleOwner {
                        cabinet_id,
                        sender: from,
                    });
                }
                PaddleUpdateEvent::Player {
                    cabinet_id,
                    player_id: from,
                    paddle_y,
                }
            }
        };

        effects.send_to_others(from, ServerMessage::PongPaddleUpdate(update));
        Ok(effects)
    }

    fn pong_ball_update(
        &mut self,
        from: ConnectionId,
        payload: PongBallPayload,
    ) -> Result<Effects, RelayError> {
        let mut effects = Effects::default();
        let Some(session) = host_session(&mut self.sessions, &payload.cabinet_id, from)? else {
            return Ok(effects);
        };

        session.ball = BallState {
            x: payload.x,
            y: payload.y,
            speed_x: payload.speed_x,
            speed_y: payload.speed_y,
        };
        effects.send_to_all(ServerMessage::PongBallUpdate(payload));
        Ok(effects)
    }

    fn pong_score_update(
        &mut self,
        from: ConnectionId,
        payload: PongScorePayload,
    ) -> Result<Effects, RelayError> {
        let mut effects = Effects::default();
        let Some(session) = host_session(&mut self.sessions, &payload.cabinet_id, from)? else {
            return Ok(effects);
        };

        if session.phase.is_in_play()
            && (payload.left_score < session.left_score || payload.right_score < session.right_score)
        {
            return Err(RelayError::ScoreRegression {
                cabinet_id: payload.cabinet_id,
            });
        }

        session.left_score = payload.left_score;
        session.right_score = payload.right_score;
        session.scoring_state = payload.scoring_state;
        effects.send_to_all(ServerMessage::PongScoreUpdate(payload));
        Ok(effects)
    }

    fn pong_game_over(
        &mut self,
        from: ConnectionId,
        payload: PongGameOverPayload,
    ) -> Result<Effects, RelayError> {
        let mut effects = Effects::default();
        let cabinet_id = payload.cabinet_id.clone();
        let Some(session) = host_session(&mut self.sessions, &cabinet_id, from)? else {
            return Ok(effects);
        };

        if !session.phase.is_in_play() {
            return Err(RelayError::NotInPlay { cabinet_id });
        }
        if payload.left_score.max(payload.right_score) < WINNING_SCORE {
            return Err(RelayError::BelowWinningScore { cabinet_id });
        }

        session.phase = SessionPhase::GameOver;
        session.left_score = payload.left_score;
        session.right_score = payload.right_score;
        session.scoring_state = None;
        let epoch = session.advance_epoch();
        info!(
            %cabinet_id,
            left = payload.left_score,
            right = payload.right_score,
            "game over"
        );

        effects.send_to_all(ServerMessage::PongGameOver(payload));
        effects.resets.push(ResetTicket { cabinet_id, epoch });
        Ok(effects)
    }
}

/// Look up a session that only its host may update.
///
/// `Ok(None)` means the cabinet is unknown and the event should be dropped.
fn host_session<'a>(
    sessions: &'a mut SessionTable,
    cabinet_id: &CabinetId,
    sender: ConnectionId,
) -> Result<Option<&'a mut GameSession>, RelayError> {
    let Some(session) = sessions.get_mut(cabinet_id) else {
        debug!(%cabinet_id, "host update for unknown cabinet");
        return Ok(None);
    };
    if !session.is_host(&sender) {
        return Err(RelayError::NotHost {
            cabinet_id: cabinet_id.clone(),
            sender,
        });
    }
    Ok(Some(session))
}

fn unix_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
