//! One Pong cabinet as seen from a single browser client.
//!
//! The cabinet mirrors the relay's session for its id. Whoever holds the left
//! paddle (`player1Id`) hosts the match: it runs [`PongTable::step`] locally and
//! reports ball, score and game-over events, while it ignores the echoes of its
//! own reports. Everybody else only renders what the relay broadcasts.

use std::time::Instant;

use rand::Rng;
use tracing::debug;

use crate::{
    client::pong::{PaddleInput, PongTable, StepOutcome},
    dto::{
        common::{CabinetId, ConnectionId, PongSide},
        phase::SessionPhase,
        ws::{
            ClientMessage, PaddleUpdateEvent, PongBallPayload, PongGameOverPayload,
            PongPaddleMovePayload, PongScorePayload, PongStateChangePayload, ServerMessage,
            SessionSnapshot,
        },
    },
};

/// Local mirror of one cabinet's session.
#[derive(Debug, Clone)]
pub struct Cabinet {
    id: CabinetId,
    me: ConnectionId,
    phase: SessionPhase,
    is_multiplayer: bool,
    player1_id: Option<ConnectionId>,
    player2_id: Option<ConnectionId>,
    table: PongTable,
    /// Host only: the next frame serves a fresh ball instead of stepping.
    serve_pending: bool,
}

impl Cabinet {
    /// Idle cabinet `id` watched by connection `me`.
    pub fn new(id: CabinetId, me: ConnectionId) -> Self {
        Self {
            id,
            me,
            phase: SessionPhase::Title,
            is_multiplayer: false,
            player1_id: None,
            player2_id: None,
            table: PongTable::default(),
            serve_pending: false,
        }
    }

    /// Cabinet identifier.
    pub fn id(&self) -> &CabinetId {
        &self.id
    }

    /// Last known session phase.
    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// True for two human players.
    pub fn is_multiplayer(&self) -> bool {
        self.is_multiplayer
    }

    /// Rendered paddles, ball and score.
    pub fn table(&self) -> &PongTable {
        &self.table
    }

    /// True when this client runs the ball physics.
    pub fn is_host(&self) -> bool {
        self.player1_id == Some(self.me)
    }

    /// Paddle this client steers, if any.
    pub fn my_side(&self) -> Option<PongSide> {
        if self.is_host() {
            Some(PongSide::Left)
        } else if self.is_multiplayer && self.player2_id == Some(self.me) {
            Some(PongSide::Right)
        } else {
            None
        }
    }

    /// Fold a relay broadcast into the mirror; messages for other cabinets are ignored.
    pub fn apply(&mut self, message: &ServerMessage, now: Instant) {
        match message {
            ServerMessage::PongGamesState(sessions) => {
                if let Some(snapshot) = sessions.iter().find(|s| s.cabinet_id == self.id) {
                    self.sync(snapshot);
                }
            }
            ServerMessage::PongStateUpdate(snapshot) if snapshot.cabinet_id == self.id => {
                self.sync(snapshot);
            }
            ServerMessage::PongPaddleUpdate(update) => self.apply_paddles(update),
            ServerMessage::PongBallUpdate(ball) if ball.cabinet_id == self.id => {
                if self.is_host() {
                    return;
                }
                self.table.ball.x = ball.x;
                self.table.ball.y = ball.y;
                self.table.velocity.x = ball.speed_x;
                self.table.velocity.y = ball.speed_y;
            }
            ServerMessage::PongScoreUpdate(score) if score.cabinet_id == self.id => {
                if self.is_host() {
                    return;
                }
                self.table.left_score = score.left_score;
                self.table.right_score = score.right_score;
                match score.scoring_state {
                    Some(side) => self.table.flash(side, now),
                    None => self.table.clear_flash(),
                }
            }
            ServerMessage::PongGameOver(over) if over.cabinet_id == self.id => {
                self.phase = SessionPhase::GameOver;
                self.table.left_score = over.left_score;
                self.table.right_score = over.right_score;
                self.table.clear_flash();
            }
            _ => {}
        }
    }

    /// State change requested by clicking the cabinet, if the click means anything now.
    ///
    /// A click on the title screen claims player 1. While waiting, player 1
    /// starts a match against the AI and anybody else joins as player 2.
    pub fn click(&self) -> Option<ClientMessage> {
        let (state, is_multiplayer, player1_id, player2_id) = match self.phase.canonical() {
            SessionPhase::Title => (SessionPhase::Waiting, false, Some(self.me), None),
            SessionPhase::Waiting if self.is_host() => {
                (SessionPhase::Playing, false, Some(self.me), None)
            }
            SessionPhase::Waiting => match self.player1_id {
                Some(host) if self.player2_id.is_none() => {
                    (SessionPhase::Playing, true, Some(host), Some(self.me))
                }
                _ => return None,
            },
            _ => return None,
        };

        Some(ClientMessage::PongStateChange(PongStateChangePayload {
            cabinet_id: self.id.clone(),
            state,
            is_multiplayer: Some(is_multiplayer),
            player1_id,
            player2_id,
        }))
    }

    /// Run one rendered frame and return the events this client must report.
    pub fn tick<R: Rng + ?Sized>(
        &mut self,
        input: PaddleInput,
        now: Instant,
        rng: &mut R,
    ) -> Vec<ClientMessage> {
        let mut outbound = Vec::new();
        if !self.phase.is_in_play() {
            return outbound;
        }

        let moved = match self.my_side() {
            Some(side) => self.table.move_paddle(side, input),
            None => false,
        };

        if !self.is_host() {
            if moved {
                outbound.push(self.own_paddle_message());
            }
            return outbound;
        }

        if self.is_multiplayer {
            if moved {
                outbound.push(self.own_paddle_message());
            }
        } else if self.table.drive_ai() | moved {
            outbound.push(ClientMessage::PongPaddleMove(PongPaddleMovePayload {
                cabinet_id: self.id.clone(),
                is_ai: true,
                paddle_y: None,
                left_paddle_y: Some(self.table.left_paddle_y),
                right_paddle_y: Some(self.table.right_paddle_y),
            }));
        }

        if self.serve_pending {
            self.serve_pending = false;
            self.table.serve(rng);
            outbound.push(self.score_message());
            outbound.push(self.ball_message());
            return outbound;
        }

        match self.table.step(now, rng) {
            StepOutcome::Flashing => {}
            StepOutcome::BallMoved => outbound.push(self.ball_message()),
            StepOutcome::BallServed => {
                outbound.push(self.score_message());
                outbound.push(self.ball_message());
            }
            StepOutcome::Scored {
                game_over: false, ..
            } => outbound.push(self.score_message()),
            StepOutcome::Scored {
                side,
                game_over: true,
            } => {
                debug!(cabinet_id = %self.id, ?side, "match decided");
                // Stop simulating until the relay resets the cabinet.
                self.phase = SessionPhase::GameOver;
                outbound.push(self.score_message());
                outbound.push(ClientMessage::PongGameOver(PongGameOverPayload {
                    cabinet_id: self.id.clone(),
                    left_score: self.table.left_score,
                    right_score: self.table.right_score,
                }));
            }
        }

        outbound
    }

    fn sync(&mut self, snapshot: &SessionSnapshot) {
        let was_in_play = self.phase.is_in_play();
        self.phase = snapshot.state;
        self.is_multiplayer = snapshot.is_multiplayer;
        self.player1_id = snapshot.player1_id;
        self.player2_id = snapshot.player2_id;

        if snapshot.state == SessionPhase::Title {
            self.table = PongTable::default();
            return;
        }

        if self.is_host() && snapshot.state.is_in_play() {
            // A new match starts from zero with a fresh serve; one under way
            // keeps the host's own simulation.
            if !was_in_play {
                self.table.reset_scores();
                self.serve_pending = true;
            }
            return;
        }
        self.serve_pending = false;

        self.table.left_score = snapshot.left_score;
        self.table.right_score = snapshot.right_score;
        self.table.left_paddle_y = snapshot.left_paddle_y;
        self.table.right_paddle_y = snapshot.right_paddle_y;
        self.table.ball.x = snapshot.ball_x;
        self.table.ball.y = snapshot.ball_y;
        self.table.velocity.x = snapshot.ball_speed_x;
        self.table.velocity.y = snapshot.ball_speed_y;
        self.table.clear_flash();
        self.table.scoring = snapshot.scoring_state;
    }

    fn apply_paddles(&mut self, update: &PaddleUpdateEvent) {
        match update {
            PaddleUpdateEvent::Ai {
                cabinet_id,
                left_paddle_y,
                right_paddle_y,
                ..
            } if *cabinet_id == self.id && !self.is_host() => {
                self.table.left_paddle_y = *left_paddle_y;
                self.table.right_paddle_y = *right_paddle_y;
            }
            PaddleUpdateEvent::Player {
                cabinet_id,
                player_id,
                paddle_y,
            } if *cabinet_id == self.id && *player_id != self.me => {
                if self.player1_id == Some(*player_id) {
                    self.table.left_paddle_y = *paddle_y;
                } else if self.player2_id == Some(*player_id) {
                    self.table.right_paddle_y = *paddle_y;
                }
            }
            _ => {}
        }
    }

    fn own_paddle_message(&self) -> ClientMessage {
        let paddle_y = match self.my_side() {
            Some(PongSide::Right) => self.table.right_paddle_y,
            _ => self.table.left_paddle_y,
        };
        ClientMessage::PongPaddleMove(PongPaddleMovePayload {
            cabinet_id: self.id.clone(),
            is_ai: false,
            paddle_y: Some(paddle_y),
            left_paddle_y: None,
            right_paddle_y: None,
        })
    }

    fn ball_message(&self) -> ClientMessage {
        ClientMessage::PongBallUpdate(PongBallPayload {
            cabinet_id: self.id.clone(),
            x: self.table.ball.x,
            y: self.table.ball.y,
            speed_x: self.table.velocity.x,
            speed_y: self.table.velocity.y,
        })
    }

    fn score_message(&self) -> ClientMessage {
        ClientMessage::PongScoreUpdate(PongScorePayload {
            cabinet_id: self.id.clone(),
            left_score: self.table.left_score,
            right_score: self.table.right_score,
            scoring_state: self.table.scoring,
        })
    }
}
