//! Message catalogue exchanged over the relay WebSocket.
//!
//! Every frame is a JSON text message shaped as `{"event": "<name>", "data": <payload>}`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::dto::{
    common::{CabinetId, ConnectionId, PongSide, Vec3},
    phase::SessionPhase,
    validation::{
        MAX_CABINET_ID_LEN, PONG_FIELD_SIZE, validate_cabinet_id, validate_field_coord,
        validate_finite, validate_player_number,
    },
};

/// Largest per-tick ball velocity component accepted from a host.
pub const MAX_BALL_SPEED: f32 = 64.0;

/// Reasons an inbound frame is refused at the transport boundary.
#[derive(Debug, Error)]
pub enum PayloadError {
    /// Frame is not JSON or does not match any known event shape.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
    /// Frame parsed but failed field validation.
    #[error("invalid payload: {0}")]
    Invalid(#[from] ValidationErrors),
}

/// Events accepted from browser clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    InitialPosition(InitialPositionPayload),
    PlayerMove(PlayerMovePayload),
    ArcadeInteraction(ArcadeInteractionPayload),
    ChatMessage(ChatMessagePayload),
    PongPlayerJoined(PongPlayerJoinedPayload),
    PongPlayerLeft(CabinetRef),
    PongStateChange(PongStateChangePayload),
    PongPaddleMove(PongPaddleMovePayload),
    PongBallUpdate(PongBallPayload),
    PongScoreUpdate(PongScorePayload),
    PongGameOver(PongGameOverPayload),
}

impl ClientMessage {
    /// Parse a text frame and run payload validation before it reaches session state.
    pub fn from_json_str(text: &str) -> Result<Self, PayloadError> {
        let message: Self = serde_json::from_str(text)?;
        message.validate()?;
        Ok(message)
    }

    /// Wire name of the event, used for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::InitialPosition(_) => "initialPosition",
            Self::PlayerMove(_) => "playerMove",
            Self::ArcadeInteraction(_) => "arcadeInteraction",
            Self::ChatMessage(_) => "chatMessage",
            Self::PongPlayerJoined(_) => "pongPlayerJoined",
            Self::PongPlayerLeft(_) => "pongPlayerLeft",
            Self::PongStateChange(_) => "pongStateChange",
            Self::PongPaddleMove(_) => "pongPaddleMove",
            Self::PongBallUpdate(_) => "pongBallUpdate",
            Self::PongScoreUpdate(_) => "pongScoreUpdate",
            Self::PongGameOver(_) => "pongGameOver",
        }
    }
}

impl Validate for ClientMessage {
    fn validate(&self) -> Result<(), ValidationErrors> {
        match self {
            Self::InitialPosition(payload) => payload.validate(),
            Self::PlayerMove(payload) => payload.validate(),
            Self::ArcadeInteraction(payload) => payload.validate(),
            // Length is capped by the relay against the configured limit.
            Self::ChatMessage(_) => Ok(()),
            Self::PongPlayerJoined(payload) => payload.validate(),
            Self::PongPlayerLeft(payload) => payload.validate(),
            Self::PongStateChange(payload) => payload.validate(),
            Self::PongPaddleMove(payload) => payload.validate(),
            Self::PongBallUpdate(payload) => payload.validate(),
            Self::PongScoreUpdate(payload) => payload.validate(),
            Self::PongGameOver(payload) => payload.validate(),
        }
    }
}

/// Spawn position reported by a client right after connecting.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct InitialPositionPayload {
    #[serde(flatten)]
    pub position: Vec3,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<Vec3>,
}

impl Validate for InitialPositionPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(position_errors) = self.position.validate() {
            errors.merge_self("position", Err(position_errors));
        }
        if let Some(rotation) = &self.rotation {
            if let Err(rotation_errors) = rotation.validate() {
                errors.merge_self("rotation", Err(rotation_errors));
            }
        }
        into_result(errors)
    }
}

/// Batched avatar transform.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMovePayload {
    pub position: Vec3,
    pub rotation: Vec3,
    #[serde(default)]
    pub velocity_y: f32,
}

impl Validate for PlayerMovePayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Err(position_errors) = self.position.validate() {
            errors.merge_self("position", Err(position_errors));
        }
        if let Err(rotation_errors) = self.rotation.validate() {
            errors.merge_self("rotation", Err(rotation_errors));
        }
        add_if_err(&mut errors, "velocityY", validate_finite(self.velocity_y));
        into_result(errors)
    }
}

/// Click on an arcade machine, relayed to everyone else without state.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArcadeInteractionPayload {
    pub machine_id: String,
    pub action: String,
}

impl Validate for ArcadeInteractionPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "machineId", validate_short_text(&self.machine_id));
        add_if_err(&mut errors, "action", validate_short_text(&self.action));
        into_result(errors)
    }
}

/// Chat text typed by a player.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ChatMessagePayload {
    pub text: String,
}

/// Join-flow announcement that a connection took a paddle slot.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongPlayerJoinedPayload {
    pub player_id: ConnectionId,
    pub player_number: u8,
    pub cabinet_id: CabinetId,
}

impl Validate for PongPlayerJoinedPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "playerNumber", validate_player_number(self.player_number));
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        into_result(errors)
    }
}

/// Payload that only names a cabinet.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CabinetRef {
    pub cabinet_id: CabinetId,
}

impl Validate for CabinetRef {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        into_result(errors)
    }
}

/// State-change flow update for a cabinet.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongStateChangePayload {
    pub cabinet_id: CabinetId,
    pub state: SessionPhase,
    #[serde(default)]
    pub is_multiplayer: Option<bool>,
    #[serde(default)]
    pub player1_id: Option<ConnectionId>,
    #[serde(default)]
    pub player2_id: Option<ConnectionId>,
}

impl Validate for PongStateChangePayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        if matches!(
            self.state,
            SessionPhase::WaitingForOpponent | SessionPhase::Active
        ) {
            let mut err = ValidationError::new("state_vocabulary");
            err.message = Some("join-flow phases cannot be set through pongStateChange".into());
            errors.add("state", err);
        }
        if self.player1_id.is_some() && self.player1_id == self.player2_id {
            let mut err = ValidationError::new("distinct_players");
            err.message = Some("player1Id and player2Id must differ".into());
            errors.add("player2Id", err);
        }
        into_result(errors)
    }
}

/// Paddle position report; either one human paddle or both paddles in AI mode.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongPaddleMovePayload {
    pub cabinet_id: CabinetId,
    #[serde(default, rename = "isAI")]
    pub is_ai: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub paddle_y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub left_paddle_y: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub right_paddle_y: Option<f32>,
}

/// Paddle update after the payload shape has been checked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PaddleCommand {
    /// AI mode: the host drives both paddles.
    Both { left: f32, right: f32 },
    /// Human mode: the sender moves the paddle it owns.
    Own(f32),
}

impl PongPaddleMovePayload {
    /// Interpret the payload; `None` when the fields required by its mode are missing.
    pub fn command(&self) -> Option<PaddleCommand> {
        if self.is_ai {
            Some(PaddleCommand::Both {
                left: self.left_paddle_y?,
                right: self.right_paddle_y?,
            })
        } else {
            self.paddle_y.map(PaddleCommand::Own)
        }
    }
}

impl Validate for PongPaddleMovePayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        match self.command() {
            Some(PaddleCommand::Both { left, right }) => {
                add_if_err(&mut errors, "leftPaddleY", validate_paddle_y(left));
                add_if_err(&mut errors, "rightPaddleY", validate_paddle_y(right));
            }
            Some(PaddleCommand::Own(paddle_y)) => {
                add_if_err(&mut errors, "paddleY", validate_paddle_y(paddle_y));
            }
            None => {
                let mut err = ValidationError::new("paddle_fields");
                err.message = Some(
                    "expected paddleY, or leftPaddleY and rightPaddleY when isAI is set".into(),
                );
                errors.add("paddleY", err);
            }
        }
        into_result(errors)
    }
}

/// Authoritative ball kinematics from the session host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongBallPayload {
    pub cabinet_id: CabinetId,
    pub x: f32,
    pub y: f32,
    pub speed_x: f32,
    pub speed_y: f32,
}

impl Validate for PongBallPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        add_if_err(&mut errors, "x", validate_field_coord(self.x));
        add_if_err(&mut errors, "y", validate_field_coord(self.y));
        add_if_err(&mut errors, "speedX", validate_ball_speed(self.speed_x));
        add_if_err(&mut errors, "speedY", validate_ball_speed(self.speed_y));
        into_result(errors)
    }
}

/// Score change reported by the session host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongScorePayload {
    pub cabinet_id: CabinetId,
    pub left_score: u32,
    pub right_score: u32,
    #[serde(default)]
    pub scoring_state: Option<PongSide>,
}

impl Validate for PongScorePayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        into_result(errors)
    }
}

/// Final score reported by the session host.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongGameOverPayload {
    pub cabinet_id: CabinetId,
    pub left_score: u32,
    pub right_score: u32,
}

impl Validate for PongGameOverPayload {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        add_if_err(&mut errors, "cabinetId", validate_cabinet_id(&self.cabinet_id));
        into_result(errors)
    }
}

/// Events pushed by the relay to browser clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    Welcome(WelcomeEvent),
    PongGamesState(Vec<SessionSnapshot>),
    PlayerJoined(PlayerSnapshot),
    ExistingPlayers(Vec<PlayerSnapshot>),
    PlayerMoved(PlayerMovedEvent),
    PlayerInteraction(PlayerInteractionEvent),
    ChatMessage(ChatBroadcastEvent),
    PongPlayerJoined(PongPlayerJoinedPayload),
    PongGameStart(CabinetRef),
    PongPlayerLeft(PongPlayerLeftEvent),
    PongStateUpdate(SessionSnapshot),
    PongPaddleUpdate(PaddleUpdateEvent),
    PongBallUpdate(PongBallPayload),
    PongScoreUpdate(PongScorePayload),
    PongGameOver(PongGameOverPayload),
    PlayerLeft(PlayerLeftEvent),
}

/// First frame on every socket, telling the client its connection id.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct WelcomeEvent {
    pub id: ConnectionId,
}

/// Full avatar record as known by the relay.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSnapshot {
    pub id: ConnectionId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub last_chat_message: String,
}

/// Avatar transform relayed to other clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerMovedEvent {
    pub id: ConnectionId,
    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity_y: f32,
}

/// Arcade machine interaction relayed to other clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInteractionEvent {
    pub id: ConnectionId,
    pub machine_id: String,
    pub action: String,
}

/// Chat line stamped with the relay clock (milliseconds since the Unix epoch).
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct ChatBroadcastEvent {
    pub id: ConnectionId,
    pub text: String,
    pub timestamp: i64,
}

/// Join-flow departure notice.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PongPlayerLeftEvent {
    pub player_id: ConnectionId,
    pub cabinet_id: CabinetId,
}

/// Paddle positions relayed to the other clients.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(untagged)]
pub enum PaddleUpdateEvent {
    /// AI mode: both paddles at once.
    #[serde(rename_all = "camelCase")]
    Ai {
        cabinet_id: CabinetId,
        #[serde(rename = "isAI")]
        is_ai: bool,
        left_paddle_y: f32,
        right_paddle_y: f32,
    },
    /// Human mode: the paddle owned by `player_id`.
    #[serde(rename_all = "camelCase")]
    Player {
        cabinet_id: CabinetId,
        player_id: ConnectionId,
        paddle_y: f32,
    },
}

/// Notice that a connection went away.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
pub struct PlayerLeftEvent {
    pub id: ConnectionId,
}

/// Join-flow membership entry.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct JoinedPlayerSnapshot {
    pub player_id: ConnectionId,
    pub number: u8,
    pub score: u32,
}

/// Complete public view of one cabinet's session.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub cabinet_id: CabinetId,
    pub state: SessionPhase,
    pub is_multiplayer: bool,
    pub player1_id: Option<ConnectionId>,
    pub player2_id: Option<ConnectionId>,
    pub left_score: u32,
    pub right_score: u32,
    pub left_paddle_y: f32,
    pub right_paddle_y: f32,
    pub ball_x: f32,
    pub ball_y: f32,
    pub ball_speed_x: f32,
    pub ball_speed_y: f32,
    pub scoring_state: Option<PongSide>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub players: Vec<JoinedPlayerSnapshot>,
}

fn validate_short_text(value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > MAX_CABINET_ID_LEN {
        let mut err = ValidationError::new("short_text_length");
        err.message = Some(format!("expected 1 to {MAX_CABINET_ID_LEN} bytes").into());
        return Err(err);
    }
    Ok(())
}

fn validate_paddle_y(value: f32) -> Result<(), ValidationError> {
    validate_finite(value)?;
    if !(0.0..=PONG_FIELD_SIZE).contains(&value) {
        let mut err = ValidationError::new("paddle_range");
        err.message = Some(format!("paddle position {value} is off screen").into());
        return Err(err);
    }
    Ok(())
}

fn validate_ball_speed(value: f32) -> Result<(), ValidationError> {
    validate_finite(value)?;
    if value.abs() > MAX_BALL_SPEED {
        let mut err = ValidationError::new("ball_speed");
        err.message = Some(format!("ball speed {value} exceeds {MAX_BALL_SPEED}").into());
        return Err(err);
    }
    Ok(())
}

fn add_if_err(
    errors: &mut ValidationErrors,
    field: &'static str,
    result: Result<(), ValidationError>,
) {
    if let Err(err) = result {
        errors.add(field, err);
    }
}

fn into_result(errors: ValidationErrors) -> Result<(), ValidationErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
