//! Smoothing of remote avatars between batched network updates.
//!
//! Each avatar keeps the transform it is drawn at and the last transform the
//! relay reported. Every frame the drawn transform chases the reported one at a
//! rate proportional to the frame time, so motion stays smooth even though
//! updates arrive only a couple of times per second. Walking is inferred from
//! horizontal displacement and drives a procedural limb swing; a vertical speed
//! field plays the jump arc locally against a flat ground plane.

use std::f32::consts::PI;

use glam::{EulerRot, Quat, Vec2, Vec3};
use indexmap::IndexMap;

use crate::dto::{
    common::{self, ConnectionId},
    validation::MAX_WORLD_COORD,
    ws::{PlayerMovedEvent, PlayerSnapshot, ServerMessage},
};

const POSITION_RATE: f32 = 15.0;
const MAX_POSITION_FACTOR: f32 = 0.3;
const ROTATION_RATE: f32 = 8.0;
const MAX_ROTATION_FACTOR: f32 = 0.2;
/// Horizontal distance per frame above which an avatar counts as walking.
const MOVING_THRESHOLD: f32 = 0.001;
const WALK_CYCLE_RATE: f32 = 8.0;
const BOB_AMPLITUDE: f32 = 0.04;
const LEG_SWING: f32 = 0.6;
const ARM_SWING: f32 = 0.45;
const GRAVITY: f32 = 9.8;
const JUMP_BLEND: f32 = 0.3;

/// Limb pivot angles around the x axis, in radians.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LimbPose {
    pub left_leg: f32,
    pub right_leg: f32,
    pub left_arm: f32,
    pub right_arm: f32,
}

/// One remote player as drawn locally.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteAvatar {
    current_position: Vec3,
    target_position: Vec3,
    current_rotation: Quat,
    target_rotation: Quat,
    velocity_y: f32,
    animation_time: f32,
    moving: bool,
    limbs: LimbPose,
    last_chat_message: String,
}

impl RemoteAvatar {
    /// Place an avatar from a relay snapshot, standing on the ground.
    ///
    /// Returns `None` when the reported position is not finite or lies outside
    /// the world bounds.
    pub fn spawn(snapshot: &PlayerSnapshot) -> Option<Self> {
        let position: Vec3 = snapshot.position.into();
        if !is_valid_position(position) {
            return None;
        }

        let position = Vec3::new(position.x, 0.0, position.z);
        let yaw = if snapshot.rotation.y == 0.0 {
            PI
        } else {
            snapshot.rotation.y
        };
        let rotation = euler_to_quat(Vec3::new(snapshot.rotation.x, yaw, snapshot.rotation.z));

        Some(Self {
            current_position: position,
            target_position: position,
            current_rotation: rotation,
            target_rotation: rotation,
            velocity_y: 0.0,
            animation_time: 0.0,
            moving: false,
            limbs: LimbPose::default(),
            last_chat_message: snapshot.last_chat_message.clone(),
        })
    }

    /// Record the latest transform reported by the relay.
    pub fn set_target(&mut self, event: &PlayerMovedEvent) {
        self.target_position = event.position.into();
        self.target_rotation = euler_to_quat(event.rotation.into());
        self.velocity_y = event.velocity_y;
    }

    /// Advance the drawn transform by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let previous = self.current_position;
        self.current_position = self
            .current_position
            .lerp(self.target_position, (dt * POSITION_RATE).min(MAX_POSITION_FACTOR));

        let horizontal = Vec2::new(
            self.current_position.x - previous.x,
            self.current_position.z - previous.z,
        )
        .length();
        let moving = horizontal > MOVING_THRESHOLD;

        if moving {
            self.animation_time += dt * WALK_CYCLE_RATE;
            if self.velocity_y == 0.0 {
                self.current_position.y = (self.animation_time * 2.0).sin().abs() * BOB_AMPLITUDE;
            }
        } else if self.velocity_y == 0.0 {
            self.current_position.y = 0.0;
        }

        if self.velocity_y != 0.0 {
            self.velocity_y += (-GRAVITY * dt - self.velocity_y) * JUMP_BLEND;
            self.current_position.y += self.velocity_y * dt;
            if self.current_position.y <= 0.0 {
                self.current_position.y = 0.0;
                self.velocity_y = 0.0;
            }
        }

        self.current_rotation = self
            .current_rotation
            .slerp(self.target_rotation, (dt * ROTATION_RATE).min(MAX_ROTATION_FACTOR));

        if moving != self.moving {
            self.moving = moving;
            if moving {
                self.animation_time = 0.0;
            } else {
                self.limbs = LimbPose::default();
            }
        }

        if self.moving {
            let leg = self.animation_time.sin() * LEG_SWING;
            let arm = self.animation_time.sin() * ARM_SWING;
            self.limbs = LimbPose {
                left_leg: leg,
                right_leg: -leg,
                left_arm: -arm,
                right_arm: arm,
            };
        }
    }

    /// Drawn position.
    pub fn position(&self) -> Vec3 {
        self.current_position
    }

    /// Drawn orientation as XYZ Euler angles.
    pub fn rotation(&self) -> Vec3 {
        let (x, y, z) = self.current_rotation.to_euler(EulerRot::XYZ);
        Vec3::new(x, y, z)
    }

    /// True while the avatar is walking.
    pub fn is_moving(&self) -> bool {
        self.moving
    }

    /// Current limb swing.
    pub fn limbs(&self) -> LimbPose {
        self.limbs
    }

    /// Latest chat line shown above the avatar.
    pub fn last_chat_message(&self) -> &str {
        &self.last_chat_message
    }
}

/// Every remote avatar known to this client, fed from relay broadcasts.
#[derive(Debug, Clone)]
pub struct AvatarRoster {
    me: ConnectionId,
    avatars: IndexMap<ConnectionId, RemoteAvatar>,
}

impl AvatarRoster {
    /// Roster for the local connection `me`, which is never drawn as remote.
    pub fn new(me: ConnectionId) -> Self {
        Self {
            me,
            avatars: IndexMap::new(),
        }
    }

    /// Fold one relay message into the roster; unrelated messages are ignored.
    pub fn apply(&mut self, message: &ServerMessage) {
        match message {
            ServerMessage::PlayerJoined(player) => self.add(player),
            ServerMessage::ExistingPlayers(players) => players.iter().for_each(|p| self.add(p)),
            ServerMessage::PlayerMoved(event) => {
                if let Some(avatar) = self.avatars.get_mut(&event.id) {
                    avatar.set_target(event);
                }
            }
            ServerMessage::ChatMessage(chat) => {
                if let Some(avatar) = self.avatars.get_mut(&chat.id) {
                    avatar.last_chat_message = chat.text.clone();
                }
            }
            ServerMessage::PlayerLeft(event) => {
                self.avatars.shift_remove(&event.id);
            }
            _ => {}
        }
    }

    /// Advance every avatar by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        self.avatars.values_mut().for_each(|avatar| avatar.tick(dt));
    }

    /// Avatar for `id`, if it is known.
    pub fn get(&self, id: &ConnectionId) -> Option<&RemoteAvatar> {
        self.avatars.get(id)
    }

    /// Number of remote avatars.
    pub fn len(&self) -> usize {
        self.avatars.len()
    }

    /// True when no remote avatar is known.
    pub fn is_empty(&self) -> bool {
        self.avatars.is_empty()
    }

    fn add(&mut self, player: &PlayerSnapshot) {
        if player.id == self.me || self.avatars.contains_key(&player.id) {
            return;
        }
        if let Some(avatar) = RemoteAvatar::spawn(player) {
            self.avatars.insert(player.id, avatar);
        }
    }
}

fn is_valid_position(position: Vec3) -> bool {
    position.is_finite() && position.abs().max_element() < MAX_WORLD_COORD
}

fn euler_to_quat(rotation: Vec3) -> Quat {
    Quat::from_euler(EulerRot::XYZ, rotation.x, rotation.y, rotation.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dto::ws::ChatBroadcastEvent;

    fn snapshot(id: ConnectionId, x: f32, z: f32) -> PlayerSnapshot {
        PlayerSnapshot {
            id,
            position: common::Vec3::new(x, 1.6, z),
            rotation: common::Vec3::default(),
            last_chat_message: String::new(),
        }
    }

    fn moved(id: ConnectionId, x: f32, z: f32, velocity_y: f32) -> ServerMessage {
        ServerMessage::PlayerMoved(PlayerMovedEvent {
            id,
            position: common::Vec3::new(x, 0.0, z),
            rotation: common::Vec3::new(0.0, 1.0, 0.0),
            velocity_y,
        })
    }

    #[test]
    fn spawn_grounds_avatar_and_faces_forward() {
        let avatar = RemoteAvatar::spawn(&snapshot(ConnectionId::new(), -5.0, -8.0)).unwrap();
        assert_eq!(avatar.position(), Vec3::new(-5.0, 0.0, -8.0));
        let facing = Quat::from_rotation_y(PI);
        assert!(avatar.current_rotation.dot(facing).abs() > 0.9999);
        assert!(!avatar.is_moving());
    }

    #[test]
    fn spawn_rejects_positions_outside_the_world() {
        let id = ConnectionId::new();
        assert!(RemoteAvatar::spawn(&snapshot(id, 150.0, 0.0)).is_none());
        assert!(RemoteAvatar::spawn(&snapshot(id, f32::NAN, 0.0)).is_none());
    }

    #[test]
    fn avatar_converges_on_target_and_walks_meanwhile() {
        let id = ConnectionId::new();
        let mut roster = AvatarRoster::new(ConnectionId::new());
        roster.apply(&ServerMessage::PlayerJoined(snapshot(id, 0.0, 0.0)));
        roster.apply(&moved(id, 4.0, 0.0, 0.0));

        roster.tick(1.0 / 60.0);
        let avatar = roster.get(&id).unwrap();
        assert!(avatar.is_moving());
        assert!(avatar.position().x > 0.0 && avatar.position().x < 4.0);
        assert!(avatar.position().y >= 0.0 && avatar.position().y <= BOB_AMPLITUDE);

        for _ in 0..600 {
            roster.tick(1.0 / 60.0);
        }
        let avatar = roster.get(&id).unwrap();
        assert!((avatar.position().x - 4.0).abs() < 1e-3);
        assert!(!avatar.is_moving());
        assert_eq!(avatar.limbs(), LimbPose::default());
        assert_eq!(avatar.position().y, 0.0);
        assert!((avatar.rotation().y - 1.0).abs() < 1e-3);
    }

    #[test]
    fn walking_swings_limbs_in_opposition() {
        let id = ConnectionId::new();
        let mut avatar = RemoteAvatar::spawn(&snapshot(id, 0.0, 0.0)).unwrap();
        let ServerMessage::PlayerMoved(event) = moved(id, 10.0, 10.0, 0.0) else {
            unreachable!();
        };
        avatar.set_target(&event);

        for _ in 0..5 {
            avatar.tick(1.0 / 30.0);
        }
        let limbs = avatar.limbs();
        assert!(limbs.left_leg != 0.0);
        assert_eq!(limbs.left_leg, -limbs.right_leg);
        assert_eq!(limbs.left_arm, -limbs.right_arm);
        assert!(limbs.left_leg.abs() <= LEG_SWING);
    }

    #[test]
    fn jump_lands_back_on_the_ground() {
        let id = ConnectionId::new();
        let mut avatar = RemoteAvatar::spawn(&snapshot(id, 0.0, 0.0)).unwrap();
        let ServerMessage::PlayerMoved(event) = moved(id, 0.0, 0.0, 5.0) else {
            unreachable!();
        };
        avatar.set_target(&event);

        avatar.tick(1.0 / 60.0);
        assert!(avatar.position().y > 0.0);

        for _ in 0..600 {
            avatar.tick(1.0 / 60.0);
        }
        assert_eq!(avatar.position().y, 0.0);
    }

    #[test]
    fn roster_skips_self_and_drops_leavers() {
        let me = ConnectionId::new();
        let other = ConnectionId::new();
        let mut roster = AvatarRoster::new(me);
        roster.apply(&ServerMessage::ExistingPlayers(vec![
            snapshot(me, 0.0, 0.0),
            snapshot(other, 1.0, 1.0),
        ]));
        assert_eq!(roster.len(), 1);

        roster.apply(&ServerMessage::PlayerLeft(crate::dto::ws::PlayerLeftEvent { id: other }));
        assert!(roster.is_empty());
    }

    #[test]
    fn chat_lines_stick_to_their_avatar() {
        let me = ConnectionId::new();
        let other = ConnectionId::new();
        let mut roster = AvatarRoster::new(me);
        roster.apply(&ServerMessage::PlayerJoined(PlayerSnapshot {
            last_chat_message: "earlier".into(),
            ..snapshot(other, 0.0, 0.0)
        }));
        assert_eq!(roster.get(&other).unwrap().last_chat_message(), "earlier");

        for (id, text) in [(other, "hello"), (me, "mine")] {
            roster.apply(&ServerMessage::ChatMessage(ChatBroadcastEvent {
                id,
                text: text.into(),
                timestamp: 0,
            }));
        }
        assert_eq!(roster.get(&other).unwrap().last_chat_message(), "hello");
        assert_eq!(roster.len(), 1);
    }
}
