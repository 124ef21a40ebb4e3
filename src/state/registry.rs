use indexmap::IndexMap;

use crate::dto::{
    common::{ConnectionId, Vec3},
    ws::PlayerSnapshot,
};

/// Position handed to every avatar before the client reports its own spawn point.
pub const DEFAULT_SPAWN: Vec3 = Vec3::new(-5.0, 1.6, -8.0);

/// Lightweight avatar state tracked for each live connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerRecord {
    /// Connection that owns this avatar.
    pub id: ConnectionId,
    /// Last reported world position.
    pub position: Vec3,
    /// Last reported Euler rotation (roll stored but unused).
    pub rotation: Vec3,
    /// Most recent chat line, empty until the player speaks.
    pub last_chat_message: String,
}

impl PlayerRecord {
    fn spawn(id: ConnectionId) -> Self {
        Self {
            id,
            position: DEFAULT_SPAWN,
            rotation: Vec3::default(),
            last_chat_message: String::new(),
        }
    }

    /// Public projection sent to other clients.
    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            id: self.id,
            position: self.position,
            rotation: self.rotation,
            last_chat_message: self.last_chat_message.clone(),
        }
    }
}

/// Map from live connection to its avatar record, in connection order.
///
/// Mutators return `false` when the connection is unknown so callers can treat
/// a disconnect racing a message as a silent no-op.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    players: IndexMap<ConnectionId, PlayerRecord>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a fresh record at the default spawn point and return it.
    pub fn register(&mut self, id: ConnectionId) -> &PlayerRecord {
        self.players
            .entry(id)
            .or_insert_with(|| PlayerRecord::spawn(id))
    }

    /// Look up a record.
    pub fn get(&self, id: &ConnectionId) -> Option<&PlayerRecord> {
        self.players.get(id)
    }

    /// Overwrite the position (and optionally the rotation) reported at spawn.
    pub fn set_initial_position(
        &mut self,
        id: &ConnectionId,
        position: Vec3,
        rotation: Option<Vec3>,
    ) -> bool {
        let Some(record) = self.players.get_mut(id) else {
            return false;
        };
        record.position = position;
        if let Some(rotation) = rotation {
            record.rotation = rotation;
        }
        true
    }

    /// Overwrite position and rotation together.
    pub fn update_transform(&mut self, id: &ConnectionId, position: Vec3, rotation: Vec3) -> bool {
        let Some(record) = self.players.get_mut(id) else {
            return false;
        };
        record.position = position;
        record.rotation = rotation;
        true
    }

    /// Overwrite the last chat line.
    pub fn set_chat_message(&mut self, id: &ConnectionId, text: String) -> bool {
        let Some(record) = self.players.get_mut(id) else {
            return false;
        };
        record.last_chat_message = text;
        true
    }

    /// Drop a record, returning it if it existed.
    pub fn unregister(&mut self, id: &ConnectionId) -> Option<PlayerRecord> {
        self.players.shift_remove(id)
    }

    /// Snapshots of every record except `id`.
    pub fn others(&self, id: &ConnectionId) -> Vec<PlayerSnapshot> {
        self.players
            .values()
            .filter(|record| record.id != *id)
            .map(PlayerRecord::snapshot)
            .collect()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.players.len()
    }

    /// True when nobody is connected.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_uses_default_spawn() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        let record = registry.register(id).clone();
        assert_eq!(record.position, DEFAULT_SPAWN);
        assert_eq!(record.rotation, Vec3::default());
        assert!(record.last_chat_message.is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn mutators_ignore_unknown_connections() {
        let mut registry = ConnectionRegistry::new();
        let ghost = ConnectionId::new();
        assert!(!registry.set_initial_position(&ghost, Vec3::default(), None));
        assert!(!registry.update_transform(&ghost, Vec3::default(), Vec3::default()));
        assert!(!registry.set_chat_message(&ghost, "hi".into()));
        assert!(registry.unregister(&ghost).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn transform_and_chat_overwrite_in_place() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id);

        assert!(registry.update_transform(&id, Vec3::new(1.0, 0.0, 2.0), Vec3::new(0.0, 1.5, 0.0)));
        assert!(registry.set_chat_message(&id, "hello".into()));

        let record = registry.get(&id).unwrap();
        assert_eq!(record.position, Vec3::new(1.0, 0.0, 2.0));
        assert_eq!(record.rotation, Vec3::new(0.0, 1.5, 0.0));
        assert_eq!(record.last_chat_message, "hello");
    }

    #[test]
    fn initial_position_keeps_rotation_unless_given() {
        let mut registry = ConnectionRegistry::new();
        let id = ConnectionId::new();
        registry.register(id);

        registry.set_initial_position(&id, Vec3::new(3.0, 0.0, 3.0), None);
        assert_eq!(registry.get(&id).unwrap().rotation, Vec3::default());

        registry.set_initial_position(&id, Vec3::new(3.0, 0.0, 3.0), Some(Vec3::new(0.0, 3.0, 0.0)));
        assert_eq!(registry.get(&id).unwrap().rotation, Vec3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn others_excludes_the_caller() {
        let mut registry = ConnectionRegistry::new();
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        registry.register(a);
        registry.register(b);

        let others = registry.others(&a);
        assert_eq!(others.len(), 1);
        assert_eq!(others[0].id, b);
    }
}
