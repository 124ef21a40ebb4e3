pub mod lifecycle;
pub mod registry;
pub mod relay;
pub mod session;

use std::sync::Arc;

use axum::extract::ws::Message;
use dashmap::DashMap;
use tokio::sync::{mpsc, watch};

use crate::{
    config::AppConfig,
    dto::{common::ConnectionId, ws::ClientMessage},
    error::ServiceError,
    state::lifecycle::ResetTicket,
};

pub type SharedState = Arc<AppState>;

#[derive(Debug, Clone)]
/// Handle used to push frames to a connected client.
pub struct ClientHandle {
    pub id: ConnectionId,
    pub tx: mpsc::UnboundedSender<Message>,
}

/// Work items consumed by the relay loop, in arrival order.
#[derive(Debug)]
pub enum RelayCommand {
    /// A socket was upgraded; the loop registers its handle before replying.
    Connected(ClientHandle),
    /// A parsed and validated frame from a live socket.
    Inbound {
        from: ConnectionId,
        message: ClientMessage,
    },
    /// A socket closed or errored.
    Disconnected(ConnectionId),
    /// A post-game reset timer elapsed.
    ResetDue(ResetTicket),
}

/// Occupancy figures published by the relay loop after every command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    pub players: usize,
    pub sessions: usize,
}

/// Process root: configuration, live socket handles, and the relay loop's inbox.
pub struct AppState {
    config: Arc<AppConfig>,
    clients: DashMap<ConnectionId, ClientHandle>,
    commands: mpsc::UnboundedSender<RelayCommand>,
    stats: watch::Sender<RelayStats>,
}

impl AppState {
    /// Construct the shared state together with the receiving end of the relay inbox.
    ///
    /// The receiver must be handed to [`crate::services::relay_service::run`].
    pub fn new(config: AppConfig) -> (SharedState, mpsc::UnboundedReceiver<RelayCommand>) {
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (stats_tx, _rx) = watch::channel(RelayStats::default());
        let state = Arc::new(Self {
            config: Arc::new(config),
            clients: DashMap::new(),
            commands: commands_tx,
            stats: stats_tx,
        });
        (state, commands_rx)
    }

    /// Shared configuration handle.
    pub fn config(&self) -> Arc<AppConfig> {
        self.config.clone()
    }

    /// Registry of live sockets keyed by connection id, mutated only by the relay loop.
    pub fn clients(&self) -> &DashMap<ConnectionId, ClientHandle> {
        &self.clients
    }

    /// Queue a command for the relay loop.
    pub fn submit(&self, command: RelayCommand) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .map_err(|_| ServiceError::RelayUnavailable)
    }

    /// True while the relay inbox is alive, i.e. the loop task has not returned or panicked.
    pub fn relay_running(&self) -> bool {
        !self.commands.is_closed()
    }

    /// Sender half of the relay inbox, for tasks that re-enter the loop later.
    pub fn command_sender(&self) -> mpsc::UnboundedSender<RelayCommand> {
        self.commands.clone()
    }

    /// Latest published occupancy.
    pub fn stats(&self) -> RelayStats {
        *self.stats.borrow()
    }

    /// Subscribe to occupancy updates.
    pub fn stats_watcher(&self) -> watch::Receiver<RelayStats> {
        self.stats.subscribe()
    }

    /// Publish occupancy, notifying watchers only when it changed.
    pub fn publish_stats(&self, stats: RelayStats) {
        self.stats.send_if_modified(|current| {
            if *current == stats {
                return false;
            }
            *current = stats;
            true
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_stops_running_once_its_inbox_is_gone() {
        let (state, inbox) = AppState::new(AppConfig::default());
        assert!(state.relay_running());

        drop(inbox);
        assert!(!state.relay_running());
        assert!(state.submit(RelayCommand::Disconnected(ConnectionId::new())).is_err());
    }

    #[test]
    fn stats_watchers_only_see_changes() {
        let (state, _inbox) = AppState::new(AppConfig::default());
        let mut watcher = state.stats_watcher();

        state.publish_stats(RelayStats::default());
        assert!(!watcher.has_changed().unwrap());

        state.publish_stats(RelayStats {
            players: 2,
            sessions: 1,
        });
        assert!(watcher.has_changed().unwrap());
        assert_eq!(*watcher.borrow_and_update(), state.stats());
    }

    #[test]
    fn submit_fails_once_the_loop_is_gone() {
        let (state, inbox) = AppState::new(AppConfig::default());
        drop(inbox);
        assert!(matches!(
            state.submit(RelayCommand::Disconnected(ConnectionId::new())),
            Err(ServiceError::RelayUnavailable)
        ));
    }
}
