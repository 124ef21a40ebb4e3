//! The relay loop: the only task that mutates the registry and session table.

use axum::extract::ws::Message;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::{
    dto::ws::ServerMessage,
    state::{
        RelayCommand, SharedState,
        lifecycle::schedule_reset,
        relay::{Dispatch, Effects, Relay, Target},
    },
};

/// Consume relay commands while the inbox is open.
///
/// `AppState` holds a sender itself, so in a running server the loop only ends
/// when the state is dropped or the task dies; either way the inbox goes with it
/// and [`AppState::relay_running`](crate::state::AppState::relay_running) turns false.
///
/// Commands are applied one at a time, so each handler observes and leaves a
/// consistent state; outbound frames are queued on the per-socket writers in the
/// order the handler emitted them.
pub async fn run(state: SharedState, mut inbox: mpsc::UnboundedReceiver<RelayCommand>) {
    let config = state.config();
    let mut relay = Relay::new(config.max_chat_len);
    info!("relay loop started");

    while let Some(command) = inbox.recv().await {
        let effects = apply(&state, &mut relay, command);

        for dispatch in &effects.dispatches {
            deliver(&state, dispatch);
        }
        for ticket in effects.resets {
            schedule_reset(state.command_sender(), ticket, config.game_over_reset);
        }

        state.publish_stats(relay.stats());
    }

    info!("relay loop stopped");
}

fn apply(state: &SharedState, relay: &mut Relay, command: RelayCommand) -> Effects {
    match command {
        RelayCommand::Connected(handle) => {
            let id = handle.id;
            state.clients().insert(id, handle);
            relay.connect(id)
        }
        RelayCommand::Inbound { from, message } => {
            let event = message.name();
            debug!(%from, event, "relaying event");
            match relay.handle(from, message) {
                Ok(effects) => effects,
                Err(err) => {
                    warn!(%from, event, error = %err, "rejected client event");
                    Effects::default()
                }
            }
        }
        RelayCommand::Disconnected(id) => {
            state.clients().remove(&id);
            relay.disconnect(id)
        }
        RelayCommand::ResetDue(ticket) => relay.reset_due(ticket),
    }
}

/// Push one message to every live socket its target selects.
fn deliver(state: &SharedState, dispatch: &Dispatch) {
    let Some(frame) = encode(&dispatch.message) else {
        return;
    };

    match dispatch.target {
        Target::Connection(id) => {
            let Some(handle) = state.clients().get(&id) else {
                debug!(%id, "dropping message for departed connection");
                return;
            };
            if handle.tx.send(frame).is_err() {
                debug!(%id, "writer closed; frame dropped");
            }
        }
        target => {
            for handle in state.clients().iter() {
                if target.includes(&handle.id) && handle.tx.send(frame.clone()).is_err() {
                    debug!(id = %handle.id, "writer closed; frame dropped");
                }
            }
        }
    }
}

fn encode(message: &ServerMessage) -> Option<Message> {
    match serde_json::to_string(message) {
        Ok(payload) => Some(Message::Text(payload.into())),
        Err(err) => {
            warn!(error = %err, "failed to serialize message `{message:?}`");
            None
        }
    }
}
