use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, info, warn};

use crate::{
    dto::{common::ConnectionId, ws::ClientMessage},
    state::{ClientHandle, RelayCommand, SharedState},
};

/// Handle the full lifecycle for an individual relay WebSocket connection.
///
/// The socket task only parses and validates frames; every state change is
/// forwarded to the relay loop, which answers through the writer channel.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let id = ConnectionId::new();
    let handle = ClientHandle {
        id,
        tx: outbound_tx.clone(),
    };
    if let Err(err) = state.submit(RelayCommand::Connected(handle)) {
        warn!(%id, error = %err, "relay unavailable; closing socket");
        let _ = outbound_tx.send(Message::Close(None));
        finalize(writer_task, outbound_tx).await;
        return;
    }
    info!(%id, "websocket connected");

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(%id, payload = %text, "received client frame");
                match ClientMessage::from_json_str(&text) {
                    Ok(message) => {
                        if state
                            .submit(RelayCommand::Inbound { from: id, message })
                            .is_err()
                        {
                            warn!(%id, "relay stopped; closing socket");
                            break;
                        }
                    }
                    Err(err) => {
                        warn!(%id, error = %err, "failed to parse or validate client frame");
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(%id, "client closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(%id, error = %err, "websocket error");
                break;
            }
        }
    }

    if state.submit(RelayCommand::Disconnected(id)).is_err() {
        debug!(%id, "relay already stopped during disconnect");
    }
    info!(%id, "websocket disconnected");

    finalize(writer_task, outbound_tx).await;
}

/// Ensure the writer task winds down before we return from the socket handler.
///
/// The relay loop drops its clone of the sender when it processes the disconnect.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
