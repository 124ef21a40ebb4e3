//! Outbound avatar updates, coalesced to one `playerMove` per flush period.

use std::time::Duration;

use tokio::{
    sync::mpsc,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::debug;

use crate::dto::ws::{ClientMessage, PlayerMovePayload};

/// How often the local avatar transform is sent to the relay.
pub const MOVE_FLUSH_PERIOD: Duration = Duration::from_millis(500);

/// Holds at most one pending move; newer transforms replace older ones.
#[derive(Debug, Clone, Default)]
pub struct MoveBatcher {
    pending: Option<PlayerMovePayload>,
}

impl MoveBatcher {
    /// Empty batcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever was pending with `payload`.
    pub fn record(&mut self, payload: PlayerMovePayload) {
        self.pending = Some(payload);
    }

    /// True when a move waits for the next flush.
    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Take the pending move as a wire message, leaving nothing queued.
    pub fn flush(&mut self) -> Option<ClientMessage> {
        self.pending.take().map(ClientMessage::PlayerMove)
    }
}

/// Drive a [`MoveBatcher`] from a stream of local transforms.
///
/// Every `period` the latest transform (if any) is pushed to `outbound`. When
/// `moves` closes, whatever is still pending is flushed before returning.
pub async fn run(
    mut moves: mpsc::UnboundedReceiver<PlayerMovePayload>,
    outbound: mpsc::UnboundedSender<ClientMessage>,
    period: Duration,
) {
    let mut batcher = MoveBatcher::new();
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            next = moves.recv() => match next {
                Some(payload) => batcher.record(payload),
                None => break,
            },
            _ = ticker.tick() => {
                if let Some(message) = batcher.flush() {
                    if outbound.send(message).is_err() {
                        debug!("move sink closed; stopping batcher");
                        return;
                    }
                }
            }
        }
    }

    if let Some(message) = batcher.flush() {
        let _ = outbound.send(message);
    }
}
