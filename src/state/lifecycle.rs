//! Deferred session resets that re-enter the relay loop after a delay.

use std::time::Duration;

use tokio::{sync::mpsc, task::JoinHandle, time::sleep};
use tracing::debug;

use crate::{dto::common::CabinetId, state::RelayCommand};

/// One armed reset, tagged with the session epoch it was scheduled for.
///
/// When the ticket comes due the reset only applies if the session is still in
/// that epoch; any lifecycle transition in between makes the ticket stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResetTicket {
    /// Cabinet whose session should return to the title screen.
    pub cabinet_id: CabinetId,
    /// Session epoch captured when the timer was armed.
    pub epoch: u64,
}

/// Arm a one-shot timer that sends [`RelayCommand::ResetDue`] after `delay`.
///
/// The timer cannot be cancelled; staleness is resolved by the epoch check when
/// the command is handled.
pub fn schedule_reset(
    commands: mpsc::UnboundedSender<RelayCommand>,
    ticket: ResetTicket,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        debug!(cabinet_id = %ticket.cabinet_id, epoch = ticket.epoch, "session reset timer fired");
        // The relay loop is gone during shutdown; nothing to reset then.
        let _ = commands.send(RelayCommand::ResetDue(ticket));
    })
}
