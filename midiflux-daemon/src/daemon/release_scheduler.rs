// Copyright 2025 Amiable
// SPDX-License-Identifier: MIT

//! Auto-release timers (§4.8 step 4, §9 "Auto-release timers"): implements
//! core's [`ReleaseScheduler`] trait as a single timer source so that a
//! firing release is enqueued as a `DaemonCommand` and processed on the
//! dispatch thread in order with other events, rather than released
//! directly from a detached timer task.

use midiflux_core::action::ReleaseScheduler;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

use crate::daemon::types::DaemonCommand;

pub struct TimerReleaseScheduler {
    command_tx: mpsc::Sender<DaemonCommand>,
}

impl TimerReleaseScheduler {
    pub fn new(command_tx: mpsc::Sender<DaemonCommand>) -> Self {
        TimerReleaseScheduler { command_tx }
    }
}

impl ReleaseScheduler for TimerReleaseScheduler {
    fn schedule_release(&self, held_key: String, delay: Duration) {
        let command_tx = self.command_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            trace!(held_key, "auto-release timer fired");
            let _ = command_tx.send(DaemonCommand::ReleaseFired(held_key)).await;
        });
    }
}
