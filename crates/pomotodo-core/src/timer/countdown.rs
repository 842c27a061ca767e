//! Single-timer countdown.
//!
//! The countdown does not own a thread or a timer. The caller invokes
//! `tick()` once per elapsed second, and every transition is reported as a
//! [`ClockEvent`] on the channel supplied at construction.
//!
//! ## State Transitions
//!
//! ```text
//! unbound -> running -> (paused -> running)* -> exhausted
//!    ^          |                                  |
//!    +------ stop() <------------------------------+
//! ```

use std::sync::mpsc::{self, Receiver, Sender};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::schedule::PeriodId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockStatus {
    Running,
    Paused,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Tick {
        period_id: PeriodId,
        remaining_secs: u64,
    },
    StatusChanged(ClockStatus),
    /// The bound countdown ran out. Emitted once per run.
    Complete { period_id: PeriodId },
}

/// Serializable countdown state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountdownState {
    pub remaining_secs: u64,
    pub is_running: bool,
    pub active_period_id: Option<PeriodId>,
}

#[derive(Debug)]
pub struct Countdown {
    state: CountdownState,
    events: Sender<ClockEvent>,
}

impl Countdown {
    pub fn new(events: Sender<ClockEvent>) -> Self {
        Self {
            state: CountdownState::default(),
            events,
        }
    }

    /// A countdown together with the receiving end of its event channel.
    pub fn channel() -> (Self, Receiver<ClockEvent>) {
        let (tx, rx) = mpsc::channel();
        (Self::new(tx), rx)
    }

    /// Replace the state with a saved one. A restored countdown is never
    /// running, so any in-flight run is halted silently.
    pub fn restore(&mut self, state: CountdownState) {
        self.state = CountdownState {
            is_running: false,
            ..state
        };
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> CountdownState {
        self.state
    }

    pub fn remaining_secs(&self) -> u64 {
        self.state.remaining_secs
    }

    pub fn is_running(&self) -> bool {
        self.state.is_running
    }

    pub fn active_period_id(&self) -> Option<PeriodId> {
        self.state.active_period_id
    }

    /// Bound to a period whose time has run out.
    pub fn is_exhausted(&self) -> bool {
        !self.state.is_running
            && self.state.active_period_id.is_some()
            && self.state.remaining_secs == 0
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start counting down `period_id`.
    ///
    /// A different period, or a bound period whose time has run out, resets
    /// the remaining time to the full duration. Otherwise the bound period
    /// resumes where it stopped. Returns `false` if the countdown was
    /// already running.
    pub fn start(&mut self, duration_minutes: u32, period_id: PeriodId) -> bool {
        if self.state.is_running {
            return false;
        }
        if self.state.active_period_id != Some(period_id) || self.state.remaining_secs == 0 {
            self.state.remaining_secs = u64::from(duration_minutes) * 60;
            self.state.active_period_id = Some(period_id);
        }
        self.state.is_running = true;
        debug!(%period_id, remaining_secs = self.state.remaining_secs, "countdown started");
        self.emit(ClockEvent::StatusChanged(ClockStatus::Running));
        // Immediate tick so the display is never blank.
        self.tick();
        true
    }

    pub fn pause(&mut self) {
        if !self.state.is_running {
            return;
        }
        self.state.is_running = false;
        debug!(remaining_secs = self.state.remaining_secs, "countdown paused");
        self.emit(ClockEvent::StatusChanged(ClockStatus::Paused));
    }

    /// Halt and discard progress.
    pub fn stop(&mut self) {
        self.state = CountdownState::default();
        debug!("countdown stopped");
        self.emit(ClockEvent::StatusChanged(ClockStatus::Stopped));
    }

    /// Advance by one second. Does nothing unless running.
    pub fn tick(&mut self) {
        if !self.state.is_running {
            return;
        }
        let Some(period_id) = self.state.active_period_id else {
            return;
        };
        if self.state.remaining_secs == 0 {
            self.complete(period_id);
            return;
        }
        self.state.remaining_secs -= 1;
        self.emit(ClockEvent::Tick {
            period_id,
            remaining_secs: self.state.remaining_secs,
        });
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn complete(&mut self, period_id: PeriodId) {
        self.state.is_running = false;
        debug!(%period_id, "countdown complete");
        self.emit(ClockEvent::Complete { period_id });
    }

    fn emit(&self, event: ClockEvent) {
        // A dropped receiver only means nobody is listening.
        let _ = self.events.send(event);
    }
}

/// Render seconds as `MM:SS`.
pub fn format_clock(secs: u64) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}
