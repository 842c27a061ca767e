use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::{trace, warn};

use crate::controller::ControllerPhase;
use crate::schedule::{Period, PeriodId, PeriodType};
use crate::storage::ScheduleState;
use crate::timer::ClockStatus;

/// Every state change in the system produces an Event.
/// The presentation layer subscribes to them through an [`EventBus`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    Tick {
        period_id: PeriodId,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    StatusChanged {
        status: ClockStatus,
        at: DateTime<Utc>,
    },
    PeriodCompleted {
        period_id: PeriodId,
        at: DateTime<Utc>,
    },
    /// The countdown moved on to `period` without user action.
    PeriodAdvanced {
        period: Period,
        at: DateTime<Utc>,
    },
    /// Informational: nothing left to run on `date`.
    AllPeriodsComplete {
        date: NaiveDate,
        at: DateTime<Utc>,
    },
    /// Emitted by the store after every committed mutation.
    StateChanged {
        state: ScheduleState,
        at: DateTime<Utc>,
    },
    StateSnapshot {
        phase: ControllerPhase,
        date: NaiveDate,
        period_id: Option<PeriodId>,
        period_type: Option<PeriodType>,
        remaining_secs: u64,
        total_secs: u64,
        at: DateTime<Utc>,
    },
}

/// Buffered events per subscriber. Covers over an hour of ticks, so a
/// subscriber that drains after every command never lags.
pub const DEFAULT_CAPACITY: usize = 4096;

/// Fan-out of events to any number of subscribers over a
/// `tokio::sync::broadcast` channel.
///
/// Clones share the same channel. Receivers only see events emitted after
/// they subscribed; dropping a receiver unsubscribes it. A receiver that
/// falls more than `capacity` events behind loses the oldest ones.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<Event>,
    capacity: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }

    /// Emit to every current subscriber. Having none is not an error.
    pub fn emit(&self, event: Event) {
        if self.tx.send(event).is_err() {
            trace!("event emitted with no subscribers");
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Take every event already queued on `rx` without waiting.
///
/// Events lost to lag are logged and skipped.
pub fn drain_pending(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(event) => events.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(skipped, "event subscriber lagged");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    events
}
