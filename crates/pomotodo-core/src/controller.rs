//! Session controller.
//!
//! Drives the [`Countdown`] through a day's periods. One controller owns one
//! countdown, one [`ScheduleStore`] and the date it is working on; there is
//! no shared global timer.
//!
//! ## State Transitions
//!
//! ```text
//! Idle --toggle--> Running --toggle--> Paused --toggle--> Running
//!                     |
//!                  complete --(next period)--> Running
//!                     |
//!                     +-----(nothing left)---> Idle
//! any --reset--> Idle
//! ```
//!
//! Clock events are queued on a channel and drained after every command or
//! tick, so completion handling (store write plus re-resolution) always runs
//! to the end before the next tick is processed.

use std::sync::mpsc::Receiver;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info};

use crate::error::Result;
use crate::events::{Event, EventBus};
use crate::schedule::{current_period, Period, PeriodId, PeriodPatch};
use crate::storage::{Persistence, ScheduleStore};
use crate::timer::{ClockEvent, Countdown, CountdownState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControllerPhase {
    Idle,
    Running,
    Paused,
}

/// Everything needed to describe a controller at rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionControllerState {
    pub date: NaiveDate,
    pub phase: ControllerPhase,
    pub countdown: CountdownState,
}

pub struct SessionController<P: Persistence> {
    date: NaiveDate,
    phase: ControllerPhase,
    auto_advance: bool,
    clock: Countdown,
    clock_events: Receiver<ClockEvent>,
    store: ScheduleStore<P>,
    bus: EventBus,
}

impl<P: Persistence> SessionController<P> {
    /// Controller for `date`, publishing on the store's event bus.
    pub fn new(store: ScheduleStore<P>, date: NaiveDate) -> Self {
        let (clock, clock_events) = Countdown::channel();
        let bus = store.bus().clone();
        Self {
            date,
            phase: ControllerPhase::Idle,
            auto_advance: true,
            clock,
            clock_events,
            store,
            bus,
        }
    }

    /// When disabled, a finished countdown leaves the controller idle.
    pub fn with_auto_advance(mut self, auto_advance: bool) -> Self {
        self.auto_advance = auto_advance;
        self
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn phase(&self) -> ControllerPhase {
        self.phase
    }

    pub fn state(&self) -> SessionControllerState {
        SessionControllerState {
            date: self.date,
            phase: self.phase,
            countdown: self.clock.state(),
        }
    }

    pub fn store(&self) -> &ScheduleStore<P> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ScheduleStore<P> {
        &mut self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// The period the next toggle would start from idle.
    pub fn current_period(&self) -> Option<&Period> {
        current_period(self.store.get_periods(self.date))
    }

    /// The period the countdown is bound to, if it still exists.
    pub fn active_period(&self) -> Option<&Period> {
        let id = self.clock.active_period_id()?;
        self.store.period(self.date, id)
    }

    /// State for display. While idle this describes the period a toggle
    /// would start, at full length.
    pub fn snapshot(&self) -> Event {
        let (period, remaining_secs) = match self.phase {
            ControllerPhase::Idle => {
                let period = self.current_period();
                (period, period.map(Period::duration_secs).unwrap_or(0))
            }
            ControllerPhase::Running | ControllerPhase::Paused => {
                (self.active_period(), self.clock.remaining_secs())
            }
        };
        Event::StateSnapshot {
            phase: self.phase,
            date: self.date,
            period_id: period.map(Period::id),
            period_type: period.map(Period::period_type),
            remaining_secs,
            total_secs: period.map(Period::duration_secs).unwrap_or(0),
            at: Utc::now(),
        }
    }

    // ── Commands ─────────────────────────────────────────────────────

    /// Start, pause or resume depending on the current phase.
    pub fn toggle(&mut self) -> Result<()> {
        match self.phase {
            ControllerPhase::Running => {
                self.clock.pause();
                self.phase = ControllerPhase::Paused;
            }
            ControllerPhase::Paused => self.resume(),
            ControllerPhase::Idle => self.start_current(),
        }
        self.drain()
    }

    /// Start a specific period. Unknown ids are ignored and return `false`.
    pub fn start_explicit(&mut self, period_id: PeriodId) -> Result<bool> {
        let Some(period) = self.store.period(self.date, period_id).cloned() else {
            return Ok(false);
        };
        if !(self.clock.is_running() && self.clock.active_period_id() == Some(period_id)) {
            self.begin(&period);
        }
        self.drain()?;
        Ok(true)
    }

    /// Stop the countdown without marking anything complete.
    pub fn reset(&mut self) -> Result<()> {
        self.clock.stop();
        self.phase = ControllerPhase::Idle;
        self.drain()?;
        self.bus.emit(self.snapshot());
        Ok(())
    }

    /// Work on another date. Any countdown in progress is reset.
    pub fn set_date(&mut self, date: NaiveDate) -> Result<()> {
        if self.date == date {
            return Ok(());
        }
        self.date = date;
        self.reset()
    }

    /// Bring back a saved countdown as paused. Returns `false`, leaving the
    /// controller untouched, unless the bound period still exists on this
    /// date, is incomplete, and has time left.
    pub fn restore(&mut self, countdown: CountdownState) -> bool {
        let resumable = countdown.remaining_secs > 0
            && countdown
                .active_period_id
                .and_then(|id| self.store.period(self.date, id))
                .is_some_and(|p| !p.completed);
        if !resumable {
            return false;
        }
        self.clock.restore(countdown);
        self.phase = ControllerPhase::Paused;
        debug!(remaining_secs = countdown.remaining_secs, "countdown restored");
        true
    }

    /// One elapsed second.
    pub fn tick(&mut self) -> Result<()> {
        if self.phase == ControllerPhase::Running {
            self.clock.tick();
        }
        self.drain()
    }

    /// `seconds` elapsed seconds, one tick at a time.
    pub fn advance(&mut self, seconds: u64) -> Result<()> {
        for _ in 0..seconds {
            self.tick()?;
        }
        Ok(())
    }

    // ── Internal ─────────────────────────────────────────────────────

    fn resume(&mut self) {
        // The bound period may have been deleted or completed while paused.
        let bound = self
            .active_period()
            .filter(|p| !p.completed)
            .cloned();
        match bound {
            Some(period) if !self.clock.is_exhausted() => {
                self.clock.start(period.duration_minutes, period.id());
                self.phase = ControllerPhase::Running;
            }
            _ => self.start_current(),
        }
    }

    fn start_current(&mut self) {
        match self.current_period().cloned() {
            Some(period) => self.begin(&period),
            None => self.finish_day(),
        }
    }

    fn begin(&mut self, period: &Period) {
        if self.clock.is_running() {
            self.clock.stop();
        }
        debug!(period_id = %period.id(), kind = %period.period_type(), "starting period");
        self.clock.start(period.duration_minutes, period.id());
        self.phase = ControllerPhase::Running;
    }

    fn finish_day(&mut self) {
        self.phase = ControllerPhase::Idle;
        info!(date = %self.date, "all periods complete");
        self.bus.emit(Event::AllPeriodsComplete {
            date: self.date,
            at: Utc::now(),
        });
    }

    fn drain(&mut self) -> Result<()> {
        while let Ok(event) = self.clock_events.try_recv() {
            match event {
                ClockEvent::Tick {
                    period_id,
                    remaining_secs,
                } => self.bus.emit(Event::Tick {
                    period_id,
                    remaining_secs,
                    at: Utc::now(),
                }),
                ClockEvent::StatusChanged(status) => self.bus.emit(Event::StatusChanged {
                    status,
                    at: Utc::now(),
                }),
                ClockEvent::Complete { period_id } => self.handle_complete(period_id)?,
            }
        }
        Ok(())
    }

    fn handle_complete(&mut self, period_id: PeriodId) -> Result<()> {
        self.phase = ControllerPhase::Idle;
        // Missing periods (deleted mid-run) are a no-op here.
        self.store
            .update_period(self.date, period_id, PeriodPatch::completed(true))?;
        info!(%period_id, "period complete");
        self.bus.emit(Event::PeriodCompleted {
            period_id,
            at: Utc::now(),
        });

        match self.current_period().cloned() {
            Some(next) if self.auto_advance => {
                self.begin(&next);
                info!(period_id = %next.id(), "advanced to next period");
                self.bus.emit(Event::PeriodAdvanced {
                    period: next,
                    at: Utc::now(),
                });
            }
            Some(_) => {}
            None => self.finish_day(),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::drain_pending;
    use crate::storage::MemoryPersistence;
    use crate::timer::ClockStatus;
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, 2).unwrap()
    }

    fn controller() -> SessionController<MemoryPersistence> {
        let store = ScheduleStore::open(MemoryPersistence::new(), EventBus::new()).unwrap();
        SessionController::new(store, date())
    }

    fn add(ctl: &mut SessionController<MemoryPersistence>, period: Period) -> PeriodId {
        let id = period.id();
        ctl.store_mut().add_period(date(), period).unwrap();
        id
    }

    fn all_complete(events: &[Event]) -> usize {
        events
            .iter()
            .filter(|e| matches!(e, Event::AllPeriodsComplete { .. }))
            .count()
    }

    #[test]
    fn toggle_on_empty_day_reports_all_complete() {
        let mut ctl = controller();
        let mut rx = ctl.subscribe();
        ctl.toggle().unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Idle);
        let events: Vec<_> = drain_pending(&mut rx);
        assert_eq!(all_complete(&events), 1);
        assert!(!events.iter().any(|e| matches!(e, Event::Tick { .. })));
    }

    #[test]
    fn toggle_cycles_running_paused_running() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(1));

        ctl.toggle().unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Running);
        assert_eq!(ctl.state().countdown.active_period_id, Some(id));
        ctl.advance(10).unwrap();
        assert_eq!(ctl.state().countdown.remaining_secs, 49);

        ctl.toggle().unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Paused);
        ctl.advance(30).unwrap();
        assert_eq!(ctl.state().countdown.remaining_secs, 49);

        ctl.toggle().unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Running);
        assert_eq!(ctl.state().countdown.remaining_secs, 48);
    }

    #[test]
    fn completion_marks_period_and_auto_advances() {
        let mut ctl = controller();
        let group = Uuid::new_v4();
        let study = add(&mut ctl, Period::study(1).in_group(group));
        let rest = add(&mut ctl, Period::rest(1).in_group(group));
        let mut rx = ctl.subscribe();

        ctl.toggle().unwrap();
        ctl.advance(60).unwrap();

        assert!(ctl.store().period(date(), study).unwrap().completed);
        assert!(!ctl.store().period(date(), rest).unwrap().completed);
        assert_eq!(ctl.phase(), ControllerPhase::Running);
        assert_eq!(ctl.state().countdown.active_period_id, Some(rest));
        assert_eq!(ctl.state().countdown.remaining_secs, 59);

        let events: Vec<_> = drain_pending(&mut rx);
        let advanced: Vec<PeriodId> = events
            .iter()
            .filter_map(|e| match e {
                Event::PeriodAdvanced { period, .. } => Some(period.id()),
                _ => None,
            })
            .collect();
        assert_eq!(advanced, vec![rest]);
    }

    #[test]
    fn last_completion_goes_idle() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(1));
        let mut rx = ctl.subscribe();
        ctl.toggle().unwrap();
        ctl.advance(60).unwrap();

        assert_eq!(ctl.phase(), ControllerPhase::Idle);
        assert!(ctl.store().period(date(), id).unwrap().completed);
        let events: Vec<_> = drain_pending(&mut rx);
        assert_eq!(all_complete(&events), 1);

        ctl.advance(5).unwrap();
        assert!(drain_pending(&mut rx).is_empty());
    }

    #[test]
    fn auto_advance_off_stops_after_each_period() {
        let store = ScheduleStore::open(MemoryPersistence::new(), EventBus::new()).unwrap();
        let mut ctl = SessionController::new(store, date()).with_auto_advance(false);
        add(&mut ctl, Period::study(1));
        let second = add(&mut ctl, Period::study(1));

        ctl.toggle().unwrap();
        ctl.advance(60).unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Idle);

        ctl.toggle().unwrap();
        assert_eq!(ctl.state().countdown.active_period_id, Some(second));
        assert_eq!(ctl.state().countdown.remaining_secs, 59);
    }

    #[test]
    fn reset_discards_progress_without_completing() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(1));
        ctl.toggle().unwrap();
        ctl.advance(20).unwrap();
        let mut rx = ctl.subscribe();
        ctl.reset().unwrap();

        assert_eq!(ctl.phase(), ControllerPhase::Idle);
        assert!(!ctl.store().period(date(), id).unwrap().completed);
        let events: Vec<_> = drain_pending(&mut rx);
        assert!(events.iter().any(|e| matches!(
            e,
            Event::StatusChanged {
                status: ClockStatus::Stopped,
                ..
            }
        )));
        match events.last() {
            Some(Event::StateSnapshot {
                phase,
                period_id,
                remaining_secs,
                ..
            }) => {
                assert_eq!(*phase, ControllerPhase::Idle);
                assert_eq!(*period_id, Some(id));
                assert_eq!(*remaining_secs, 60);
            }
            other => panic!("expected snapshot, got {other:?}"),
        }

        ctl.toggle().unwrap();
        assert_eq!(ctl.state().countdown.remaining_secs, 59);
    }

    #[test]
    fn resume_after_bound_period_deleted_picks_next() {
        let mut ctl = controller();
        let first = add(&mut ctl, Period::study(1));
        let second = add(&mut ctl, Period::study(2));
        ctl.toggle().unwrap();
        ctl.toggle().unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Paused);

        ctl.store_mut().delete_period(date(), first).unwrap();
        ctl.toggle().unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Running);
        assert_eq!(ctl.state().countdown.active_period_id, Some(second));
        assert_eq!(ctl.state().countdown.remaining_secs, 2 * 60 - 1);
    }

    #[test]
    fn completion_of_deleted_period_still_advances() {
        let mut ctl = controller();
        let first = add(&mut ctl, Period::study(1));
        let second = add(&mut ctl, Period::study(1));
        ctl.toggle().unwrap();
        ctl.store_mut().delete_period(date(), first).unwrap();
        ctl.advance(60).unwrap();
        assert_eq!(ctl.state().countdown.active_period_id, Some(second));
        assert_eq!(ctl.phase(), ControllerPhase::Running);
    }

    #[test]
    fn start_explicit_switches_period() {
        let mut ctl = controller();
        add(&mut ctl, Period::study(1));
        let later = add(&mut ctl, Period::study(3));
        ctl.toggle().unwrap();

        assert!(ctl.start_explicit(later).unwrap());
        assert_eq!(ctl.state().countdown.active_period_id, Some(later));
        assert_eq!(ctl.state().countdown.remaining_secs, 3 * 60 - 1);

        // Starting the running period again leaves it alone.
        ctl.advance(5).unwrap();
        assert!(ctl.start_explicit(later).unwrap());
        assert_eq!(ctl.state().countdown.remaining_secs, 3 * 60 - 6);

        assert!(!ctl.start_explicit(Uuid::new_v4()).unwrap());
    }

    #[test]
    fn reopened_period_runs_full_countdown_again() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(1));
        ctl.toggle().unwrap();
        ctl.advance(60).unwrap();
        assert!(ctl.store().period(date(), id).unwrap().completed);

        ctl.store_mut()
            .update_period(date(), id, PeriodPatch::completed(false))
            .unwrap();
        let mut rx = ctl.subscribe();
        ctl.toggle().unwrap();

        assert_eq!(ctl.phase(), ControllerPhase::Running);
        assert_eq!(ctl.state().countdown.active_period_id, Some(id));
        assert_eq!(ctl.state().countdown.remaining_secs, 59);
        assert!(!ctl.store().period(date(), id).unwrap().completed);
        let events = drain_pending(&mut rx);
        assert!(!events
            .iter()
            .any(|e| matches!(e, Event::PeriodCompleted { .. })));
    }

    #[test]
    fn start_explicit_after_completion_restarts_period() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(1));
        ctl.toggle().unwrap();
        ctl.advance(60).unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Idle);

        assert!(ctl.start_explicit(id).unwrap());
        assert_eq!(ctl.phase(), ControllerPhase::Running);
        assert_eq!(ctl.state().countdown.remaining_secs, 59);

        ctl.advance(59).unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Running);
        ctl.advance(1).unwrap();
        assert_eq!(ctl.phase(), ControllerPhase::Idle);
    }

    #[test]
    fn restore_requires_live_period() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(5));
        assert!(!ctl.restore(CountdownState {
            remaining_secs: 100,
            is_running: false,
            active_period_id: Some(Uuid::new_v4()),
        }));
        assert!(ctl.restore(CountdownState {
            remaining_secs: 100,
            is_running: true,
            active_period_id: Some(id),
        }));
        assert_eq!(ctl.phase(), ControllerPhase::Paused);

        ctl.toggle().unwrap();
        assert_eq!(ctl.state().countdown.remaining_secs, 99);
    }

    #[test]
    fn snapshot_while_idle_shows_current_period() {
        let mut ctl = controller();
        let id = add(&mut ctl, Period::study(25));
        match ctl.snapshot() {
            Event::StateSnapshot {
                phase,
                period_id,
                remaining_secs,
                total_secs,
                ..
            } => {
                assert_eq!(phase, ControllerPhase::Idle);
                assert_eq!(period_id, Some(id));
                assert_eq!(remaining_secs, 25 * 60);
                assert_eq!(total_secs, 25 * 60);
            }
            _ => panic!("Expected StateSnapshot"),
        }
    }

    #[test]
    fn set_date_resets_running_countdown() {
        let mut ctl = controller();
        add(&mut ctl, Period::study(1));
        ctl.toggle().unwrap();
        let tomorrow = date().succ_opt().unwrap();
        ctl.set_date(tomorrow).unwrap();
        assert_eq!(ctl.date(), tomorrow);
        assert_eq!(ctl.phase(), ControllerPhase::Idle);
        assert_eq!(ctl.state().countdown, CountdownState::default());
    }
}
