//! Schedule store: CRUD over dated period lists.
//!
//! Every mutation is applied to a copy of the state, saved through the
//! [`Persistence`] collaborator, and only then committed and announced with
//! an [`Event::StateChanged`]. A rejected input or a failed save leaves the
//! state untouched and emits nothing.
//!
//! Ids that do not resolve (unknown date, period or todo) are not errors:
//! the call is a no-op and reports `false`/`None`.

use chrono::{NaiveDate, Utc};
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{Persistence, ScheduleState};
use crate::error::{CoreError, Result, ValidationError};
use crate::events::{Event, EventBus};
use crate::schedule::{DaySchedule, GroupId, Period, PeriodId, PeriodPatch, Todo, TodoId};

pub struct ScheduleStore<P: Persistence> {
    state: ScheduleState,
    persistence: P,
    bus: EventBus,
}

impl<P: Persistence> ScheduleStore<P> {
    /// Load the state once, seeding and saving an empty one if absent.
    ///
    /// A stored blob that cannot be decoded is replaced by the empty state.
    pub fn open(mut persistence: P, bus: EventBus) -> Result<Self> {
        let state = match persistence.load() {
            Ok(Some(state)) => state,
            Ok(None) => {
                let state = ScheduleState::default();
                persistence.save(&state)?;
                state
            }
            Err(CoreError::Json(e)) => {
                tracing::warn!(error = %e, "stored schedule is unreadable, starting empty");
                let state = ScheduleState::default();
                persistence.save(&state)?;
                state
            }
            Err(e) => return Err(e),
        };
        Ok(Self {
            state,
            persistence,
            bus,
        })
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn state(&self) -> &ScheduleState {
        &self.state
    }

    pub fn persistence(&self) -> &P {
        &self.persistence
    }

    pub fn persistence_mut(&mut self) -> &mut P {
        &mut self.persistence
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    /// Dates that have an entry, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.state.schedule.keys().copied().collect()
    }

    pub fn day(&self, date: NaiveDate) -> Option<&DaySchedule> {
        self.state.schedule.get(&date)
    }

    /// Periods of `date` in creation order; empty if the date is absent.
    pub fn get_periods(&self, date: NaiveDate) -> &[Period] {
        self.day(date).map(|d| d.periods.as_slice()).unwrap_or(&[])
    }

    pub fn period(&self, date: NaiveDate, period_id: PeriodId) -> Option<&Period> {
        self.day(date)?.period(period_id)
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn add_period(&mut self, date: NaiveDate, period: Period) -> Result<()> {
        period.validate()?;
        if self.period(date, period.id()).is_some() {
            return Err(ValidationError::DuplicateId { id: period.id() }.into());
        }
        debug!(%date, period_id = %period.id(), kind = %period.period_type(), "adding period");
        self.mutate(|state| {
            day_entry(state, date).periods.push(period);
            Some(())
        })?;
        Ok(())
    }

    /// Append a study period and a break period sharing a new group id.
    pub fn add_session(
        &mut self,
        date: NaiveDate,
        study_minutes: u32,
        break_minutes: u32,
    ) -> Result<GroupId> {
        let group_id = Uuid::new_v4();
        let study = Period::study(study_minutes).in_group(group_id);
        let rest = Period::rest(break_minutes).in_group(group_id);
        study.validate()?;
        rest.validate()?;
        debug!(%date, %group_id, study_minutes, break_minutes, "adding session");
        self.mutate(|state| {
            day_entry(state, date).periods.extend([study, rest]);
            Some(())
        })?;
        Ok(group_id)
    }

    /// Merge `patch` into the period. Returns whether anything changed.
    pub fn update_period(
        &mut self,
        date: NaiveDate,
        period_id: PeriodId,
        patch: PeriodPatch,
    ) -> Result<bool> {
        patch.validate()?;
        let changed = self.mutate(|state| {
            let period = state.schedule.get_mut(&date)?.period_mut(period_id)?;
            patch.apply(period).then_some(())
        })?;
        Ok(changed.is_some())
    }

    pub fn delete_period(&mut self, date: NaiveDate, period_id: PeriodId) -> Result<bool> {
        let removed = self.mutate(|state| {
            let day = state.schedule.get_mut(&date)?;
            let before = day.periods.len();
            day.periods.retain(|p| p.id() != period_id);
            (day.periods.len() != before).then_some(())
        })?;
        Ok(removed.is_some())
    }

    /// Remove every period of the group in one write.
    pub fn delete_group(&mut self, date: NaiveDate, group_id: GroupId) -> Result<bool> {
        let removed = self.mutate(|state| {
            let day = state.schedule.get_mut(&date)?;
            let before = day.periods.len();
            day.periods.retain(|p| p.group_id() != group_id);
            (day.periods.len() != before).then_some(())
        })?;
        if removed.is_some() {
            debug!(%date, %group_id, "group deleted");
        }
        Ok(removed.is_some())
    }

    /// Append a todo to a study period. Returns the new todo's id, or `None`
    /// when the date or study period does not exist.
    pub fn add_todo(
        &mut self,
        date: NaiveDate,
        period_id: PeriodId,
        text: &str,
    ) -> Result<Option<TodoId>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText {
                field: "text".into(),
            }
            .into());
        }
        let todo = Todo::new(text);
        let todo_id = todo.id;
        let added = self.mutate(|state| {
            let period = state.schedule.get_mut(&date)?.period_mut(period_id)?;
            if !period.is_study() {
                return None;
            }
            period.todos.push(todo);
            Some(())
        })?;
        Ok(added.map(|_| todo_id))
    }

    pub fn toggle_todo(
        &mut self,
        date: NaiveDate,
        period_id: PeriodId,
        todo_id: TodoId,
    ) -> Result<bool> {
        let toggled = self.mutate(|state| {
            let period = state.schedule.get_mut(&date)?.period_mut(period_id)?;
            let todo = period.todos.iter_mut().find(|t| t.id == todo_id)?;
            todo.completed = !todo.completed;
            Some(())
        })?;
        Ok(toggled.is_some())
    }

    // ── Internal ─────────────────────────────────────────────────────

    /// Run `f` on a copy of the state. `None` from `f` means no-op: nothing
    /// is saved or emitted.
    fn mutate<T>(&mut self, f: impl FnOnce(&mut ScheduleState) -> Option<T>) -> Result<Option<T>> {
        let mut next = self.state.clone();
        let Some(out) = f(&mut next) else {
            return Ok(None);
        };
        self.persistence.save(&next)?;
        self.state = next;
        self.bus.emit(Event::StateChanged {
            state: self.state.clone(),
            at: Utc::now(),
        });
        Ok(Some(out))
    }
}

fn day_entry(state: &mut ScheduleState, date: NaiveDate) -> &mut DaySchedule {
    state
        .schedule
        .entry(date)
        .or_insert_with(|| DaySchedule::new(date))
}
