//! Integration tests for the session controller.
//!
//! Drives full days through the controller with a manual clock and checks
//! what the store and the event stream look like afterwards.

use chrono::NaiveDate;
use pomotodo_core::schedule::{aggregate_stats, current_period};
use pomotodo_core::{
    drain_pending, ClockStatus, ControllerPhase, Database, Event, EventBus, MemoryPersistence, Period,
    PeriodId, PeriodPatch, ScheduleStore, SessionController,
};
use uuid::Uuid;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 10, 14).unwrap()
}

fn memory_controller() -> SessionController<MemoryPersistence> {
    let store = ScheduleStore::open(MemoryPersistence::new(), EventBus::new()).unwrap();
    SessionController::new(store, day())
}

fn add(ctl: &mut SessionController<MemoryPersistence>, period: Period) -> PeriodId {
    let id = period.id();
    ctl.store_mut().add_period(day(), period).unwrap();
    id
}

fn ticks(events: &[Event]) -> Vec<u64> {
    events
        .iter()
        .filter_map(|e| match e {
            Event::Tick { remaining_secs, .. } => Some(*remaining_secs),
            _ => None,
        })
        .collect()
}

#[test]
fn test_auto_advance_within_and_across_sessions() {
    let mut ctl = memory_controller();
    let group_a = Uuid::new_v4();
    let study_a = add(&mut ctl, Period::study(5).in_group(group_a));
    let break_a = add(&mut ctl, Period::rest(5).in_group(group_a));
    let study_b = add(&mut ctl, Period::study(10));

    ctl.toggle().unwrap();
    assert_eq!(ctl.state().countdown.active_period_id, Some(study_a));

    // StudyA runs out: marked complete, BreakA starts at once.
    ctl.advance(5 * 60).unwrap();
    let store = ctl.store();
    assert!(store.period(day(), study_a).unwrap().completed);
    assert!(!store.period(day(), break_a).unwrap().completed);
    assert!(!store.period(day(), study_b).unwrap().completed);
    assert_eq!(ctl.phase(), ControllerPhase::Running);
    assert_eq!(ctl.state().countdown.active_period_id, Some(break_a));

    // StudyB stays untouched until BreakA finishes too.
    ctl.advance(5 * 60 - 1).unwrap();
    assert_eq!(ctl.state().countdown.active_period_id, Some(break_a));
    assert!(!ctl.store().period(day(), study_b).unwrap().completed);

    ctl.advance(1).unwrap();
    assert!(ctl.store().period(day(), break_a).unwrap().completed);
    assert_eq!(ctl.state().countdown.active_period_id, Some(study_b));

    ctl.advance(10 * 60).unwrap();
    assert_eq!(ctl.phase(), ControllerPhase::Idle);
    assert!(current_period(ctl.store().get_periods(day())).is_none());

    let stats = aggregate_stats(ctl.store().get_periods(day()));
    assert_eq!(stats.completed_study_minutes, 15);
}

#[test]
fn test_terminal_day_does_not_start() {
    let mut ctl = memory_controller();
    let id = add(&mut ctl, Period::study(25));
    ctl.store_mut()
        .update_period(day(), id, PeriodPatch::completed(true))
        .unwrap();

    assert!(current_period(ctl.store().get_periods(day())).is_none());

    let mut rx = ctl.subscribe();
    ctl.toggle().unwrap();
    let events: Vec<Event> = drain_pending(&mut rx);
    assert_eq!(ctl.phase(), ControllerPhase::Idle);
    assert!(matches!(events.as_slice(), [Event::AllPeriodsComplete { .. }]));
    assert_eq!(ctl.state().countdown.active_period_id, None);
}

#[test]
fn test_countdown_exactness_through_controller() {
    let mut ctl = memory_controller();
    let id = add(&mut ctl, Period::study(3));
    let mut rx = ctl.subscribe();

    ctl.toggle().unwrap();
    ctl.advance(3 * 60).unwrap();
    ctl.advance(10).unwrap();

    let events: Vec<Event> = drain_pending(&mut rx);
    let expected: Vec<u64> = (0..3 * 60).rev().collect();
    assert_eq!(ticks(&events), expected);

    let completed: Vec<usize> = events
        .iter()
        .enumerate()
        .filter_map(|(i, e)| match e {
            Event::PeriodCompleted { period_id, .. } if *period_id == id => Some(i),
            _ => None,
        })
        .collect();
    assert_eq!(completed.len(), 1);
    let last_tick = events
        .iter()
        .rposition(|e| matches!(e, Event::Tick { .. }))
        .unwrap();
    assert!(last_tick < completed[0]);
}

#[test]
fn test_event_order_on_advance() {
    let mut ctl = memory_controller();
    let group = Uuid::new_v4();
    add(&mut ctl, Period::study(1).in_group(group));
    let rest = add(&mut ctl, Period::rest(1).in_group(group));
    ctl.toggle().unwrap();
    ctl.advance(59).unwrap();

    let mut rx = ctl.subscribe();
    ctl.advance(1).unwrap();
    let kinds: Vec<&str> = drain_pending(&mut rx)
        .into_iter()
        .map(|e| match e {
            Event::StateChanged { .. } => "state_changed",
            Event::PeriodCompleted { .. } => "period_completed",
            Event::PeriodAdvanced { period, .. } => {
                assert_eq!(period.id(), rest);
                "period_advanced"
            }
            Event::StatusChanged {
                status: ClockStatus::Running,
                ..
            } => "running",
            Event::Tick { .. } => "tick",
            _ => "other",
        })
        .collect();
    assert_eq!(
        kinds,
        vec!["state_changed", "period_completed", "period_advanced", "running", "tick"]
    );
}

#[test]
fn test_running_period_earns_no_credit() {
    let mut ctl = memory_controller();
    add(&mut ctl, Period::study(25));
    ctl.toggle().unwrap();
    ctl.advance(24 * 60).unwrap();
    let stats = aggregate_stats(ctl.store().get_periods(day()));
    assert_eq!(stats.completed_study_minutes, 0);
}

#[test]
fn test_progress_survives_reopen_with_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("pomotodo.db");

    let study = {
        let db = Database::open_at(&path).unwrap();
        let store = ScheduleStore::open(db, EventBus::new()).unwrap();
        let mut ctl = SessionController::new(store, day());
        let group = ctl.store_mut().add_session(day(), 1, 1).unwrap();
        let study = ctl.store().get_periods(day())[0].id();
        let todo = ctl
            .store_mut()
            .add_todo(day(), study, "flashcards")
            .unwrap()
            .unwrap();
        ctl.store_mut().toggle_todo(day(), study, todo).unwrap();
        ctl.toggle().unwrap();
        ctl.advance(60).unwrap();
        assert_eq!(ctl.store().get_periods(day())[0].group_id(), group);
        study
    };

    let db = Database::open_at(&path).unwrap();
    let store = ScheduleStore::open(db, EventBus::new()).unwrap();
    let period = store.period(day(), study).unwrap();
    assert!(period.completed);
    assert_eq!(period.todos.len(), 1);
    assert!(period.todos[0].completed);

    let stats = aggregate_stats(store.get_periods(day()));
    assert_eq!(stats.completed_study_minutes, 1);
    assert_eq!(stats.todo_total, 1);
    assert_eq!(stats.todo_completed, 1);
}

#[test]
fn test_independent_controllers_do_not_share_state() {
    let mut a = memory_controller();
    let mut b = memory_controller();
    add(&mut a, Period::study(1));
    add(&mut b, Period::study(2));

    a.toggle().unwrap();
    a.advance(30).unwrap();
    assert_eq!(b.phase(), ControllerPhase::Idle);

    b.toggle().unwrap();
    assert_eq!(a.state().countdown.remaining_secs, 29);
    assert_eq!(b.state().countdown.remaining_secs, 119);
}
