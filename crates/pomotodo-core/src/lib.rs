//! # Pomotodo Core Library
//!
//! This library provides the core logic for the Pomotodo study/break planner.
//! A day is a list of study and break periods; periods created together form
//! a session. A countdown runs through the periods in order and moves on to
//! the next one by itself when a period finishes.
//!
//! ## Architecture
//!
//! - **Timer**: a single countdown driven by the caller's once-per-second
//!   `tick()`, reporting over a channel
//! - **Schedule**: the period/todo data model and the pure progression
//!   functions (grouping, display order, current period, stats)
//! - **Storage**: the schedule store, SQLite persistence and TOML config
//! - **Controller**: ties the countdown to the store and publishes events
//!
//! ## Key Components
//!
//! - [`SessionController`]: toggle/reset/start commands and auto-advance
//! - [`ScheduleStore`]: CRUD with save-and-notify on every write
//! - [`Countdown`]: the countdown state machine
//! - [`EventBus`]: fan-out of [`Event`]s to subscribers

pub mod controller;
pub mod error;
pub mod events;
pub mod schedule;
pub mod storage;
pub mod timer;

pub use controller::{ControllerPhase, SessionController, SessionControllerState};
pub use error::{ConfigError, CoreError, DatabaseError, ValidationError};
pub use events::{drain_pending, Event, EventBus};
pub use schedule::{
    DaySchedule, DayStats, GroupId, Period, PeriodId, PeriodPatch, PeriodType, Session, Todo,
    TodoId,
};
pub use storage::{
    Config, Database, MemoryPersistence, Persistence, ScheduleState, ScheduleStore,
};
pub use timer::{format_clock, ClockEvent, ClockStatus, Countdown, CountdownState};
