//! Day schedules: dated, ordered lists of study and break periods.
//!
//! Sessions (groups of periods sharing a `group_id`) are never stored. They
//! are derived from the flat period list by the [`progression`] functions.

pub mod progression;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;

pub use progression::{
    aggregate_stats, current_period, display_order, group_by_creation_order,
    is_session_complete, DayStats, Session,
};

pub type PeriodId = Uuid;
pub type GroupId = Uuid;
pub type TodoId = Uuid;

/// Kind of a period. Study sorts before Break inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    Study,
    Break,
}

impl std::fmt::Display for PeriodType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodType::Study => f.write_str("study"),
            PeriodType::Break => f.write_str("break"),
        }
    }
}

/// A checklist item attached to a study period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
}

impl Todo {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            completed: false,
        }
    }
}

/// A single timed interval.
///
/// `id` and `period_type` are fixed at creation. Everything else can be
/// changed through [`PeriodPatch`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    id: PeriodId,
    /// Absent for ungrouped periods, which form a session of their own.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    group_id: Option<GroupId>,
    #[serde(rename = "type")]
    period_type: PeriodType,
    pub duration_minutes: u32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub todos: Vec<Todo>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub label: String,
}

impl Period {
    pub fn new(period_type: PeriodType, duration_minutes: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            group_id: None,
            period_type,
            duration_minutes,
            completed: false,
            todos: Vec::new(),
            label: String::new(),
        }
    }

    pub fn study(duration_minutes: u32) -> Self {
        Self::new(PeriodType::Study, duration_minutes)
    }

    pub fn rest(duration_minutes: u32) -> Self {
        Self::new(PeriodType::Break, duration_minutes)
    }

    pub fn in_group(mut self, group_id: GroupId) -> Self {
        self.group_id = Some(group_id);
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn id(&self) -> PeriodId {
        self.id
    }

    /// The session this period belongs to; its own id when ungrouped.
    pub fn group_id(&self) -> GroupId {
        self.group_id.unwrap_or(self.id)
    }

    pub fn period_type(&self) -> PeriodType {
        self.period_type
    }

    pub fn is_study(&self) -> bool {
        self.period_type == PeriodType::Study
    }

    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration_minutes) * 60
    }

    pub fn todo(&self, todo_id: TodoId) -> Option<&Todo> {
        self.todos.iter().find(|t| t.id == todo_id)
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_minutes == 0 {
            return Err(ValidationError::NonPositiveDuration {
                field: "duration_minutes".into(),
            });
        }
        Ok(())
    }
}

/// Partial update merged into a period by `ScheduleStore::update_period`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub todos: Option<Vec<Todo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl PeriodPatch {
    pub fn completed(completed: bool) -> Self {
        Self {
            completed: Some(completed),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        if self.duration_minutes == Some(0) {
            return Err(ValidationError::NonPositiveDuration {
                field: "duration_minutes".into(),
            });
        }
        if let Some(todos) = &self.todos {
            if todos.iter().any(|t| t.text.trim().is_empty()) {
                return Err(ValidationError::EmptyText {
                    field: "todos.text".into(),
                });
            }
        }
        Ok(())
    }

    /// Merge into `period`. Returns whether anything changed.
    pub(crate) fn apply(&self, period: &mut Period) -> bool {
        let before = period.clone();
        if let Some(completed) = self.completed {
            period.completed = completed;
        }
        if let Some(minutes) = self.duration_minutes {
            period.duration_minutes = minutes;
        }
        if let Some(todos) = &self.todos {
            period.todos = todos.clone();
        }
        if let Some(label) = &self.label {
            period.label = label.clone();
        }
        *period != before
    }
}

/// All periods of one calendar date, in creation order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaySchedule {
    pub date: NaiveDate,
    #[serde(default)]
    pub periods: Vec<Period>,
}

impl DaySchedule {
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            periods: Vec::new(),
        }
    }

    pub fn period(&self, id: PeriodId) -> Option<&Period> {
        self.periods.iter().find(|p| p.id == id)
    }

    pub fn period_mut(&mut self, id: PeriodId) -> Option<&mut Period> {
        self.periods.iter_mut().find(|p| p.id == id)
    }
}

/// Parse a `YYYY-MM-DD` date key.
pub fn parse_date(value: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| ValidationError::InvalidDate {
        value: value.to_string(),
    })
}
