//! Progression resolver.
//!
//! Pure functions over a date's period list. Grouping and ordering are
//! recomputed on every call, so a session's static index always reflects the
//! periods that are currently present.

use std::collections::HashMap;

use serde::Serialize;

use super::{GroupId, Period};

/// Periods sharing a `group_id`, in list order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session<'a> {
    pub group_id: GroupId,
    /// 1-based position of the group's first period among all groups.
    pub static_index: usize,
    pub periods: Vec<&'a Period>,
}

impl<'a> Session<'a> {
    pub fn is_complete(&self) -> bool {
        self.periods.iter().all(|p| p.completed)
    }

    /// Members with study periods first, list order kept otherwise.
    pub fn run_order(&self) -> Vec<&'a Period> {
        let mut members = self.periods.clone();
        members.sort_by_key(|p| p.period_type());
        members
    }

    pub fn duration_minutes(&self) -> u64 {
        self.periods.iter().map(|p| u64::from(p.duration_minutes)).sum()
    }
}

/// Progress figures for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DayStats {
    /// Minutes of study periods that ran to completion.
    pub completed_study_minutes: u64,
    pub todo_total: usize,
    pub todo_completed: usize,
}

pub fn group_by_creation_order(periods: &[Period]) -> Vec<Session<'_>> {
    let mut sessions: Vec<Session<'_>> = Vec::new();
    let mut index_of: HashMap<GroupId, usize> = HashMap::new();

    for period in periods {
        let group_id = period.group_id();
        match index_of.get(&group_id) {
            Some(&i) => sessions[i].periods.push(period),
            None => {
                index_of.insert(group_id, sessions.len());
                sessions.push(Session {
                    group_id,
                    static_index: sessions.len() + 1,
                    periods: vec![period],
                });
            }
        }
    }
    sessions
}

pub fn is_session_complete(session: &Session<'_>) -> bool {
    session.is_complete()
}

/// Incomplete sessions, then complete ones, static order kept in each bucket.
pub fn display_order<'a>(sessions: &[Session<'a>]) -> Vec<Session<'a>> {
    let (mut pending, done): (Vec<_>, Vec<_>) =
        sessions.iter().cloned().partition(|s| !s.is_complete());
    pending.extend(done);
    pending
}

/// The next period to run, or `None` when the day is fully complete.
pub fn current_period(periods: &[Period]) -> Option<&Period> {
    group_by_creation_order(periods)
        .iter()
        .flat_map(|s| s.run_order())
        .find(|p| !p.completed)
}

pub fn aggregate_stats(periods: &[Period]) -> DayStats {
    periods.iter().fold(DayStats::default(), |mut stats, p| {
        if p.is_study() && p.completed {
            stats.completed_study_minutes += u64::from(p.duration_minutes);
        }
        stats.todo_total += p.todos.len();
        stats.todo_completed += p.todos.iter().filter(|t| t.completed).count();
        stats
    })
}
