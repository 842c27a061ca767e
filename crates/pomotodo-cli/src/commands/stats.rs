use chrono::NaiveDate;
use pomotodo_core::schedule::{aggregate_stats, current_period, group_by_creation_order};

use super::{open_store, CmdResult};

pub fn run(json: bool, date: NaiveDate) -> CmdResult {
    let store = open_store()?;
    let periods = store.get_periods(date);
    let stats = aggregate_stats(periods);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    let sessions = group_by_creation_order(periods);
    let done = sessions.iter().filter(|s| s.is_complete()).count();
    println!("date:            {date}");
    println!("sessions:        {done}/{}", sessions.len());
    println!("studied:         {} min", stats.completed_study_minutes);
    println!("todos:           {}/{}", stats.todo_completed, stats.todo_total);
    if !periods.is_empty() && current_period(periods).is_none() {
        println!("all periods complete");
    }
    Ok(())
}
