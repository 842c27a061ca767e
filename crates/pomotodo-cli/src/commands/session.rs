use chrono::NaiveDate;
use clap::Subcommand;
use pomotodo_core::schedule::{display_order, group_by_creation_order};
use pomotodo_core::{Config, GroupId};

use super::{open_store, CmdResult};

#[derive(Subcommand)]
pub enum SessionAction {
    /// Add a study period and its break
    Add {
        /// Study minutes (default from config)
        #[arg(long)]
        study: Option<u32>,
        /// Break minutes (default from config)
        #[arg(long)]
        rest: Option<u32>,
    },
    /// Delete a session with all its periods
    Delete {
        /// Session (group) ID
        group_id: GroupId,
    },
    /// List sessions, unfinished first
    List {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: SessionAction, date: NaiveDate) -> CmdResult {
    let mut store = open_store()?;

    match action {
        SessionAction::Add { study, rest } => {
            let config = Config::load_or_default();
            let study = study.unwrap_or(config.session.default_study_minutes);
            let rest = rest.unwrap_or(config.session.default_break_minutes);
            let group_id = store.add_session(date, study, rest)?;
            println!("{group_id}");
        }
        SessionAction::Delete { group_id } => {
            if store.delete_group(date, group_id)? {
                println!("session deleted");
            } else {
                eprintln!("no session {group_id} on {date}");
            }
        }
        SessionAction::List { json } => {
            let sessions = group_by_creation_order(store.get_periods(date));
            let shown = display_order(&sessions);
            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
                return Ok(());
            }
            if shown.is_empty() {
                println!("no sessions on {date}");
            }
            for session in &shown {
                let mark = if session.is_complete() { "x" } else { " " };
                println!("#{} [{mark}] {}", session.static_index, session.group_id);
                for period in session.run_order() {
                    let done = if period.completed { "x" } else { " " };
                    let label = if period.label.is_empty() {
                        String::new()
                    } else {
                        format!("  {}", period.label)
                    };
                    println!(
                        "    [{done}] {:<5} {:>3}m  {}{label}",
                        period.period_type().to_string(),
                        period.duration_minutes,
                        period.id()
                    );
                    for todo in &period.todos {
                        let ticked = if todo.completed { "x" } else { " " };
                        println!("        [{ticked}] {}  {}", todo.text, todo.id);
                    }
                }
            }
        }
    }
    Ok(())
}
