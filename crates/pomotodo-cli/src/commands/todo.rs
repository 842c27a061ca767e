use chrono::NaiveDate;
use clap::Subcommand;
use pomotodo_core::{PeriodId, TodoId};

use super::{open_store, CmdResult};

#[derive(Subcommand)]
pub enum TodoAction {
    /// Add a checklist item to a study period
    Add {
        period_id: PeriodId,
        text: String,
    },
    /// Tick or untick a checklist item
    Toggle {
        period_id: PeriodId,
        todo_id: TodoId,
    },
}

pub fn run(action: TodoAction, date: NaiveDate) -> CmdResult {
    let mut store = open_store()?;

    match action {
        TodoAction::Add { period_id, text } => match store.add_todo(date, period_id, &text)? {
            Some(todo_id) => println!("{todo_id}"),
            None => eprintln!("no study period {period_id} on {date}"),
        },
        TodoAction::Toggle { period_id, todo_id } => {
            if store.toggle_todo(date, period_id, todo_id)? {
                let done = store
                    .period(date, period_id)
                    .and_then(|p| p.todo(todo_id))
                    .is_some_and(|t| t.completed);
                println!("{}", if done { "done" } else { "open" });
            } else {
                eprintln!("no todo {todo_id} on period {period_id}");
            }
        }
    }
    Ok(())
}
