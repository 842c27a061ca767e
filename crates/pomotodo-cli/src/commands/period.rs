use chrono::NaiveDate;
use clap::{Subcommand, ValueEnum};
use pomotodo_core::{GroupId, Period, PeriodId, PeriodPatch, PeriodType};

use super::{open_store, CmdResult};

#[derive(Clone, Copy, ValueEnum)]
pub enum KindArg {
    Study,
    Break,
}

impl From<KindArg> for PeriodType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Study => PeriodType::Study,
            KindArg::Break => PeriodType::Break,
        }
    }
}

#[derive(Subcommand)]
pub enum PeriodAction {
    /// Append a single period
    Add {
        #[arg(long, value_enum)]
        kind: KindArg,
        /// Length in minutes
        #[arg(long)]
        minutes: u32,
        #[arg(long)]
        label: Option<String>,
        /// Join an existing session
        #[arg(long)]
        group: Option<GroupId>,
    },
    /// Delete one period
    Delete { id: PeriodId },
    /// Mark a period as completed
    Complete { id: PeriodId },
    /// Mark a period as not completed
    Reopen { id: PeriodId },
}

pub fn run(action: PeriodAction, date: NaiveDate) -> CmdResult {
    let mut store = open_store()?;

    match action {
        PeriodAction::Add {
            kind,
            minutes,
            label,
            group,
        } => {
            let mut period = Period::new(kind.into(), minutes);
            if let Some(group) = group {
                period = period.in_group(group);
            }
            if let Some(label) = label {
                period = period.with_label(label);
            }
            let id = period.id();
            store.add_period(date, period)?;
            println!("{id}");
        }
        PeriodAction::Delete { id } => {
            report(store.delete_period(date, id)?, "period deleted", id, date)
        }
        PeriodAction::Complete { id } => report(
            store.update_period(date, id, PeriodPatch::completed(true))?,
            "period completed",
            id,
            date,
        ),
        PeriodAction::Reopen { id } => report(
            store.update_period(date, id, PeriodPatch::completed(false))?,
            "period reopened",
            id,
            date,
        ),
    }
    Ok(())
}

fn report(changed: bool, message: &str, id: PeriodId, date: NaiveDate) {
    if changed {
        println!("{message}");
    } else {
        eprintln!("nothing to do for period {id} on {date}");
    }
}
