use std::io::Write;
use std::time::Duration;

use chrono::NaiveDate;
use clap::Subcommand;
use pomotodo_core::{
    drain_pending, format_clock, Config, ControllerPhase, Database, Event, SessionController,
    SessionControllerState,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, warn};
use uuid::Uuid;

use super::{open_store, CmdResult};

/// kv key holding a paused countdown between runs.
const COUNTDOWN_KEY: &str = "countdown";

#[derive(Subcommand)]
pub enum TimerAction {
    /// Print current timer state as JSON
    Status,
    /// Run the countdown in the foreground.
    ///
    /// Reads commands from stdin: `p` pause/resume, `r` reset,
    /// `s <period-id>` start a period, `q` quit and keep progress.
    Run,
    /// Forget a paused countdown
    Reset,
}

pub fn run(action: TimerAction, date: NaiveDate) -> CmdResult {
    let config = Config::load_or_default();
    let mut ctl =
        SessionController::new(open_store()?, date).with_auto_advance(config.auto_advance);

    match action {
        TimerAction::Status => {
            restore_saved(&mut ctl);
            println!("{}", serde_json::to_string_pretty(&ctl.snapshot())?);
        }
        TimerAction::Run => {
            let runtime = tokio::runtime::Runtime::new()?;
            let result = runtime.block_on(drive(&mut ctl, &config));
            // stdin reads may still be parked on a blocking thread.
            runtime.shutdown_background();
            result?;
        }
        TimerAction::Reset => {
            ctl.store().persistence().kv_delete(COUNTDOWN_KEY)?;
            println!("timer reset");
        }
    }
    Ok(())
}

/// Restore the countdown saved by an earlier `timer run`, if it belongs
/// to this date and its period is still unfinished.
fn restore_saved(ctl: &mut SessionController<Database>) -> bool {
    let saved = match ctl.store().persistence().kv_get(COUNTDOWN_KEY) {
        Ok(Some(json)) => json,
        Ok(None) => return false,
        Err(e) => {
            warn!(error = %e, "could not read saved countdown");
            return false;
        }
    };
    match serde_json::from_str::<SessionControllerState>(&saved) {
        Ok(state) if state.date == ctl.date() => ctl.restore(state.countdown),
        Ok(_) => false,
        Err(e) => {
            warn!(error = %e, "ignoring unreadable saved countdown");
            false
        }
    }
}

async fn drive(ctl: &mut SessionController<Database>, config: &Config) -> CmdResult {
    let mut events = ctl.subscribe();
    if restore_saved(ctl) {
        debug!("resuming saved countdown");
    }
    ctl.store().persistence().kv_delete(COUNTDOWN_KEY)?;
    ctl.toggle()?;
    if !print_events(&mut events, config.display.show_seconds) {
        return Ok(());
    }

    let mut ticker = interval(Duration::from_secs(1));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    ticker.tick().await;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = ticker.tick() => ctl.tick()?,
            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !handle_command(ctl, line.trim())? {
                        break;
                    }
                }
                None => stdin_open = false,
            },
        }
        if !print_events(&mut events, config.display.show_seconds) {
            return Ok(());
        }
        // Nothing left to wait for once input is gone and the clock is idle.
        if !stdin_open && ctl.phase() == ControllerPhase::Idle {
            break;
        }
    }

    save_progress(ctl)
}

/// Apply one stdin command. Returns `false` on quit.
fn handle_command(
    ctl: &mut SessionController<Database>,
    line: &str,
) -> Result<bool, Box<dyn std::error::Error>> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("p") => ctl.toggle()?,
        Some("r") => ctl.reset()?,
        Some("s") => match parts.next().map(Uuid::parse_str) {
            Some(Ok(id)) => {
                if !ctl.start_explicit(id)? {
                    eprintln!("\nno period {id} on {}", ctl.date());
                }
            }
            _ => eprintln!("\nusage: s <period-id>"),
        },
        Some("q") => return Ok(false),
        Some(other) => eprintln!("\nunknown command: {other}"),
        None => {}
    }
    Ok(true)
}

/// Keep an unfinished countdown for the next run.
fn save_progress(ctl: &mut SessionController<Database>) -> CmdResult {
    let state = ctl.state();
    if state.phase == ControllerPhase::Idle || state.countdown.remaining_secs == 0 {
        ctl.store().persistence().kv_delete(COUNTDOWN_KEY)?;
        return Ok(());
    }
    if state.phase == ControllerPhase::Running {
        ctl.toggle()?;
    }
    let json = serde_json::to_string(&ctl.state())?;
    ctl.store().persistence().kv_set(COUNTDOWN_KEY, &json)?;
    println!("\nsaved {} for later", format_clock(state.countdown.remaining_secs));
    Ok(())
}

/// Print pending events. Returns `false` once the day is finished.
fn print_events(events: &mut broadcast::Receiver<Event>, show_seconds: bool) -> bool {
    let mut stdout = std::io::stdout();
    for event in drain_pending(events) {
        match event {
            Event::Tick { remaining_secs, .. } => {
                if show_seconds {
                    print!("\r{}   ", format_clock(remaining_secs));
                } else {
                    print!("\r{} min left   ", remaining_secs.div_ceil(60));
                }
            }
            Event::PeriodCompleted { period_id, .. } => println!("\nperiod {period_id} complete"),
            Event::PeriodAdvanced { period, .. } => println!(
                "next: {} {} min  {}",
                period.period_type(),
                period.duration_minutes,
                period.id()
            ),
            Event::AllPeriodsComplete { date, .. } => {
                println!("\nall periods complete for {date}");
                return false;
            }
            Event::StateSnapshot { phase, .. } => println!("\n{phase:?}"),
            Event::StatusChanged { .. } | Event::StateChanged { .. } => {}
        }
        let _ = stdout.flush();
    }
    true
}
