use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pomotodo_core::schedule::parse_date;
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "pomotodo-cli", version, about = "Pomotodo CLI")]
struct Cli {
    /// Day to work on (YYYY-MM-DD, default today)
    #[arg(long, global = true, value_parser = parse_date)]
    date: Option<NaiveDate>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Study/break session management
    Session {
        #[command(subcommand)]
        action: commands::session::SessionAction,
    },
    /// Single period management
    Period {
        #[command(subcommand)]
        action: commands::period::PeriodAction,
    },
    /// Checklist items on study periods
    Todo {
        #[command(subcommand)]
        action: commands::todo::TodoAction,
    },
    /// Progress for the day
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env("POMOTODO_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let date = cli
        .date
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let result = match cli.command {
        Commands::Session { action } => commands::session::run(action, date),
        Commands::Period { action } => commands::period::run(action, date),
        Commands::Todo { action } => commands::todo::run(action, date),
        Commands::Stats { json } => commands::stats::run(json, date),
        Commands::Timer { action } => commands::timer::run(action, date),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
