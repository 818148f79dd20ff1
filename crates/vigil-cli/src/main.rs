mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigAction, ledger::LedgerAction};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(about = "Focus-session reports and usage ledger", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show the focus summary for a day
    Summary {
        /// Date to summarize (YYYY-MM-DD format, defaults to today)
        #[arg(short, long)]
        date: Option<String>,
        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// List finished sessions
    History {
        /// How many days back to include
        #[arg(default_value = "7")]
        days: u32,
    },
    /// Show a session's event timeline
    Events {
        /// Session id
        session_id: String,
        /// Output format: table, json
        #[arg(short, long, default_value = "table")]
        format: String,
    },
    /// Usage ledger commands
    Ledger {
        #[command(subcommand)]
        action: Option<LedgerAction>,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Summary { date, format } => commands::report::summary(date.as_deref(), &format),
        Commands::History { days } => commands::report::history(days),
        Commands::Events { session_id, format } => {
            commands::report::events(&session_id, &format)
        }
        Commands::Ledger { action } => {
            commands::ledger::handle(action.unwrap_or(LedgerAction::Show))
        }
        Commands::Config { action } => commands::config::handle(action),
    }
}
