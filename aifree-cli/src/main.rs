//! aifree: focus sessions without AI assistants.
//!
//! # Usage
//!
//! ```text
//! aifree start
//! aifree stop
//! aifree status [--json]
//! aifree blocklist list|add <site>|remove <site>|reset
//! aifree logs list|export [--output <path>]|clear --yes
//! aifree rules [--json]
//! aifree check <url>
//! aifree daemon start|stop|status
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    blocklist::BlocklistCommand, check::CheckArgs, daemon::DaemonCommand, logs::LogsCommand,
    rules::RulesArgs, status::StatusArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "aifree",
    version,
    about = "Block AI coding assistants for the length of a focus session",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start a focus session and block the configured sites.
    Start,

    /// Stop the running session and record it in the history.
    Stop,

    /// Show blocking state, session timer and session counts.
    Status(StatusArgs),

    /// Inspect or edit the sites blocked during a session.
    Blocklist {
        #[command(subcommand)]
        command: BlocklistCommand,
    },

    /// List, export or clear finished sessions.
    Logs {
        #[command(subcommand)]
        command: LogsCommand,
    },

    /// Show the dynamic blocking rules currently in force.
    Rules(RulesArgs),

    /// Report whether a URL would be blocked right now.
    Check(CheckArgs),

    /// Run or control the background daemon.
    Daemon {
        #[command(subcommand)]
        command: DaemonCommand,
    },
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Start => commands::session::start(),
        Commands::Stop => commands::session::stop(),
        Commands::Status(args) => args.run(),
        Commands::Blocklist { command } => commands::blocklist::run(command),
        Commands::Logs { command } => commands::logs::run(command),
        Commands::Rules(args) => args.run(),
        Commands::Check(args) => args.run(),
        Commands::Daemon { command } => commands::daemon::run(command),
    }
}
