//! `aifree logs list|export|clear`

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Subcommand;
use tabled::{settings::Style, Table, Tabled};

use aifree_core::SessionLogEntry;
use aifree_daemon::{request, request_logs, Request};

use super::{daemon_context, home_dir};

#[derive(Subcommand, Debug)]
pub enum LogsCommand {
    /// Show finished sessions, most recent first.
    List,
    /// Write the full session history as JSON.
    Export {
        /// Destination file. Defaults to ai-free-coding-logs-<date>.json in
        /// the current directory.
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
    /// Delete the session history. A running session is kept.
    Clear {
        /// Confirm deletion.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Tabled)]
struct LogRow {
    #[tabled(rename = "date")]
    date: String,
    #[tabled(rename = "time")]
    time: String,
    #[tabled(rename = "duration")]
    duration: String,
}

pub fn run(command: LogsCommand) -> Result<()> {
    if let LogsCommand::Clear { yes: false } = command {
        bail!("refusing to clear session history without --yes");
    }

    let home = home_dir()?;
    match command {
        LogsCommand::List => {
            let logs = request_logs(&home).map_err(|e| daemon_context(e, "read session logs"))?;
            if logs.is_empty() {
                println!("No sessions recorded yet");
                return Ok(());
            }
            let today = Local::now().date_naive();
            let rows: Vec<LogRow> = most_recent_first(logs)
                .iter()
                .map(|entry| LogRow {
                    date: describe_date(entry.date, today),
                    time: format!(
                        "{} - {}",
                        entry.start.format("%H:%M"),
                        entry.end.format("%H:%M")
                    ),
                    duration: format!("{} min", entry.duration_minutes),
                })
                .collect();
            let mut table = Table::new(rows);
            table.with(Style::rounded());
            println!("{table}");
        }
        LogsCommand::Export { output } => {
            let logs = request_logs(&home).map_err(|e| daemon_context(e, "read session logs"))?;
            let path = output.unwrap_or_else(|| default_export_name(Local::now().date_naive()));
            let json =
                serde_json::to_string_pretty(&logs).context("failed to render session logs")?;
            std::fs::write(&path, json)
                .with_context(|| format!("failed to write {}", path.display()))?;
            println!("✓ Exported {} sessions to {}", logs.len(), path.display());
        }
        LogsCommand::Clear { .. } => {
            request(&home, &Request::ClearLogs)
                .map_err(|e| daemon_context(e, "clear session logs"))?;
            println!("✓ Session history cleared");
        }
    }
    Ok(())
}

fn most_recent_first(mut logs: Vec<SessionLogEntry>) -> Vec<SessionLogEntry> {
    logs.sort_by(|a, b| (b.date, b.start).cmp(&(a.date, a.start)));
    logs
}

fn describe_date(date: NaiveDate, today: NaiveDate) -> String {
    if date == today {
        "Today".to_string()
    } else if today.pred_opt() == Some(date) {
        "Yesterday".to_string()
    } else {
        date.format("%a, %b %-d").to_string()
    }
}

fn default_export_name(day: NaiveDate) -> PathBuf {
    PathBuf::from(format!("ai-free-coding-logs-{}.json", day.format("%Y-%m-%d")))
}
