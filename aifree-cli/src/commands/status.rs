//! `aifree status [--json]`

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use colored::Colorize;
use serde::Serialize;

use aifree_core::SessionLogEntry;
use aifree_daemon::{request_logs, request_status};

use super::{daemon_context, home_dir};

/// Show blocking state, the session timer and session counts.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusReport {
    is_blocking: bool,
    elapsed: u64,
    timer: String,
    total_sessions: usize,
    today_sessions: usize,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let status = request_status(&home).map_err(|e| daemon_context(e, "query status"))?;
        let logs = request_logs(&home).map_err(|e| daemon_context(e, "read session logs"))?;

        let report = StatusReport {
            is_blocking: status.is_blocking,
            elapsed: status.elapsed,
            timer: format_elapsed(status.elapsed),
            total_sessions: status.total_sessions,
            today_sessions: sessions_on(&logs, Local::now().date_naive()),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to render status JSON")?
            );
            return Ok(());
        }

        let state = if report.is_blocking {
            "AI Blocked".red().bold()
        } else {
            "AI Unblocked".green().bold()
        };
        println!("{state}");
        println!("  session:   {}", report.timer);
        println!("  today:     {}", report.today_sessions);
        println!("  total:     {}", report.total_sessions);
        Ok(())
    }
}

/// `HH:MM:SS`, hours not wrapped at 24.
pub(crate) fn format_elapsed(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;
    format!("{hours:02}:{minutes:02}:{secs:02}")
}

fn sessions_on(logs: &[SessionLogEntry], day: NaiveDate) -> usize {
    logs.iter().filter(|entry| entry.date == day).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveTime;

    fn entry(date: &str) -> SessionLogEntry {
        SessionLogEntry {
            date: date.parse().unwrap(),
            start: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            end: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            duration_minutes: 30,
        }
    }

    #[test]
    fn elapsed_renders_as_clock() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(90), "00:01:30");
        assert_eq!(format_elapsed(3_725), "01:02:05");
        assert_eq!(format_elapsed(90_000), "25:00:00");
    }

    #[test]
    fn today_counts_only_matching_dates() {
        let logs = vec![entry("2024-05-01"), entry("2024-05-02"), entry("2024-05-02")];
        let day: NaiveDate = "2024-05-02".parse().unwrap();
        assert_eq!(sessions_on(&logs, day), 2);
        assert_eq!(sessions_on(&[], day), 0);
    }
}
