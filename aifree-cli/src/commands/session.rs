//! `aifree start` and `aifree stop`.

use anyhow::Result;
use colored::Colorize;

use aifree_daemon::{request, request_logs, request_status, Request};

use super::status::format_elapsed;
use super::{daemon_context, home_dir};

pub fn start() -> Result<()> {
    let home = home_dir()?;
    let before = request_status(&home).map_err(|e| daemon_context(e, "query session"))?;
    if before.is_blocking {
        println!(
            "session already running ({})",
            format_elapsed(before.elapsed)
        );
        return Ok(());
    }

    request(&home, &Request::StartSession).map_err(|e| daemon_context(e, "start session"))?;
    println!("{} session started, AI sites blocked", "●".red().bold());
    Ok(())
}

pub fn stop() -> Result<()> {
    let home = home_dir()?;
    let before = request_status(&home).map_err(|e| daemon_context(e, "query session"))?;
    if !before.is_blocking {
        println!("no session is running");
        return Ok(());
    }

    request(&home, &Request::StopSession).map_err(|e| daemon_context(e, "stop session"))?;
    let logs = request_logs(&home).map_err(|e| daemon_context(e, "read session logs"))?;
    match logs.last() {
        Some(entry) => println!(
            "{} session stopped: {} - {} ({} min)",
            "●".green().bold(),
            entry.start.format("%H:%M"),
            entry.end.format("%H:%M"),
            entry.duration_minutes
        ),
        None => println!("{} session stopped", "●".green().bold()),
    }
    Ok(())
}
