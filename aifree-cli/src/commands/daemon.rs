//! `aifree daemon`: foreground runtime and socket control.

use anyhow::{Context, Result};
use clap::Subcommand;

use aifree_daemon::paths::socket_path;
use aifree_daemon::{request_shutdown, request_status, start_blocking, DaemonError};

#[derive(Subcommand, Debug)]
pub enum DaemonCommand {
    /// Run the daemon in the foreground (session store + socket server).
    Start,
    /// Ask a running daemon to shut down.
    Stop,
    /// Query daemon status over the Unix socket.
    Status,
}

pub fn run(command: DaemonCommand) -> Result<()> {
    let home = super::home_dir()?;

    match command {
        DaemonCommand::Start => {
            start_blocking(&home).context("daemon exited with error")?;
        }
        DaemonCommand::Stop => match request_shutdown(&home) {
            Ok(()) => println!("daemon stop requested"),
            Err(DaemonError::DaemonNotRunning { .. }) => {
                println!("daemon is not running");
            }
            Err(err) => return Err(err).context("failed to stop daemon"),
        },
        DaemonCommand::Status => {
            let socket = socket_path(&home).display().to_string();
            let payload = match request_status(&home) {
                Ok(status) => serde_json::json!({
                    "running": true,
                    "socket": socket,
                    "isBlocking": status.is_blocking,
                    "elapsed": status.elapsed,
                    "totalSessions": status.total_sessions,
                }),
                Err(DaemonError::DaemonNotRunning { .. }) => serde_json::json!({
                    "running": false,
                    "socket": socket,
                }),
                Err(err) => return Err(err).context("failed to query daemon status"),
            };
            println!(
                "{}",
                serde_json::to_string_pretty(&payload)
                    .context("failed to render daemon status JSON")?
            );
        }
    }

    Ok(())
}
