pub mod blocklist;
pub mod check;
pub mod daemon;
pub mod logs;
pub mod rules;
pub mod session;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

use aifree_daemon::DaemonError;

pub(crate) fn home_dir() -> Result<PathBuf> {
    dirs::home_dir().context("could not determine home directory")
}

/// Wrap a daemon error, pointing at `aifree daemon start` when nothing is listening.
pub(crate) fn daemon_context(err: DaemonError, action: &str) -> anyhow::Error {
    match err {
        DaemonError::DaemonNotRunning { .. } => anyhow::Error::new(err)
            .context(format!("failed to {action}; start the daemon with `aifree daemon start`")),
        other => anyhow::Error::new(other).context(format!("failed to {action}")),
    }
}
