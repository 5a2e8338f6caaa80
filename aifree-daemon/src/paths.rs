use std::path::{Path, PathBuf};
use std::time::Duration;

/// How often the elapsed counter is refreshed while a session runs.
pub const TICK_INTERVAL: Duration = Duration::from_secs(1);

pub const DAEMON_SOCKET: &str = "daemon.sock";

pub fn aifree_root(home: &Path) -> PathBuf {
    aifree_core::storage::root_at(home)
}

pub fn socket_path(home: &Path) -> PathBuf {
    aifree_root(home).join(DAEMON_SOCKET)
}

pub fn storage_path(home: &Path) -> PathBuf {
    aifree_core::storage::storage_path_at(home)
}

pub fn rules_path(home: &Path) -> PathBuf {
    aifree_sync::engine::rules_path_at(home)
}
