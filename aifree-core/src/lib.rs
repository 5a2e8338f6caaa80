//! aifree core library: domain types, key/value persistence, errors.
//!
//! Public API surface:
//! - [`types`]: blocklist, session log entries, status snapshot
//! - [`storage`]: the [`KeyValueStore`] capability and its file/memory backends
//! - [`state`]: typed view of the persisted key/value layout
//! - [`error`]: [`StorageError`]

pub mod error;
pub mod state;
pub mod storage;
pub mod types;

pub use error::StorageError;
pub use state::{PersistedState, StatePatch};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use types::{BlockPattern, Blocklist, SessionLogEntry, SessionStatus, DEFAULT_BLOCKLIST};
