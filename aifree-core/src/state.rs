//! Typed view of the persisted key layout.
//!
//! | key                     | shape                          |
//! |-------------------------|--------------------------------|
//! | `isBlocking`            | bool                           |
//! | `blocklist`             | `[string]`                     |
//! | `sessionLogs`           | `[SessionLogEntry]`            |
//! | `currentSessionStart`   | RFC 3339 string or `null`      |
//! | `currentSessionElapsed` | integer seconds (display only) |
//!
//! Writes go through [`StatePatch`] so each transition lands in one `set`.

use chrono::{DateTime, FixedOffset};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::StorageError;
use crate::storage::KeyValueStore;
use crate::types::{Blocklist, SessionLogEntry};

pub const IS_BLOCKING: &str = "isBlocking";
pub const BLOCKLIST: &str = "blocklist";
pub const SESSION_LOGS: &str = "sessionLogs";
pub const CURRENT_SESSION_START: &str = "currentSessionStart";
pub const CURRENT_SESSION_ELAPSED: &str = "currentSessionElapsed";

/// Everything the session logic keeps between restarts.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PersistedState {
    pub is_blocking: bool,
    pub blocklist: Blocklist,
    pub session_logs: Vec<SessionLogEntry>,
    pub current_session_start: Option<DateTime<FixedOffset>>,
    pub current_session_elapsed: u64,
}

impl PersistedState {
    /// Load all keys, defaulting the ones that are absent.
    ///
    /// An unparseable `currentSessionStart` reads as absent; the resulting
    /// state then fails [`is_consistent`](Self::is_consistent) and the caller
    /// can repair it.
    pub fn load(store: &impl KeyValueStore) -> Result<Self, StorageError> {
        let current_session_start = read::<String>(store, CURRENT_SESSION_START)?
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok());

        Ok(Self {
            is_blocking: read(store, IS_BLOCKING)?.unwrap_or(false),
            blocklist: read(store, BLOCKLIST)?.unwrap_or_default(),
            session_logs: read(store, SESSION_LOGS)?.unwrap_or_default(),
            current_session_start,
            current_session_elapsed: read(store, CURRENT_SESSION_ELAPSED)?.unwrap_or(0),
        })
    }

    /// `true` once the first-run defaults have been written.
    pub fn is_seeded(store: &impl KeyValueStore) -> Result<bool, StorageError> {
        Ok(store.get(BLOCKLIST)?.is_some())
    }

    /// `isBlocking` is set exactly when a session start is recorded.
    pub fn is_consistent(&self) -> bool {
        self.is_blocking == self.current_session_start.is_some()
    }
}

/// Read one key, treating `null` like an absent key.
pub fn read<T: DeserializeOwned>(
    store: &impl KeyValueStore,
    key: &'static str,
) -> Result<Option<T>, StorageError> {
    match store.get(key)? {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value)
            .map(Some)
            .map_err(|source| StorageError::InvalidValue { key, source }),
    }
}

/// A batch of key writes applied with a single [`KeyValueStore::set`].
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    items: Map<String, Value>,
}

impl StatePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_blocking(self, value: bool) -> Result<Self, StorageError> {
        self.with(IS_BLOCKING, &value)
    }

    pub fn blocklist(self, value: &Blocklist) -> Result<Self, StorageError> {
        self.with(BLOCKLIST, value)
    }

    pub fn session_logs(self, value: &[SessionLogEntry]) -> Result<Self, StorageError> {
        self.with(SESSION_LOGS, &value)
    }

    /// `None` clears the key to `null`.
    pub fn current_session_start(
        self,
        value: Option<&DateTime<FixedOffset>>,
    ) -> Result<Self, StorageError> {
        let raw = value.map(DateTime::to_rfc3339);
        self.with(CURRENT_SESSION_START, &raw)
    }

    pub fn current_session_elapsed(self, seconds: u64) -> Result<Self, StorageError> {
        self.with(CURRENT_SESSION_ELAPSED, &seconds)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Write every queued key in one step.
    pub fn apply(self, store: &mut impl KeyValueStore) -> Result<(), StorageError> {
        if self.items.is_empty() {
            return Ok(());
        }
        store.set(self.items)
    }

    fn with<T: Serialize + ?Sized>(mut self, key: &str, value: &T) -> Result<Self, StorageError> {
        self.items.insert(key.to_owned(), serde_json::to_value(value)?);
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn start() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2025-03-14T10:00:00+01:00").unwrap()
    }

    #[test]
    fn empty_store_loads_defaults() {
        let store = MemoryStore::new();
        let state = PersistedState::load(&store).unwrap();
        assert_eq!(state, PersistedState::default());
        assert!(state.is_consistent());
        assert!(!PersistedState::is_seeded(&store).unwrap());
    }

    #[test]
    fn patch_writes_wire_layout() {
        let mut store = MemoryStore::new();
        StatePatch::new()
            .is_blocking(true)
            .and_then(|p| p.current_session_start(Some(&start())))
            .and_then(|p| p.blocklist(&Blocklist::from_entries(["claude.ai"])))
            .and_then(|p| p.apply(&mut store))
            .unwrap();

        assert_eq!(store.entries()[IS_BLOCKING], json!(true));
        assert_eq!(
            store.entries()[CURRENT_SESSION_START],
            json!("2025-03-14T10:00:00+01:00")
        );
        assert_eq!(store.entries()[BLOCKLIST], json!(["claude.ai"]));

        let state = PersistedState::load(&store).unwrap();
        assert_eq!(state.current_session_start, Some(start()));
        assert!(state.is_consistent());
    }

    #[test]
    fn cleared_start_is_stored_as_null() {
        let mut store = MemoryStore::new();
        StatePatch::new()
            .current_session_start(None)
            .and_then(|p| p.apply(&mut store))
            .unwrap();
        assert_eq!(store.entries()[CURRENT_SESSION_START], Value::Null);
        assert_eq!(PersistedState::load(&store).unwrap().current_session_start, None);
    }

    #[test]
    fn garbage_start_reads_as_inconsistent() {
        let mut store = MemoryStore::new();
        store
            .set(
                json!({"isBlocking": true, "currentSessionStart": "yesterday-ish"})
                    .as_object()
                    .cloned()
                    .unwrap(),
            )
            .unwrap();
        let state = PersistedState::load(&store).unwrap();
        assert!(state.is_blocking);
        assert_eq!(state.current_session_start, None);
        assert!(!state.is_consistent());
    }

    #[test]
    fn wrong_shape_names_the_key() {
        let mut store = MemoryStore::new();
        store
            .set(json!({"sessionLogs": "nope"}).as_object().cloned().unwrap())
            .unwrap();
        let err = PersistedState::load(&store).unwrap_err();
        assert!(matches!(err, StorageError::InvalidValue { key: SESSION_LOGS, .. }));
        assert!(err.to_string().contains("sessionLogs"));
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut store = MemoryStore::new();
        let patch = StatePatch::new();
        assert!(patch.is_empty());
        patch.apply(&mut store).unwrap();
        assert!(store.entries().is_empty());
    }
}
