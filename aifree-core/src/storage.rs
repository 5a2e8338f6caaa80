//! Durable key/value storage.
//!
//! # Storage layout
//!
//! ```text
//! ~/.aifree/
//!   storage.json   (single JSON object, one member per key, mode 0600)
//! ```
//!
//! The session logic only sees the [`KeyValueStore`] trait. [`FileStore`] is
//! the on-disk backend; [`MemoryStore`] backs tests.
//!
//! Path helpers take an explicit home (`_at(home)`) so tests can point them
//! at a `TempDir`; binaries resolve the home directory once at startup.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};

use crate::error::{io_err, StorageError};

/// Get/set capability over a flat JSON key space.
///
/// `set` writes every member of `items` in one step: either all of them land
/// or none do.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError>;

    fn set(&mut self, items: Map<String, Value>) -> Result<(), StorageError>;
}

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

/// `<home>/.aifree/`
pub fn root_at(home: &Path) -> PathBuf {
    home.join(".aifree")
}

/// `<home>/.aifree/storage.json`. Pure, no I/O.
pub fn storage_path_at(home: &Path) -> PathBuf {
    root_at(home).join("storage.json")
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// JSON-document store. Every `set` rewrites the document atomically
/// (`<path>.tmp` then rename), so a crash never leaves a half-written file.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store rooted at `<home>/.aifree/storage.json`.
    pub fn at_home(home: &Path) -> Self {
        Self::new(storage_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the whole document. A missing file is an empty document.
    pub fn load(&self) -> Result<Map<String, Value>, StorageError> {
        if !self.path.exists() {
            return Ok(Map::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(Map::new());
        }
        let value: Value = serde_json::from_str(&contents).map_err(|e| StorageError::Parse {
            path: self.path.clone(),
            source: e,
        })?;
        match value {
            Value::Object(map) => Ok(map),
            _ => Err(StorageError::NotAnObject {
                path: self.path.clone(),
            }),
        }
    }

    fn save(&self, document: &Map<String, Value>) -> Result<(), StorageError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid storage path"),
            ));
        };
        if !dir.exists() {
            std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
            set_dir_permissions(dir)?;
        }

        let json = serde_json::to_string_pretty(document)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        set_file_permissions(&tmp)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.load()?.remove(key))
    }

    fn set(&mut self, items: Map<String, Value>) -> Result<(), StorageError> {
        let mut document = self.load()?;
        document.extend(items);
        self.save(&document)
    }
}

#[cfg(unix)]
fn set_dir_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o700))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_dir_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StorageError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
        .map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StorageError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-process store; contents vanish with the value.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Map<String, Value>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &Map<String, Value> {
        &self.entries
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, items: Map<String, Value>) -> Result<(), StorageError> {
        self.entries.extend(items);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
