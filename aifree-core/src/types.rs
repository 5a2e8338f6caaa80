//! Domain types for sessions and the blocklist.
//!
//! Everything here is serde-serializable in the exact shape stored under the
//! persisted keys (see [`crate::state`]).

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, TimeDelta, TimeZone, Timelike};
use serde::{Deserialize, Serialize};

/// Sites blocked out of the box, seeded on first run and restored by reset.
pub const DEFAULT_BLOCKLIST: [&str; 10] = [
    "chat.openai.com",
    "claude.ai",
    "gemini.google.com",
    "copilot.microsoft.com",
    "github.com/copilot",
    "codeium.com",
    "tabnine.com",
    "bard.google.com",
    "poe.com",
    "chatgpt.com",
];

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// A single blocklist entry: a bare domain (`claude.ai`) or a domain with a
/// path prefix (`github.com/copilot`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockPattern(pub String);

impl BlockPattern {
    /// `true` when the entry scopes the block to a path rather than a whole domain.
    pub fn has_path(&self) -> bool {
        self.0.contains('/')
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlockPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for BlockPattern {
    fn from(s: String) -> Self {
        Self(s.trim().to_owned())
    }
}

impl From<&str> for BlockPattern {
    fn from(s: &str) -> Self {
        Self(s.trim().to_owned())
    }
}

// ---------------------------------------------------------------------------
// Blocklist
// ---------------------------------------------------------------------------

/// Ordered set of block patterns.
///
/// Insertion order is kept for display and for rule ids; duplicates and blank
/// entries never make it in.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Blocklist {
    entries: Vec<BlockPattern>,
}

impl Blocklist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a blocklist from raw entries, dropping blanks and repeats.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for entry in entries {
            list.insert(entry.into());
        }
        list
    }

    /// The built-in list of AI assistant sites.
    pub fn default_sites() -> Self {
        Self::from_entries(DEFAULT_BLOCKLIST)
    }

    /// Append `entry` unless it is blank or already present.
    ///
    /// Returns `true` if the list changed.
    pub fn insert(&mut self, entry: impl Into<String>) -> bool {
        let pattern = BlockPattern::from(entry.into());
        if pattern.0.is_empty() || self.entries.contains(&pattern) {
            return false;
        }
        self.entries.push(pattern);
        true
    }

    /// Remove `entry`. Returns `true` if it was present.
    pub fn remove(&mut self, entry: &str) -> bool {
        let entry = entry.trim();
        let before = self.entries.len();
        self.entries.retain(|p| p.0 != entry);
        self.entries.len() != before
    }

    pub fn contains(&self, entry: &str) -> bool {
        let entry = entry.trim();
        self.entries.iter().any(|p| p.0 == entry)
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockPattern> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.entries.iter().map(|p| p.0.clone()).collect()
    }
}

impl From<Vec<String>> for Blocklist {
    fn from(entries: Vec<String>) -> Self {
        Self::from_entries(entries)
    }
}

impl From<Blocklist> for Vec<String> {
    fn from(list: Blocklist) -> Self {
        list.entries.into_iter().map(|p| p.0).collect()
    }
}

// ---------------------------------------------------------------------------
// Session log
// ---------------------------------------------------------------------------

/// One finished session. Never mutated after it is appended to the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLogEntry {
    /// Calendar date the session started on.
    pub date: NaiveDate,
    /// Wall-clock start, `HH:MM`.
    #[serde(with = "hhmm")]
    pub start: NaiveTime,
    /// Wall-clock end, `HH:MM`.
    #[serde(with = "hhmm")]
    pub end: NaiveTime,
    #[serde(rename = "duration_min", alias = "durationMinutes")]
    pub duration_minutes: u32,
}

impl SessionLogEntry {
    /// Build an entry for a session spanning `start..end`, using the wall-clock
    /// fields of whatever offset the timestamps carry.
    pub fn from_span<Tz: TimeZone>(start: &DateTime<Tz>, end: &DateTime<Tz>) -> Self {
        Self {
            date: start.date_naive(),
            start: truncate_to_minute(start.time()),
            end: truncate_to_minute(end.time()),
            duration_minutes: round_minutes(end.clone().signed_duration_since(start.clone())),
        }
    }
}

/// Whole minutes in `span`, rounding half away from zero. Negative spans count as zero.
pub fn round_minutes(span: TimeDelta) -> u32 {
    let millis = span.num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis as f64 / 60_000.0).round() as u32
}

/// Whole seconds in `span`, rounding half away from zero. Negative spans count as zero.
pub fn round_seconds(span: TimeDelta) -> u64 {
    let millis = span.num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    (millis as f64 / 1_000.0).round() as u64
}

fn truncate_to_minute(time: NaiveTime) -> NaiveTime {
    NaiveTime::from_hms_opt(time.hour(), time.minute(), 0).unwrap_or(time)
}

mod hhmm {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%H:%M";

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, FORMAT).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Snapshot returned by `GET_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatus {
    pub is_blocking: bool,
    /// Seconds since the active session started; 0 when idle.
    pub elapsed: u64,
    pub total_sessions: usize,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
