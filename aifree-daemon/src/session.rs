//! Session state machine.
//!
//! Two states: Idle and Active (a `currentSessionStart` is recorded).
//! Idle --start--> Active, Active --stop--> Idle. Everything else is a query
//! or a blocklist/log edit that works in both states.
//!
//! Every transition persists first and syncs engine rules second. A storage
//! failure aborts the transition; a rule sync failure is logged and the
//! transition still counts.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use aifree_core::{
    types::round_seconds, Blocklist, KeyValueStore, PersistedState, SessionLogEntry,
    SessionStatus, StatePatch, StorageError,
};
use aifree_sync::{BlockingEngine, RuleSynchronizer, SyncOutcome};

use crate::clock::Clock;
use crate::paths::TICK_INTERVAL;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a session is already active")]
    AlreadyActive,

    #[error("no active session")]
    NoActiveSession,

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What [`SessionStore::initialize`] found in storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Nothing stored yet; defaults written.
    Seeded,
    /// No session was running.
    Idle,
    /// A session was running before the restart and continues.
    Resumed { since: DateTime<FixedOffset> },
    /// Stored state broke the blocking/start invariant and was reset to Idle.
    Repaired,
}

pub struct SessionStore<S, E> {
    storage: S,
    sync: RuleSynchronizer<E>,
    clock: Arc<dyn Clock>,
    /// Where the elapsed publisher sends its ticks. `None` disables it.
    ticks: Option<mpsc::Sender<()>>,
    /// Lives exactly as long as the Active state.
    publisher: Option<JoinHandle<()>>,
}

impl<S: KeyValueStore, E: BlockingEngine> SessionStore<S, E> {
    pub fn new(storage: S, engine: E, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            sync: RuleSynchronizer::new(engine),
            clock,
            ticks: None,
            publisher: None,
        }
    }

    /// Route elapsed-publisher ticks to `ticks`; the owner answers each one
    /// with [`publish_elapsed`](Self::publish_elapsed).
    pub fn with_ticks(mut self, ticks: mpsc::Sender<()>) -> Self {
        self.ticks = Some(ticks);
        self
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn synchronizer(&self) -> &RuleSynchronizer<E> {
        &self.sync
    }

    pub fn synchronizer_mut(&mut self) -> &mut RuleSynchronizer<E> {
        &mut self.sync
    }

    /// `true` while an elapsed publisher task is alive.
    pub fn is_publishing(&self) -> bool {
        self.publisher
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }

    /// Bring storage and engine into line at startup.
    ///
    /// Seeds defaults on first run, resumes a session that was active before a
    /// restart, and repairs state that breaks the blocking/start invariant.
    pub fn initialize(&mut self) -> Result<Recovery, SessionError> {
        if !PersistedState::is_seeded(&self.storage)? {
            StatePatch::new()
                .is_blocking(false)?
                .blocklist(&Blocklist::default_sites())?
                .session_logs(&[])?
                .current_session_start(None)?
                .current_session_elapsed(0)?
                .apply(&mut self.storage)?;
            self.sync_rules(None);
            tracing::info!("storage seeded with default blocklist");
            return Ok(Recovery::Seeded);
        }

        let state = PersistedState::load(&self.storage)?;
        if !state.is_consistent() {
            tracing::warn!(
                is_blocking = state.is_blocking,
                has_start = state.current_session_start.is_some(),
                "persisted session state is inconsistent; resetting to idle",
            );
            self.write_idle(None)?;
            self.sync_rules(None);
            return Ok(Recovery::Repaired);
        }

        match state.current_session_start {
            Some(since) => {
                self.restart_publisher();
                self.sync_rules(Some(&state.blocklist));
                tracing::info!(since = %since, "resumed active session");
                Ok(Recovery::Resumed { since })
            }
            None => {
                self.sync_rules(None);
                Ok(Recovery::Idle)
            }
        }
    }

    /// Idle → Active. Rejected with [`SessionError::AlreadyActive`] (and no
    /// change at all) while a session runs.
    pub fn start_session(&mut self) -> Result<DateTime<FixedOffset>, SessionError> {
        let state = PersistedState::load(&self.storage)?;
        if state.is_blocking || state.current_session_start.is_some() {
            return Err(SessionError::AlreadyActive);
        }

        let now = self.clock.now();
        StatePatch::new()
            .is_blocking(true)?
            .current_session_start(Some(&now))?
            .current_session_elapsed(0)?
            .apply(&mut self.storage)?;

        self.restart_publisher();
        self.sync_rules(Some(&state.blocklist));
        tracing::info!(start = %now, "session started");
        Ok(now)
    }

    /// Active → Idle, appending the finished session to the log.
    pub fn stop_session(&mut self) -> Result<SessionLogEntry, SessionError> {
        let state = PersistedState::load(&self.storage)?;
        let Some(start) = state.current_session_start else {
            return Err(SessionError::NoActiveSession);
        };

        let end = self.clock.now();
        let entry = SessionLogEntry::from_span(&start.with_timezone(end.offset()), &end);

        let mut logs = state.session_logs;
        logs.push(entry.clone());
        self.write_idle(Some(&logs))?;

        self.cancel_publisher();
        self.sync_rules(None);
        tracing::info!(
            duration_min = entry.duration_minutes,
            total_sessions = logs.len(),
            "session stopped",
        );
        Ok(entry)
    }

    /// Elapsed time is recomputed from the stored start on every call.
    pub fn status(&self) -> Result<SessionStatus, SessionError> {
        let state = PersistedState::load(&self.storage)?;
        let elapsed = match (state.is_blocking, state.current_session_start) {
            (true, Some(start)) => round_seconds(self.clock.now() - start),
            _ => 0,
        };
        Ok(SessionStatus {
            is_blocking: state.is_blocking,
            elapsed,
            total_sessions: state.session_logs.len(),
        })
    }

    /// Replace the blocklist wholesale. While active, rules follow at once.
    pub fn update_blocklist<I, T>(&mut self, entries: I) -> Result<Blocklist, SessionError>
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        let blocklist = Blocklist::from_entries(entries);
        StatePatch::new()
            .blocklist(&blocklist)?
            .apply(&mut self.storage)?;

        let state = PersistedState::load(&self.storage)?;
        if state.is_blocking {
            self.sync_rules(Some(&blocklist));
        }
        tracing::info!(sites = blocklist.len(), "blocklist updated");
        Ok(blocklist)
    }

    pub fn blocklist(&self) -> Result<Blocklist, SessionError> {
        Ok(PersistedState::load(&self.storage)?.blocklist)
    }

    /// Every finished session, oldest first.
    pub fn export_logs(&self) -> Result<Vec<SessionLogEntry>, SessionError> {
        Ok(PersistedState::load(&self.storage)?.session_logs)
    }

    pub fn clear_logs(&mut self) -> Result<(), SessionError> {
        StatePatch::new()
            .session_logs(&[])?
            .apply(&mut self.storage)?;
        tracing::info!("session history cleared");
        Ok(())
    }

    /// Store the advisory elapsed counter. Never fails the caller.
    pub fn publish_elapsed(&mut self) {
        let result = PersistedState::load(&self.storage).and_then(|state| {
            let Some(start) = state.current_session_start else {
                return Ok(());
            };
            let elapsed = round_seconds(self.clock.now() - start);
            StatePatch::new()
                .current_session_elapsed(elapsed)?
                .apply(&mut self.storage)
        });
        if let Err(err) = result {
            tracing::warn!(error = %err, "failed to publish elapsed time");
        }
    }

    fn write_idle(&mut self, logs: Option<&[SessionLogEntry]>) -> Result<(), StorageError> {
        let mut patch = StatePatch::new()
            .is_blocking(false)?
            .current_session_start(None)?
            .current_session_elapsed(0)?;
        if let Some(logs) = logs {
            patch = patch.session_logs(logs)?;
        }
        patch.apply(&mut self.storage)
    }

    fn sync_rules(&mut self, blocklist: Option<&Blocklist>) -> SyncOutcome {
        let outcome = match blocklist {
            Some(list) => self.sync.enable(list),
            None => self.sync.disable(),
        };
        if let SyncOutcome::Failed { stage, error } = &outcome {
            tracing::warn!(
                stage = %stage,
                error = %error,
                "blocking rules out of sync; the next transition will retry",
            );
        }
        outcome
    }

    fn restart_publisher(&mut self) {
        self.cancel_publisher();
        let Some(ticks) = self.ticks.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!("no async runtime; elapsed publisher not started");
            return;
        };
        self.publisher = Some(runtime.spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            interval.tick().await; // first tick fires immediately

            loop {
                interval.tick().await;
                match ticks.try_send(()) {
                    Ok(()) | Err(mpsc::error::TrySendError::Full(())) => {}
                    Err(mpsc::error::TrySendError::Closed(())) => break,
                }
            }
        }));
    }

    fn cancel_publisher(&mut self) {
        if let Some(handle) = self.publisher.take() {
            handle.abort();
        }
    }
}

impl<S, E> Drop for SessionStore<S, E> {
    fn drop(&mut self) {
        if let Some(handle) = self.publisher.take() {
            handle.abort();
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
