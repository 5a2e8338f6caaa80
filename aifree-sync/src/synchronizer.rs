//! Rule synchronization.
//!
//! ## Steps
//!
//! 1. List the engine's dynamic rules and collect their ids.
//! 2. Remove all of them in one batch (skipped when there are none).
//! 3. Enabled: derive one rule per blocklist entry and add them in one batch.
//!    An empty blocklist adds nothing.
//! 4. Disabled: add nothing.
//!
//! Clearing unconditionally means ids never collide and no filter from an
//! older blocklist survives. Engine errors stop the protocol at the failing
//! step, get logged, and come back as [`SyncOutcome::Failed`]; they are never
//! returned as `Err`. Session state is the source of truth and the next sync
//! repairs the engine.

use std::fmt;

use aifree_core::Blocklist;

use crate::engine::BlockingEngine;
use crate::error::EngineError;
use crate::rule::build_rules;

/// Protocol step at which a sync gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStage {
    Fetch,
    Remove,
    Add,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncStage::Fetch => write!(f, "fetch"),
            SyncStage::Remove => write!(f, "remove"),
            SyncStage::Add => write!(f, "add"),
        }
    }
}

/// What a sync run did to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Old rules removed, one rule per blocklist entry installed.
    Applied { removed: usize, added: usize },
    /// Blocking requested but the blocklist is empty; engine left with no rules.
    EmptyBlocklist { removed: usize },
    /// Blocking disabled; engine left with no rules.
    Cleared { removed: usize },
    /// An engine call failed; the engine may hold a partial rule set.
    Failed { stage: SyncStage, error: String },
}

impl SyncOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, SyncOutcome::Failed { .. })
    }
}

/// Owns a [`BlockingEngine`] and keeps its dynamic rules equal to the desired state.
#[derive(Debug)]
pub struct RuleSynchronizer<E> {
    engine: E,
}

impl<E: BlockingEngine> RuleSynchronizer<E> {
    pub fn new(engine: E) -> Self {
        Self { engine }
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Block every entry of `blocklist`, replacing whatever was installed.
    pub fn enable(&mut self, blocklist: &Blocklist) -> SyncOutcome {
        self.sync(Some(blocklist))
    }

    /// Remove every dynamic rule.
    pub fn disable(&mut self) -> SyncOutcome {
        self.sync(None)
    }

    fn sync(&mut self, blocklist: Option<&Blocklist>) -> SyncOutcome {
        tracing::debug!("updating blocking rules, enable: {}", blocklist.is_some());
        let outcome = match self.try_sync(blocklist) {
            Ok(outcome) => outcome,
            Err((stage, err)) => {
                tracing::error!("error updating blocking rules at {stage} step: {err}");
                SyncOutcome::Failed {
                    stage,
                    error: err.to_string(),
                }
            }
        };

        match &outcome {
            SyncOutcome::Applied { removed, added } => {
                tracing::info!("blocking rules applied ({added} added, {removed} removed)")
            }
            SyncOutcome::EmptyBlocklist { removed } => {
                tracing::warn!("no sites in blocklist; {removed} stale rules removed, none added")
            }
            SyncOutcome::Cleared { removed } => {
                tracing::info!("all blocking rules removed ({removed})")
            }
            SyncOutcome::Failed { .. } => {}
        }
        outcome
    }

    fn try_sync(
        &mut self,
        blocklist: Option<&Blocklist>,
    ) -> Result<SyncOutcome, (SyncStage, EngineError)> {
        // Step 1: collect installed ids.
        let existing: Vec<u32> = self
            .engine
            .list_rules()
            .map_err(|e| (SyncStage::Fetch, e))?
            .iter()
            .map(|rule| rule.id)
            .collect();

        // Step 2: clear in one batch.
        if !existing.is_empty() {
            self.engine
                .remove_rules(&existing)
                .map_err(|e| (SyncStage::Remove, e))?;
        }
        let removed = existing.len();

        // Step 4: disabled stops here.
        let Some(blocklist) = blocklist else {
            return Ok(SyncOutcome::Cleared { removed });
        };

        // Step 3: install the derived rules.
        if blocklist.is_empty() {
            return Ok(SyncOutcome::EmptyBlocklist { removed });
        }
        let rules = build_rules(blocklist);
        let added = rules.len();
        self.engine
            .add_rules(rules)
            .map_err(|e| (SyncStage::Add, e))?;

        Ok(SyncOutcome::Applied { removed, added })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
