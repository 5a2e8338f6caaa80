//! # aifree-sync
//!
//! Keeps the blocking engine's dynamic rules in line with session state.
//!
//! [`rule::build_rules`] derives rules from a blocklist, the
//! [`BlockingEngine`] trait abstracts where rules live, and
//! [`RuleSynchronizer`] clears and reapplies them on every change.

pub mod engine;
pub mod error;
pub mod rule;
pub mod synchronizer;

pub use engine::{BlockingEngine, EngineCall, FileEngine, MemoryEngine};
pub use error::EngineError;
pub use rule::{build_rules, ResourceType, Rule, UrlFilter};
pub use synchronizer::{RuleSynchronizer, SyncOutcome, SyncStage};
