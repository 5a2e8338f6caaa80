//! Blocking engine capability and its backends.
//!
//! The engine owns a set of dynamic rules keyed by id. Like the platform
//! engine it models, adding a rule whose id is already installed fails the
//! whole batch, which is why [`RuleSynchronizer`](crate::RuleSynchronizer)
//! always clears before it adds.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{io_err, EngineError};
use crate::rule::Rule;

/// `list / removeBatch / addBatch` over the engine's dynamic rules.
pub trait BlockingEngine {
    fn list_rules(&self) -> Result<Vec<Rule>, EngineError>;

    fn remove_rules(&mut self, ids: &[u32]) -> Result<(), EngineError>;

    fn add_rules(&mut self, rules: Vec<Rule>) -> Result<(), EngineError>;
}

/// Reject a batch that collides with installed ids or repeats an id.
fn check_ids(installed: &[Rule], batch: &[Rule]) -> Result<(), EngineError> {
    let mut seen: HashSet<u32> = installed.iter().map(|r| r.id).collect();
    for rule in batch {
        if !seen.insert(rule.id) {
            return Err(EngineError::DuplicateRuleId(rule.id));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// MemoryEngine
// ---------------------------------------------------------------------------

/// Which engine call a [`MemoryEngine`] should fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCall {
    List,
    Remove,
    Add,
}

/// In-process engine. Records each remove/add batch it receives so tests can
/// check the batch discipline, and can be told to fail a given call.
#[derive(Debug, Clone, Default)]
pub struct MemoryEngine {
    rules: Vec<Rule>,
    fail_on: Option<EngineCall>,
    calls: Vec<EngineCall>,
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Engine that starts out with `rules` installed.
    pub fn with_rules(rules: Vec<Rule>) -> Self {
        Self {
            rules,
            ..Self::default()
        }
    }

    /// Make every future `call` fail with [`EngineError::Rejected`].
    pub fn fail_on(&mut self, call: EngineCall) {
        self.fail_on = Some(call);
    }

    pub fn recover(&mut self) {
        self.fail_on = None;
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn calls(&self) -> &[EngineCall] {
        &self.calls
    }

    fn enter(&mut self, call: EngineCall) -> Result<(), EngineError> {
        self.calls.push(call);
        if self.fail_on == Some(call) {
            return Err(EngineError::Rejected(format!("{call:?} disabled")));
        }
        Ok(())
    }
}

impl BlockingEngine for MemoryEngine {
    fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        if self.fail_on == Some(EngineCall::List) {
            return Err(EngineError::Rejected("List disabled".to_string()));
        }
        Ok(self.rules.clone())
    }

    fn remove_rules(&mut self, ids: &[u32]) -> Result<(), EngineError> {
        self.enter(EngineCall::Remove)?;
        self.rules.retain(|rule| !ids.contains(&rule.id));
        Ok(())
    }

    fn add_rules(&mut self, rules: Vec<Rule>) -> Result<(), EngineError> {
        self.enter(EngineCall::Add)?;
        check_ids(&self.rules, &rules)?;
        self.rules.extend(rules);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileEngine
// ---------------------------------------------------------------------------

/// `<home>/.aifree/rules.json`
pub fn rules_path_at(home: &Path) -> PathBuf {
    home.join(".aifree").join("rules.json")
}

/// Engine whose rule set lives in a JSON array on disk, for consumption by
/// whatever enforces it (browser policy, filtering proxy).
///
/// Writes use the `.tmp` + rename pattern.
#[derive(Debug, Clone)]
pub struct FileEngine {
    path: PathBuf,
}

impl FileEngine {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn at_home(home: &Path) -> Self {
        Self::new(rules_path_at(home))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<Rule>, EngineError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.path).map_err(|e| io_err(&self.path, e))?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_str(&contents)?)
    }

    fn save(&self, rules: &[Rule]) -> Result<(), EngineError> {
        let Some(dir) = self.path.parent() else {
            return Err(io_err(
                &self.path,
                std::io::Error::other("invalid rule file path"),
            ));
        };
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

        let json = serde_json::to_string_pretty(rules)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        Ok(())
    }
}

impl BlockingEngine for FileEngine {
    fn list_rules(&self) -> Result<Vec<Rule>, EngineError> {
        self.load()
    }

    fn remove_rules(&mut self, ids: &[u32]) -> Result<(), EngineError> {
        let mut rules = self.load()?;
        rules.retain(|rule| !ids.contains(&rule.id));
        self.save(&rules)
    }

    fn add_rules(&mut self, rules: Vec<Rule>) -> Result<(), EngineError> {
        let mut installed = self.load()?;
        check_ids(&installed, &rules)?;
        installed.extend(rules);
        self.save(&installed)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
