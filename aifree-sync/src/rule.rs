//! Blocking rules and their derivation from the blocklist.
//!
//! Derivation is pure: the same blocklist always yields the same rules, with
//! ids numbered from 1 in list order.

use std::fmt;

use serde::{Deserialize, Serialize};

use aifree_core::{BlockPattern, Blocklist};

/// Every derived rule carries this priority.
pub const RULE_PRIORITY: u32 = 1;

// ---------------------------------------------------------------------------
// Rule shape (declarative-net-request JSON)
// ---------------------------------------------------------------------------

/// One dynamic rule as the blocking engine stores it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: u32,
    pub priority: u32,
    pub action: RuleAction,
    pub condition: RuleCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleAction {
    #[serde(rename = "type")]
    pub kind: ActionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionType {
    Block,
    Allow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuleCondition {
    pub url_filter: UrlFilter,
    pub resource_types: Vec<ResourceType>,
}

/// Request categories a rule can apply to. Only top-level navigations are
/// ever blocked; the other variants exist so foreign rule sets still parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    MainFrame,
    SubFrame,
    Script,
    Image,
    Stylesheet,
    Xmlhttprequest,
    Other,
}

impl Rule {
    /// A block rule for a single main-frame URL filter.
    pub fn block(id: u32, url_filter: UrlFilter) -> Self {
        Self {
            id,
            priority: RULE_PRIORITY,
            action: RuleAction {
                kind: ActionType::Block,
            },
            condition: RuleCondition {
                url_filter,
                resource_types: vec![ResourceType::MainFrame],
            },
        }
    }

    /// `true` if this rule blocks a top-level navigation to `url`.
    pub fn blocks_navigation(&self, url: &str) -> bool {
        self.action.kind == ActionType::Block
            && self
                .condition
                .resource_types
                .contains(&ResourceType::MainFrame)
            && self.condition.url_filter.matches(url)
    }
}

/// Build the rule set for `blocklist`: one rule per entry, ids `1..=n`.
pub fn build_rules(blocklist: &Blocklist) -> Vec<Rule> {
    blocklist
        .iter()
        .enumerate()
        .map(|(index, pattern)| Rule::block(index as u32 + 1, UrlFilter::for_pattern(pattern)))
        .collect()
}

// ---------------------------------------------------------------------------
// UrlFilter
// ---------------------------------------------------------------------------

/// A URL pattern where `*` matches any run of characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UrlFilter(pub String);

impl UrlFilter {
    /// Filter for a blocklist entry, any scheme.
    ///
    /// - `github.com/copilot` → `*://github.com/copilot*`
    /// - `claude.ai` → `*://claude.ai/*`
    pub fn for_pattern(pattern: &BlockPattern) -> Self {
        if pattern.has_path() {
            Self(format!("*://{pattern}*"))
        } else {
            Self(format!("*://{pattern}/*"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whole-URL, ASCII-case-insensitive wildcard match.
    pub fn matches(&self, url: &str) -> bool {
        let filter: Vec<char> = self.0.to_ascii_lowercase().chars().collect();
        let url: Vec<char> = url.to_ascii_lowercase().chars().collect();

        let (mut f, mut u) = (0usize, 0usize);
        // Position of the last `*` seen and the url index it was tried against.
        let mut backtrack: Option<(usize, usize)> = None;

        while u < url.len() {
            if f < filter.len() && filter[f] == '*' {
                backtrack = Some((f, u));
                f += 1;
            } else if f < filter.len() && filter[f] == url[u] {
                f += 1;
                u += 1;
            } else if let Some((star, matched)) = backtrack {
                f = star + 1;
                u = matched + 1;
                backtrack = Some((star, matched + 1));
            } else {
                return false;
            }
        }

        filter[f..].iter().all(|c| *c == '*')
    }
}

impl fmt::Display for UrlFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
