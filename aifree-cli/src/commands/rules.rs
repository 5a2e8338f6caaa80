//! `aifree rules [--json]`
//!
//! Reads the rule file directly, so it works whether or not the daemon runs.

use anyhow::{Context, Result};
use clap::Args;
use tabled::{settings::Style, Table, Tabled};

use aifree_sync::{BlockingEngine, FileEngine, Rule};

use super::home_dir;

/// Show the dynamic blocking rules currently in force.
#[derive(Args, Debug)]
pub struct RulesArgs {
    /// Output the raw rule set as JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Tabled)]
struct RuleRow {
    #[tabled(rename = "id")]
    id: u32,
    #[tabled(rename = "priority")]
    priority: u32,
    #[tabled(rename = "url filter")]
    url_filter: String,
    #[tabled(rename = "resource types")]
    resource_types: String,
}

impl RulesArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let rules = load_rules(&home)?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rules).context("failed to render rules JSON")?
            );
            return Ok(());
        }

        if rules.is_empty() {
            println!("no blocking rules active");
            return Ok(());
        }

        let rows = rules
            .iter()
            .map(|rule| -> Result<RuleRow> {
                Ok(RuleRow {
                    id: rule.id,
                    priority: rule.priority,
                    url_filter: rule.condition.url_filter.as_str().to_string(),
                    resource_types: serde_json::to_value(&rule.condition.resource_types)
                        .context("failed to render resource types")?
                        .as_array()
                        .map(|types| {
                            types
                                .iter()
                                .filter_map(|t| t.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        })
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        Ok(())
    }
}

pub(crate) fn load_rules(home: &std::path::Path) -> Result<Vec<Rule>> {
    let engine = FileEngine::at_home(home);
    engine
        .list_rules()
        .with_context(|| format!("failed to read rules from {}", engine.path().display()))
}
