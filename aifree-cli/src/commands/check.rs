//! `aifree check <url>`

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::{home_dir, rules::load_rules};

/// Report whether a top-level navigation to a URL would be blocked.
#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Full URL, e.g. https://claude.ai/new
    pub url: String,
}

impl CheckArgs {
    pub fn run(self) -> Result<()> {
        let home = home_dir()?;
        let rules = load_rules(&home)?;
        let url = normalize(&self.url);

        match rules.iter().find(|rule| rule.blocks_navigation(&url)) {
            Some(rule) => println!(
                "{} {url} (rule {}: {})",
                "blocked".red().bold(),
                rule.id,
                rule.condition.url_filter.as_str()
            ),
            None => println!("{} {url}", "allowed".green().bold()),
        }
        Ok(())
    }
}

/// Browsers request `/` for a bare origin; match the URL they would load.
fn normalize(url: &str) -> String {
    let url = url.trim();
    match url.split_once("://") {
        Some((_, rest)) if !rest.contains('/') => format!("{url}/"),
        _ => url.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_origin_gets_root_path() {
        assert_eq!(normalize("https://claude.ai"), "https://claude.ai/");
        assert_eq!(normalize(" https://claude.ai/new "), "https://claude.ai/new");
        assert_eq!(normalize("claude.ai"), "claude.ai");
    }
}
