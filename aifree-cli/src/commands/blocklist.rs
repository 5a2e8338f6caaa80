//! `aifree blocklist list|add|remove|reset`

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use regex::Regex;

use aifree_core::Blocklist;
use aifree_daemon::{request, request_blocklist, Request};

use super::{daemon_context, home_dir};

const DOMAIN_PATTERN: &str = r"^[a-zA-Z0-9][a-zA-Z0-9-]{1,61}[a-zA-Z0-9]\.[a-zA-Z]{2,}$";

#[derive(Subcommand, Debug)]
pub enum BlocklistCommand {
    /// Print the blocked sites in order.
    List,
    /// Block another domain, e.g. `perplexity.ai`.
    Add { site: String },
    /// Stop blocking a site.
    Remove { site: String },
    /// Restore the default list of AI assistant sites.
    Reset,
}

pub fn run(command: BlocklistCommand) -> Result<()> {
    // Validate before touching the daemon so bad input fails fast.
    if let BlocklistCommand::Add { site } = &command {
        validate_domain(site.trim())?;
    }

    let home = home_dir()?;
    let current = request_blocklist(&home).map_err(|e| daemon_context(e, "read blocklist"))?;

    match command {
        BlocklistCommand::List => {
            if current.is_empty() {
                println!("blocklist is empty");
            }
            for (i, site) in current.iter().enumerate() {
                println!("{:>3}. {site}", i + 1);
            }
            return Ok(());
        }
        BlocklistCommand::Add { site } => {
            let site = site.trim().to_string();
            let mut list = Blocklist::from_entries(current);
            if !list.insert(site.clone()) {
                bail!("'{site}' is already in the blocklist");
            }
            update(&home, list)?;
            println!("✓ Added '{site}' to the blocklist");
        }
        BlocklistCommand::Remove { site } => {
            let site = site.trim();
            let mut list = Blocklist::from_entries(current);
            if !list.remove(site) {
                bail!("'{site}' is not in the blocklist");
            }
            update(&home, list)?;
            println!("✓ Removed '{site}' from the blocklist");
        }
        BlocklistCommand::Reset => {
            update(&home, Blocklist::default_sites())?;
            println!("✓ Blocklist reset to defaults");
        }
    }
    Ok(())
}

fn update(home: &std::path::Path, list: Blocklist) -> Result<()> {
    request(
        home,
        &Request::UpdateBlocklist {
            blocklist: list.to_strings(),
        },
    )
    .map_err(|e| daemon_context(e, "update blocklist"))?;
    Ok(())
}

fn validate_domain(site: &str) -> Result<()> {
    let pattern = Regex::new(DOMAIN_PATTERN).context("domain pattern failed to compile")?;
    if !pattern.is_match(site) {
        bail!("'{site}' is not a valid domain (expected something like example.com)");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_domains_pass_validation() {
        for site in ["claude.ai", "perplexity.ai", "my-tool.dev", "abc.io"] {
            assert!(validate_domain(site).is_ok(), "{site} should be valid");
        }
    }

    #[test]
    fn malformed_domains_fail_validation() {
        for site in [
            "",
            "localhost",
            "-bad.com",
            "github.com/copilot",
            "https://claude.ai",
            "chat.openai.com",
            "a.io",
        ] {
            assert!(validate_domain(site).is_err(), "{site} should be rejected");
        }
    }
}
