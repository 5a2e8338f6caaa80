use aifree_core::Blocklist;
use aifree_sync::{
    engine::rules_path_at, BlockingEngine, FileEngine, RuleSynchronizer, SyncOutcome, SyncStage,
};
use tempfile::TempDir;

#[test]
fn enable_writes_engine_shaped_rule_file() {
    let home = TempDir::new().expect("home");
    let mut sync = RuleSynchronizer::new(FileEngine::at_home(home.path()));

    let outcome = sync.enable(&Blocklist::from_entries(["claude.ai", "github.com/copilot"]));
    assert_eq!(outcome, SyncOutcome::Applied { removed: 0, added: 2 });

    let raw = std::fs::read_to_string(rules_path_at(home.path())).expect("rules file");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("rules json");
    assert_eq!(json[0]["condition"]["urlFilter"], "*://claude.ai/*");
    assert_eq!(json[1]["condition"]["urlFilter"], "*://github.com/copilot*");
    assert_eq!(json[1]["condition"]["resourceTypes"][0], "main_frame");
    assert_eq!(json[1]["action"]["type"], "block");
}

#[test]
fn blocklist_edit_leaves_no_stale_filters() {
    let home = TempDir::new().expect("home");
    let mut sync = RuleSynchronizer::new(FileEngine::at_home(home.path()));

    sync.enable(&Blocklist::from_entries(["claude.ai", "poe.com", "chatgpt.com"]));
    sync.enable(&Blocklist::from_entries(["poe.com"]));

    let rules = FileEngine::at_home(home.path()).list_rules().expect("list");
    assert_eq!(rules.len(), 1);
    assert_eq!(rules[0].id, 1);
    assert_eq!(rules[0].condition.url_filter.as_str(), "*://poe.com/*");
}

#[test]
fn disable_after_enable_empties_rule_file() {
    let home = TempDir::new().expect("home");
    let mut sync = RuleSynchronizer::new(FileEngine::at_home(home.path()));

    sync.enable(&Blocklist::default_sites());
    assert_eq!(sync.disable(), SyncOutcome::Cleared { removed: 10 });
    assert!(sync.engine().list_rules().expect("list").is_empty());
}

#[test]
fn unreadable_rule_file_fails_at_fetch_without_panicking() {
    let home = TempDir::new().expect("home");
    let path = rules_path_at(home.path());
    std::fs::create_dir_all(path.parent().expect("parent")).expect("mkdir");
    std::fs::write(&path, "not json at all").expect("write");

    let mut sync = RuleSynchronizer::new(FileEngine::new(&path));
    let outcome = sync.enable(&Blocklist::from_entries(["claude.ai"]));
    assert!(
        matches!(outcome, SyncOutcome::Failed { stage: SyncStage::Fetch, .. }),
        "got {outcome:?}"
    );
}
