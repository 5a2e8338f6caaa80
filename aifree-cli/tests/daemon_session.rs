use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread::sleep;
use std::time::{Duration, Instant};

use tempfile::TempDir;

fn aifree_bin_path() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_aifree"))
}

struct DaemonProcess {
    child: Child,
    binary: PathBuf,
    home: PathBuf,
}

impl DaemonProcess {
    fn start(binary: PathBuf, home: PathBuf) -> Self {
        let child = Command::new(&binary)
            .env("HOME", &home)
            .env("USERPROFILE", &home)
            .args(["daemon", "start"])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn daemon");

        Self {
            child,
            binary,
            home,
        }
    }

    fn stop(&mut self) {
        let _ = Command::new(&self.binary)
            .env("HOME", &self.home)
            .env("USERPROFILE", &self.home)
            .args(["daemon", "stop"])
            .status();

        let deadline = Instant::now() + Duration::from_secs(2);
        while Instant::now() < deadline {
            if let Ok(Some(_)) = self.child.try_wait() {
                return;
            }
            sleep(Duration::from_millis(50));
        }

        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

impl Drop for DaemonProcess {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run(binary: &Path, home: &Path, args: &[&str]) -> Output {
    Command::new(binary)
        .env("HOME", home)
        .env("USERPROFILE", home)
        .args(args)
        .output()
        .expect("run aifree")
}

fn run_ok(binary: &Path, home: &Path, args: &[&str]) -> String {
    let output = run(binary, home, args);
    assert!(
        output.status.success(),
        "`aifree {}` failed: {}",
        args.join(" "),
        String::from_utf8_lossy(&output.stderr),
    );
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn status_json(binary: &Path, home: &Path) -> Option<serde_json::Value> {
    let output = run(binary, home, &["status", "--json"]);
    if !output.status.success() {
        return None;
    }
    serde_json::from_slice(&output.stdout).ok()
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        sleep(Duration::from_millis(100));
    }
    false
}

#[test]
fn session_lifecycle_through_the_cli() {
    let home = TempDir::new().expect("home");
    let binary = aifree_bin_path();
    let mut daemon = DaemonProcess::start(binary.clone(), home.path().to_path_buf());
    assert!(
        wait_until(Duration::from_secs(5), || status_json(&binary, home.path())
            .is_some()),
        "daemon did not answer status in time",
    );

    let initial = status_json(&binary, home.path()).expect("status");
    assert_eq!(initial["isBlocking"], false);
    assert_eq!(initial["timer"], "00:00:00");
    assert_eq!(initial["totalSessions"], 0);

    let list = run_ok(&binary, home.path(), &["blocklist", "list"]);
    assert!(list.contains("claude.ai"), "default blocklist seeded: {list}");
    assert!(list.contains("github.com/copilot"));

    run_ok(&binary, home.path(), &["blocklist", "add", "perplexity.ai"]);
    let duplicate = run(&binary, home.path(), &["blocklist", "add", "perplexity.ai"]);
    assert!(!duplicate.status.success(), "duplicate add must fail");
    assert!(String::from_utf8_lossy(&duplicate.stderr).contains("already in the blocklist"));

    run_ok(&binary, home.path(), &["start"]);
    let active = status_json(&binary, home.path()).expect("status");
    assert_eq!(active["isBlocking"], true);

    let check = run_ok(&binary, home.path(), &["check", "https://perplexity.ai/search"]);
    assert!(check.contains("blocked"), "added site is enforced: {check}");

    let again = run_ok(&binary, home.path(), &["start"]);
    assert!(again.contains("already running"));

    run_ok(&binary, home.path(), &["stop"]);
    let idle = status_json(&binary, home.path()).expect("status");
    assert_eq!(idle["isBlocking"], false);
    assert_eq!(idle["totalSessions"], 1);
    assert_eq!(idle["todaySessions"], 1);

    let rules = run_ok(&binary, home.path(), &["rules"]);
    assert!(rules.contains("no blocking rules active"));

    let export_path = home.path().join("history.json");
    run_ok(
        &binary,
        home.path(),
        &["logs", "export", "--output", export_path.to_str().expect("utf8 path")],
    );
    let exported: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&export_path).expect("export file"))
            .expect("export json");
    assert_eq!(exported.as_array().expect("array").len(), 1);
    assert!(exported[0]["duration_min"].is_u64());

    run_ok(&binary, home.path(), &["logs", "clear", "--yes"]);
    let logs = run_ok(&binary, home.path(), &["logs", "list"]);
    assert!(logs.contains("No sessions recorded yet"));

    daemon.stop();
}
