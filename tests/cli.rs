//! Runs the `rinv` binary against a temporary cache directory.
//!
//! The API URL points at a closed local port, so every remote call fails
//! and the tests exercise the cache and error paths only.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use repo_inventory::cache::RepositoryCache;
use repo_inventory::models::RepositoryRecord;
use tempfile::TempDir;

const UNREACHABLE_API: &str = "http://127.0.0.1:9";

fn rinv_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("rinv");
    path
}

fn repo(name: &str, stars: i64) -> RepositoryRecord {
    RepositoryRecord {
        name: name.to_string(),
        default_branch: "main".to_string(),
        description: format!("{} service", name),
        archived: false,
        is_fork: false,
        issues: 0,
        stars,
        forks: 0,
        size: 100,
    }
}

fn setup(with_cache: bool) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("config.toml"), "[github]\nauth_helper = false\n").unwrap();
    if with_cache {
        RepositoryCache::new(tmp.path().join("cache"))
            .write("acme", &[repo("api", 4), repo("web", 25)])
            .unwrap();
    }
    tmp
}

fn run(root: &Path, args: &[&str]) -> Output {
    Command::new(rinv_binary())
        .arg("acme")
        .args(["--config", root.join("config.toml").to_str().unwrap()])
        .args(["--cache-dir", root.join("cache").to_str().unwrap()])
        .args(["--api-url", UNREACHABLE_API])
        .args(["--token", "test-token"])
        .args(args)
        .env_remove("RUST_LOG")
        .output()
        .expect("failed to run rinv")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn cached_listing_is_printed_without_network() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["-o", "json"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let rows: Vec<RepositoryRecord> = serde_json::from_str(&stdout(&output)).unwrap();
    assert_eq!(rows, vec![repo("api", 4), repo("web", 25)]);
}

#[test]
fn refresh_falls_back_to_cache() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["--refresh", "-o", "ndjson"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert_eq!(stdout(&output).lines().count(), 2);
    assert!(stderr(&output).contains("using cached listing"));
}

#[test]
fn refresh_without_cache_fails() {
    let tmp = setup(false);
    let output = run(tmp.path(), &["--no-cache"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).is_empty());
    assert!(stderr(&output).contains("Error: "));
}

#[test]
fn filter_and_csv_output() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["-f", "{stars} > 10", "-o", "csv"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let out = stdout(&output);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("name,default_branch,"));
    assert!(lines[1].starts_with("web,main,web service,"));
}

#[test]
fn table_output_has_shape() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["-s"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(stdout(&output).starts_with("shape: (2, 9)\n"));
}

#[test]
fn bad_filter_is_fatal() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["-f", "{stars} >> 10"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Error: Failed to evaluate filter"));
}

#[test]
fn walk_failure_is_fatal() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["--walk"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("Failed to walk file trees for acme"));
}

#[test]
fn invalid_config_is_reported() {
    let tmp = setup(true);
    fs::write(tmp.path().join("config.toml"), "[github]\ntimeout_secs = 0\n").unwrap();
    let output = run(tmp.path(), &[]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("timeout_secs"));
}

#[test]
fn output_format_long_alias() {
    let tmp = setup(true);
    let output = run(tmp.path(), &["--output-format", "ndjson"]);
    assert!(output.status.success(), "stderr: {}", stderr(&output));

    let rows: Vec<RepositoryRecord> = stdout(&output)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(rows, vec![repo("api", 4), repo("web", 25)]);
}
