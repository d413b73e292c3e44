//! End-to-end inventory scenarios against the in-memory sources.

use std::sync::Arc;

use repo_inventory::cache::RepositoryCache;
use repo_inventory::errors::{FetchError, InventoryError};
use repo_inventory::expr::col;
use repo_inventory::filter::{expand_shorthand, prepare, FilterInput};
use repo_inventory::models::{Record, RepositoryRecord};
use repo_inventory::source::memory::{MemoryRepositorySource, MemoryTreeSource};
use repo_inventory::source::RepoLocation;
use repo_inventory::walk::MEGABYTE;
use repo_inventory::{Inventory, RetrievalMode, WalkOptions};
use tempfile::TempDir;

fn repo(name: &str, stars: i64) -> RepositoryRecord {
    RepositoryRecord {
        name: name.to_string(),
        default_branch: "main".to_string(),
        description: format!("The {} project", name),
        archived: false,
        is_fork: name.ends_with("-fork"),
        issues: 3,
        stars,
        forks: 1,
        size: 2048,
    }
}

fn inventory(
    tmp: &TempDir,
    mode: RetrievalMode,
    repos: Arc<MemoryRepositorySource>,
    trees: Arc<MemoryTreeSource>,
) -> Inventory {
    Inventory::builder("acme")
        .mode(mode)
        .cache_dir(tmp.path())
        .repository_source(repos)
        .tree_source(trees)
        .build()
        .unwrap()
}

#[test]
fn listing_without_cache_fetches_and_persists() {
    let tmp = TempDir::new().unwrap();
    let repos = Arc::new(
        MemoryRepositorySource::new().with_account("acme", vec![repo("api", 4), repo("web", 20)]),
    );
    let mut inv = inventory(
        &tmp,
        RetrievalMode::CachePreferred,
        repos.clone(),
        Arc::new(MemoryTreeSource::new()),
    );

    let rows = inv.list_repos().unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(
        RepositoryRecord::schema()
            .iter()
            .map(|f| f.name)
            .collect::<Vec<_>>(),
        vec![
            "name",
            "default_branch",
            "description",
            "archived",
            "is_fork",
            "issues",
            "stars",
            "forks",
            "size"
        ]
    );
    assert!(tmp.path().join("acme_repos").is_file());
    assert_eq!(RepositoryCache::new(tmp.path()).read("acme"), Some(rows));
    assert_eq!(repos.calls(), 1);
}

#[test]
fn listing_with_cache_makes_no_remote_call() {
    let tmp = TempDir::new().unwrap();
    let cached = vec![repo("api", 4), repo("web", 20)];
    RepositoryCache::new(tmp.path()).write("acme", &cached).unwrap();
    let repos = Arc::new(MemoryRepositorySource::new().failing("offline"));

    let mut inv = inventory(
        &tmp,
        RetrievalMode::CachePreferred,
        repos.clone(),
        Arc::new(MemoryTreeSource::new()),
    );
    assert_eq!(inv.list_repos().unwrap(), cached);
    assert_eq!(repos.calls(), 0);
}

#[test]
fn refresh_failure_uses_cache_or_fails() {
    let tmp = TempDir::new().unwrap();
    let repos = Arc::new(MemoryRepositorySource::new().failing("offline"));

    let mut inv = inventory(
        &tmp,
        RetrievalMode::ForceRefresh,
        repos.clone(),
        Arc::new(MemoryTreeSource::new()),
    );
    assert!(matches!(
        inv.list_repos(),
        Err(InventoryError::Fetch(FetchError::Transport { .. }))
    ));

    let cached = vec![repo("api", 4)];
    RepositoryCache::new(tmp.path()).write("acme", &cached).unwrap();
    let mut inv = inventory(
        &tmp,
        RetrievalMode::ForceRefresh,
        repos.clone(),
        Arc::new(MemoryTreeSource::new()),
    );
    assert_eq!(inv.list_repos().unwrap(), cached);
    assert_eq!(repos.calls(), 2);
}

#[test]
fn shorthand_filter_keeps_matching_rows() {
    let tmp = TempDir::new().unwrap();
    let repos = Arc::new(MemoryRepositorySource::new().with_account(
        "acme",
        vec![
            repo("a", 2),
            repo("b", 11),
            repo("c", 10),
            repo("d", 99),
            repo("e", 0),
        ],
    ));
    let mut inv = Inventory::builder("acme")
        .repo_filter("{stars} > 10")
        .cache_dir(tmp.path())
        .repository_source(repos)
        .tree_source(Arc::new(MemoryTreeSource::new()))
        .build()
        .unwrap();

    let names: Vec<String> = inv.list_repos().unwrap().into_iter().map(|r| r.name).collect();
    assert_eq!(names, vec!["b", "d"]);
}

#[test]
fn preparing_filters() {
    assert_eq!(
        expand_shorthand("{name}.str.starts_with('x') & {stars} >= 3"),
        r#"col("name").str.starts_with('x') & col("stars") >= 3"#
    );
    assert_eq!(prepare(FilterInput::Absent, RepositoryRecord::schema()), Ok(None));

    let expr = col("archived").not();
    assert_eq!(
        prepare(FilterInput::from(expr.clone()), RepositoryRecord::schema()),
        Ok(Some(expr))
    );

    let err = prepare("{stars} > 'many'".into(), RepositoryRecord::schema()).unwrap_err();
    assert_eq!(err.input, "{stars} > 'many'");
    assert!(err.to_string().starts_with("Failed to evaluate filter"));
}

#[test]
fn walk_skips_large_files_and_keeps_directories() {
    let tmp = TempDir::new().unwrap();
    let loc = RepoLocation::new("acme", "data", "main");
    let trees = Arc::new(
        MemoryTreeSource::new()
            .with_sized_file(&loc, "raw/big.csv", 2 * MEGABYTE)
            .with_sized_file(&loc, "raw/small.csv", 500 * 1024),
    );
    let repos = Arc::new(MemoryRepositorySource::new().with_account("acme", vec![repo("data", 1)]));
    let mut inv = inventory(&tmp, RetrievalMode::CachePreferred, repos, trees);

    let options = WalkOptions {
        pattern: "**".to_string(),
        no_recurse: false,
        skip_larger_than_mb: Some(1),
    };
    let rows = inv.walk_file_trees(&options).unwrap();
    let paths: Vec<&str> = rows.iter().map(|r| r.file_path.as_str()).collect();
    assert_eq!(paths, vec!["raw", "raw/small.csv"]);
    assert!(rows[0].is_directory);
    assert_eq!(rows[1].file_size_bytes, 512_000);
}

#[test]
fn walk_without_recursion_stays_at_root() {
    let tmp = TempDir::new().unwrap();
    let api = RepoLocation::new("acme", "api", "main");
    let web = RepoLocation::new("acme", "web", "main");
    let trees = Arc::new(
        MemoryTreeSource::new()
            .with_file(&api, "Cargo.toml", "[package]")
            .with_file(&api, "src/main.rs", "fn main() {}")
            .with_file(&web, "web/index.html", "<p>"),
    );
    let repos = Arc::new(
        MemoryRepositorySource::new().with_account("acme", vec![repo("api", 1), repo("web", 1)]),
    );
    let mut inv = inventory(&tmp, RetrievalMode::CachePreferred, repos, trees);

    let options = WalkOptions {
        no_recurse: true,
        ..Default::default()
    };
    let rows = inv.walk_file_trees(&options).unwrap();
    let got: Vec<(String, String)> = rows
        .into_iter()
        .map(|r| (r.repository_name, r.file_path))
        .collect();
    assert_eq!(
        got,
        vec![
            ("api".to_string(), "Cargo.toml".to_string()),
            ("api".to_string(), "src".to_string()),
            ("web".to_string(), "web".to_string()),
        ]
    );
}

#[test]
fn failed_read_yields_empty_content() {
    let tmp = TempDir::new().unwrap();
    let loc = RepoLocation::new("acme", "api", "main");
    let trees = Arc::new(
        MemoryTreeSource::new()
            .with_file(&loc, "README.md", "# api\n")
            .with_file(&loc, "LICENSE", "MIT\n")
            .with_failing_read(&loc, "LICENSE"),
    );
    let repos = Arc::new(MemoryRepositorySource::new().with_account("acme", vec![repo("api", 1)]));
    let mut inv = inventory(&tmp, RetrievalMode::CachePreferred, repos, trees.clone());

    let rows = inv.read_files(&WalkOptions::default()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].content, "# api\n");
    assert_eq!(rows[1].file_path, "LICENSE");
    assert_eq!(rows[1].file_size_bytes, 4);
    assert_eq!(rows[1].content, "");
    assert_eq!(trees.reads(), 2);
}

#[test]
fn tree_filter_limits_reads() {
    let tmp = TempDir::new().unwrap();
    let loc = RepoLocation::new("acme", "api", "main");
    let trees = Arc::new(
        MemoryTreeSource::new()
            .with_file(&loc, "README.md", "# api\n")
            .with_file(&loc, "docs/guide.md", "guide")
            .with_file(&loc, "src/lib.rs", "pub fn x() {}"),
    );
    let repos = Arc::new(MemoryRepositorySource::new().with_account("acme", vec![repo("api", 1)]));
    let mut inv = Inventory::builder("acme")
        .tree_filter(r#"{file_path}.str.ends_with(".md")"#)
        .cache_dir(tmp.path())
        .repository_source(repos)
        .tree_source(trees.clone())
        .build()
        .unwrap();

    let rows = inv.read_files(&WalkOptions::default()).unwrap();
    let contents: Vec<&str> = rows.iter().map(|r| r.content.as_str()).collect();
    assert_eq!(contents, vec!["# api\n", "guide"]);
    assert_eq!(trees.reads(), 2);
}

#[test]
fn empty_walk_reads_nothing() {
    let tmp = TempDir::new().unwrap();
    let repos = Arc::new(MemoryRepositorySource::new().with_account("acme", vec![]));
    let trees = Arc::new(MemoryTreeSource::new());
    let mut inv = inventory(&tmp, RetrievalMode::CachePreferred, repos, trees.clone());

    assert!(inv.read_files(&WalkOptions::default()).unwrap().is_empty());
    assert_eq!(trees.tree_calls(), 0);
    assert_eq!(trees.reads(), 0);
}
