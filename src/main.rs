//! # Repo Inventory CLI (`rinv`)
//!
//! Prints one of three tables for a GitHub account:
//!
//! | Invocation | Table |
//! |------------|-------|
//! | `rinv <account>` | repositories |
//! | `rinv <account> --walk` | file tree entries of every repository |
//! | `rinv <account> --extract` | file tree entries with file contents |
//!
//! ## Examples
//!
//! ```bash
//! # Repositories with more than 10 stars, as CSV
//! rinv acme -f '{stars} > 10' -o csv
//!
//! # Root-level entries only, abridged table
//! rinv acme -w --no-recurse -s
//!
//! # Contents of every Cargo.toml under 1 MB, bypassing the cache
//! rinv acme -x --pattern '**/Cargo.toml' --max-size-mb 1 --refresh -o ndjson
//! ```
//!
//! Results go to stdout; logs go to stderr (`-v` or `RUST_LOG` for more).
//! Any failure prints `Error: <message>` and exits with status 1.

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use repo_inventory::config::{self, Config};
use repo_inventory::github::GitHubClient;
use repo_inventory::output::{render, OutputFormat, TableLimits};
use repo_inventory::{Inventory, RetrievalMode, WalkOptions};

/// Repo Inventory: tabular views of a GitHub account's repositories,
/// file trees and file contents.
#[derive(Parser)]
#[command(
    name = "rinv",
    version,
    about = "Inventory a GitHub account's repositories, file trees and file contents",
    long_about = "Lists the repositories of a GitHub account (cached locally), walks their \
    file trees at the default branch, and optionally reads file contents, printing the result \
    as a table, CSV, JSON or NDJSON. Filters use `{column}` shorthand, e.g. '{stars} > 10'."
)]
struct Cli {
    /// GitHub user or organization.
    account: String,

    /// Walk file trees instead of listing repositories.
    #[arg(short = 'w', long)]
    walk: bool,

    /// Walk file trees and read the content of every file.
    #[arg(short = 'x', long)]
    extract: bool,

    /// Output format.
    #[arg(
        short = 'o',
        long,
        alias = "output-format",
        value_enum,
        default_value_t = OutputFormat::Table
    )]
    output: OutputFormat,

    /// Maximum columns shown in table output (-1 for all).
    #[arg(short = 'c', long, default_value_t = -1, allow_negative_numbers = true)]
    cols: i64,

    /// Maximum rows shown in table output (-1 for all).
    #[arg(short = 'r', long, default_value_t = -1, allow_negative_numbers = true)]
    rows: i64,

    /// Abridged table output; overrides --rows and --cols.
    #[arg(short = 's', long)]
    short: bool,

    /// Repository filter, e.g. '{stars} > 10 & ~{archived}'.
    #[arg(short = 'f', long)]
    filter: Option<String>,

    /// Filter on tree entries, e.g. '{file_path}.str.ends_with(".md")'.
    #[arg(long)]
    tree_filter: Option<String>,

    /// Glob matched against paths inside each repository.
    #[arg(long, default_value = "**")]
    pattern: String,

    /// Only list entries at the repository root.
    #[arg(long)]
    no_recurse: bool,

    /// Skip files larger than this many megabytes.
    #[arg(long, value_name = "MB")]
    max_size_mb: Option<u64>,

    /// Fetch the repository listing even when a cache exists.
    #[arg(long)]
    refresh: bool,

    /// Same as --refresh; also settable as `[cache] enabled = false`.
    #[arg(long)]
    no_cache: bool,

    /// Cache directory (overrides `[cache] dir`).
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// GitHub API base URL (overrides `[github] api_url`).
    #[arg(long)]
    api_url: Option<String>,

    /// GitHub token (overrides `[github] token` and GITHUB_TOKEN).
    #[arg(long)]
    token: Option<String>,

    /// Path to configuration file (TOML).
    ///
    /// Defaults to `<config dir>/repo-inventory/config.toml` when present.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Debug logging on stderr.
    #[arg(short = 'v', long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "warn,repo_inventory=debug,repo_inventory_core=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(cli: &Cli) -> Result<Config> {
    let mut cfg = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => match config::default_config_path() {
            Some(path) if path.is_file() => config::load_config(&path)?,
            _ => Config::default(),
        },
    };

    if let Some(url) = &cli.api_url {
        cfg.github.api_url = url.clone();
    }
    if let Some(token) = &cli.token {
        cfg.github.token = Some(token.clone());
    }
    if let Some(dir) = &cli.cache_dir {
        cfg.cache.dir = Some(dir.clone());
    }
    if cli.no_cache {
        cfg.cache.enabled = false;
    }

    config::validate(&cfg)?;
    Ok(cfg)
}

fn run(cli: Cli) -> Result<()> {
    let cfg = load(&cli)?;

    let token = config::resolve_token(cfg.github.token.clone(), cfg.github.auth_helper);
    let client = Arc::new(GitHubClient::new(
        &cfg.github.api_url,
        token,
        Duration::from_secs(cfg.github.timeout_secs),
    )?);

    let mode = if cfg.cache.enabled && !cli.refresh {
        RetrievalMode::CachePreferred
    } else {
        RetrievalMode::ForceRefresh
    };

    let mut inventory = Inventory::builder(cli.account.as_str())
        .repo_filter(cli.filter)
        .tree_filter(cli.tree_filter)
        .mode(mode)
        .cache_dir(cfg.cache.resolve_dir()?)
        .repository_source(client.clone())
        .tree_source(client)
        .build()?;

    let limits = TableLimits::from_cli(cli.rows, cli.cols, cli.short);
    let options = WalkOptions {
        pattern: cli.pattern,
        no_recurse: cli.no_recurse,
        skip_larger_than_mb: cli.max_size_mb,
    };

    let rendered = if cli.extract {
        let rows = inventory
            .read_files(&options)
            .with_context(|| format!("Failed to read files for {}", cli.account))?;
        render(&rows, cli.output, limits)?
    } else if cli.walk {
        let rows = inventory
            .walk_file_trees(&options)
            .with_context(|| format!("Failed to walk file trees for {}", cli.account))?;
        render(&rows, cli.output, limits)?
    } else {
        let rows = inventory.list_repos()?;
        render(&rows, cli.output, limits)?
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(rendered.as_bytes())?;
    stdout.flush()?;
    Ok(())
}
