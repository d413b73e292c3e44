//! Retrieval manager and the inventory entry point.
//!
//! An [`Inventory`] is bound to one account. It holds the prepared filters,
//! the retrieval policy, the repository cache and the two remote sources,
//! and exposes the three table-producing operations:
//!
//! | Operation | Produces |
//! |-----------|----------|
//! | [`Inventory::list_repos`] | filtered [`RepositoryRecord`] table |
//! | [`Inventory::walk_file_trees`] | [`FileEntryRecord`] rows for every repository |
//! | [`Inventory::read_files`] | [`FileContentRecord`] rows with file text |
//!
//! The repository table is loaded once per inventory and reused by the
//! walker and reader.
//!
//! # Retrieval policy
//!
//! - [`RetrievalMode::CachePreferred`]: use the cached listing when one
//!   exists; otherwise fetch and persist.
//! - [`RetrievalMode::ForceRefresh`]: always fetch and persist; if the fetch
//!   fails, fall back to the cached listing, and fail only when there is
//!   none.
//!
//! A cache write failure is logged and never fails the call.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::cache::RepositoryCache;
use crate::errors::{InventoryError, InventoryResult};
use crate::expr::Expr;
use crate::extract::read_contents;
use crate::filter::{self, FilterInput};
use crate::models::{FileContentRecord, FileEntryRecord, Record, RepositoryRecord};
use crate::source::{RepositorySource, TreeSource};
use crate::walk::{walk_trees, WalkOptions};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RetrievalMode {
    #[default]
    CachePreferred,
    ForceRefresh,
}

/// Builder for [`Inventory`]. Filters are prepared in [`build`](Self::build),
/// so a malformed filter fails before any remote call.
pub struct InventoryBuilder {
    account: String,
    repo_filter: FilterInput,
    tree_filter: FilterInput,
    mode: RetrievalMode,
    cache_dir: Option<PathBuf>,
    repositories: Option<Arc<dyn RepositorySource>>,
    trees: Option<Arc<dyn TreeSource>>,
}

impl InventoryBuilder {
    pub fn repo_filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.repo_filter = filter.into();
        self
    }

    /// Filter applied to walker rows, before any content is read.
    pub fn tree_filter(mut self, filter: impl Into<FilterInput>) -> Self {
        self.tree_filter = filter.into();
        self
    }

    pub fn mode(mut self, mode: RetrievalMode) -> Self {
        self.mode = mode;
        self
    }

    /// Cache directory; defaults to the per-user cache directory.
    pub fn cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    pub fn repository_source(mut self, source: Arc<dyn RepositorySource>) -> Self {
        self.repositories = Some(source);
        self
    }

    pub fn tree_source(mut self, source: Arc<dyn TreeSource>) -> Self {
        self.trees = Some(source);
        self
    }

    pub fn build(self) -> InventoryResult<Inventory> {
        validate_account(&self.account)?;

        let repo_filter = filter::prepare(self.repo_filter, RepositoryRecord::schema())?;
        let tree_filter = filter::prepare(self.tree_filter, FileEntryRecord::schema())?;

        let cache_dir = match self.cache_dir {
            Some(dir) => dir,
            None => RepositoryCache::default_dir().ok_or_else(|| {
                InventoryError::Config("could not determine a user cache directory".to_string())
            })?,
        };
        let repositories = self.repositories.ok_or_else(|| {
            InventoryError::Config("no repository source configured".to_string())
        })?;
        let trees = self
            .trees
            .ok_or_else(|| InventoryError::Config("no tree source configured".to_string()))?;

        Ok(Inventory {
            account: self.account,
            repo_filter,
            tree_filter,
            mode: self.mode,
            cache: RepositoryCache::new(cache_dir),
            repositories,
            trees,
            table: None,
        })
    }
}

/// The account name becomes part of a cache file name and of API paths.
fn validate_account(account: &str) -> InventoryResult<()> {
    if account.trim().is_empty() {
        return Err(InventoryError::Config("account must not be empty".to_string()));
    }
    if account.contains(['/', '\\']) || account.contains("..") {
        return Err(InventoryError::Config(format!(
            "invalid account name '{}'",
            account
        )));
    }
    Ok(())
}

pub struct Inventory {
    account: String,
    repo_filter: Option<Expr>,
    tree_filter: Option<Expr>,
    mode: RetrievalMode,
    cache: RepositoryCache,
    repositories: Arc<dyn RepositorySource>,
    trees: Arc<dyn TreeSource>,
    table: Option<Vec<RepositoryRecord>>,
}

impl Inventory {
    pub fn builder(account: impl Into<String>) -> InventoryBuilder {
        InventoryBuilder {
            account: account.into(),
            repo_filter: FilterInput::Absent,
            tree_filter: FilterInput::Absent,
            mode: RetrievalMode::default(),
            cache_dir: None,
            repositories: None,
            trees: None,
        }
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn mode(&self) -> RetrievalMode {
        self.mode
    }

    pub fn cache(&self) -> &RepositoryCache {
        &self.cache
    }

    /// Retrieve the repository listing, apply the repository filter and keep
    /// the result as this inventory's table.
    pub fn list_repos(&mut self) -> InventoryResult<Vec<RepositoryRecord>> {
        let records = self.retrieve()?;
        let table = filter::apply(records, self.repo_filter.as_ref());
        debug!("{} repositories after filtering", table.len());
        self.table = Some(table.clone());
        Ok(table)
    }

    /// The held repository table, loading it first if needed.
    pub fn repos(&mut self) -> InventoryResult<&[RepositoryRecord]> {
        if self.table.is_none() {
            self.list_repos()?;
        }
        Ok(self.table.as_deref().unwrap_or_default())
    }

    pub fn walk_file_trees(&mut self, options: &WalkOptions) -> InventoryResult<Vec<FileEntryRecord>> {
        self.repos()?;
        let repos = self.table.as_deref().unwrap_or_default();
        walk_trees(
            &*self.trees,
            &self.account,
            repos,
            options,
            self.tree_filter.as_ref(),
        )
    }

    pub fn read_files(&mut self, options: &WalkOptions) -> InventoryResult<Vec<FileContentRecord>> {
        let entries = self.walk_file_trees(options)?;
        let repos = self.table.as_deref().unwrap_or_default();
        Ok(read_contents(&*self.trees, &self.account, repos, entries))
    }

    fn retrieve(&self) -> InventoryResult<Vec<RepositoryRecord>> {
        match self.mode {
            RetrievalMode::CachePreferred => {
                if let Some(cached) = self.cache.read(&self.account) {
                    debug!("Using cached listing for {}", self.account);
                    return Ok(cached);
                }
                let fetched = self.repositories.list_repositories(&self.account)?;
                self.persist(&fetched);
                Ok(fetched)
            }
            RetrievalMode::ForceRefresh => {
                match self.repositories.list_repositories(&self.account) {
                    Ok(fetched) => {
                        self.persist(&fetched);
                        Ok(fetched)
                    }
                    Err(e) => match self.cache.read(&self.account) {
                        Some(cached) => {
                            warn!(
                                "Fetching repositories for {} failed ({}); using cached listing",
                                self.account, e
                            );
                            Ok(cached)
                        }
                        None => Err(e.into()),
                    },
                }
            }
        }
    }

    fn persist(&self, records: &[RepositoryRecord]) {
        if let Err(e) = self.cache.write(&self.account, records) {
            warn!("Failed to write cache for {}: {}", self.account, e);
        }
    }
}
