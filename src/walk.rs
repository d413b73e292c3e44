//! Tree walker.
//!
//! Enumerates the tree of every repository in a table at its default
//! branch, through a [`RepoFs`] handle scoped to one repository. Entries are
//! matched against a glob, size filtered, and turned into
//! [`FileEntryRecord`] rows in the order the remote listing returns them.

use globset::{GlobBuilder, GlobMatcher};
use tracing::debug;

use crate::errors::{InventoryError, InventoryResult, ReadError};
use crate::expr::Expr;
use crate::models::{FileEntryRecord, RepositoryRecord};
use crate::source::{RemoteEntry, RepoLocation, TreeSource};

pub const MEGABYTE: u64 = 1_048_576;

/// Parameters shared by the tree walker and the content reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkOptions {
    /// Glob matched against root-relative paths. `*` stays within one path
    /// component; `**` crosses any number of them.
    pub pattern: String,
    /// Only list entries at the repository root. Overrides `pattern`.
    pub no_recurse: bool,
    /// Exclude files larger than this many megabytes.
    pub skip_larger_than_mb: Option<u64>,
}

impl Default for WalkOptions {
    fn default() -> Self {
        Self {
            pattern: "**".to_string(),
            no_recurse: false,
            skip_larger_than_mb: None,
        }
    }
}

impl WalkOptions {
    pub fn effective_pattern(&self) -> &str {
        if self.no_recurse {
            "*"
        } else {
            &self.pattern
        }
    }

    /// Size ceiling in bytes, if any.
    pub fn size_limit(&self) -> Option<u64> {
        self.skip_larger_than_mb.map(|mb| mb.saturating_mul(MEGABYTE))
    }
}

/// Compile a glob where `*` does not match `/`.
pub fn compile_pattern(pattern: &str) -> InventoryResult<GlobMatcher> {
    GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|g| g.compile_matcher())
        .map_err(|e| InventoryError::Pattern {
            pattern: pattern.to_string(),
            message: e.to_string(),
        })
}

/// A read-only view of one repository tree at one branch.
pub struct RepoFs<'a> {
    source: &'a dyn TreeSource,
    location: RepoLocation,
}

impl<'a> RepoFs<'a> {
    pub fn open(source: &'a dyn TreeSource, location: RepoLocation) -> Self {
        Self { source, location }
    }

    pub fn location(&self) -> &RepoLocation {
        &self.location
    }

    /// Entries whose path matches `matcher`, in listing order.
    pub fn glob(&self, matcher: &GlobMatcher) -> InventoryResult<Vec<RemoteEntry>> {
        let entries = self.source.list_tree(&self.location)?;
        Ok(entries
            .into_iter()
            .filter(|e| matcher.is_match(e.path.trim_start_matches('/')))
            .collect())
    }

    pub fn read_text(&self, path: &str) -> Result<String, ReadError> {
        self.source.read_text(&self.location, path)
    }
}

/// Walk every repository in `repos` and return one row per retained entry.
///
/// A failing tree listing aborts the whole walk.
pub fn walk_trees(
    source: &dyn TreeSource,
    account: &str,
    repos: &[RepositoryRecord],
    options: &WalkOptions,
    tree_filter: Option<&Expr>,
) -> InventoryResult<Vec<FileEntryRecord>> {
    let matcher = compile_pattern(options.effective_pattern())?;
    let limit = options.size_limit();
    let mut rows = Vec::new();

    for repo in repos {
        let fs = RepoFs::open(
            source,
            RepoLocation::new(account, &repo.name, &repo.default_branch),
        );
        let before = rows.len();

        for entry in fs.glob(&matcher)? {
            let is_directory = entry.is_directory();
            if !is_directory {
                if let Some(limit) = limit {
                    if entry.size > limit {
                        debug!("Skipping {} ({} bytes)", entry.path, entry.size);
                        continue;
                    }
                }
            }
            rows.push(FileEntryRecord {
                repository_name: repo.name.clone(),
                file_path: entry.path.trim_start_matches('/').to_string(),
                is_directory,
                file_size_bytes: if is_directory {
                    0
                } else {
                    i64::try_from(entry.size).unwrap_or(i64::MAX)
                },
            });
        }

        debug!("{}: {} entries", fs.location(), rows.len() - before);
    }

    Ok(crate::filter::apply(rows, tree_filter))
}
