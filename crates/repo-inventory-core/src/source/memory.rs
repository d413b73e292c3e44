//! In-memory [`RepositorySource`] and [`TreeSource`] implementations.
//!
//! Used by tests to script remote behavior: canned listings, failing
//! accounts or repositories, and per-file read failures. Both types count
//! the calls made against them so tests can assert that a code path did or
//! did not touch the "network".

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::errors::{FetchError, ReadError};
use crate::models::RepositoryRecord;

use super::{EntryKind, RemoteEntry, RepoLocation, RepositorySource, TreeSource};

/// Canned repository listings keyed by account.
#[derive(Default)]
pub struct MemoryRepositorySource {
    accounts: HashMap<String, Vec<RepositoryRecord>>,
    failure: Option<String>,
    calls: AtomicUsize,
}

impl MemoryRepositorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_account(mut self, account: &str, repos: Vec<RepositoryRecord>) -> Self {
        self.accounts.insert(account.to_string(), repos);
        self
    }

    /// Make every listing call fail with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Number of `list_repositories` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RepositorySource for MemoryRepositorySource {
    fn list_repositories(&self, account: &str) -> Result<Vec<RepositoryRecord>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let url = format!("memory://users/{}/repos", account);
        if let Some(message) = &self.failure {
            return Err(FetchError::Transport {
                url,
                message: message.clone(),
            });
        }
        self.accounts
            .get(account)
            .cloned()
            .ok_or(FetchError::Status {
                url,
                status: 404,
                body: "Not Found".to_string(),
            })
    }
}

struct StoredEntry {
    entry: RemoteEntry,
    content: Option<String>,
}

/// Canned repository trees keyed by [`RepoLocation`].
#[derive(Default)]
pub struct MemoryTreeSource {
    trees: HashMap<RepoLocation, Vec<StoredEntry>>,
    failing_trees: HashSet<RepoLocation>,
    failing_reads: HashSet<(RepoLocation, String)>,
    tree_calls: AtomicUsize,
    reads: AtomicUsize,
}

impl MemoryTreeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a text file; its size is the content's byte length.
    pub fn with_file(self, location: &RepoLocation, path: &str, content: &str) -> Self {
        let size = content.len() as u64;
        self.push(location, path, EntryKind::File, size, Some(content.to_string()))
    }

    /// Add a file with an explicit reported size and no readable content.
    pub fn with_sized_file(self, location: &RepoLocation, path: &str, size: u64) -> Self {
        self.push(location, path, EntryKind::File, size, None)
    }

    pub fn with_dir(self, location: &RepoLocation, path: &str) -> Self {
        self.push(location, path, EntryKind::Directory, 0, None)
    }

    pub fn with_submodule(self, location: &RepoLocation, path: &str) -> Self {
        self.push(location, path, EntryKind::Submodule, 0, None)
    }

    /// Make `list_tree` fail for `location`.
    pub fn with_failing_tree(mut self, location: &RepoLocation) -> Self {
        self.failing_trees.insert(location.clone());
        self
    }

    /// Make `read_text` fail for `path` at `location`.
    pub fn with_failing_read(mut self, location: &RepoLocation, path: &str) -> Self {
        self.failing_reads
            .insert((location.clone(), path.to_string()));
        self
    }

    /// Number of `list_tree` calls made so far.
    pub fn tree_calls(&self) -> usize {
        self.tree_calls.load(Ordering::SeqCst)
    }

    /// Number of `read_text` calls made so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn push(
        mut self,
        location: &RepoLocation,
        path: &str,
        kind: EntryKind,
        size: u64,
        content: Option<String>,
    ) -> Self {
        let entries = self.trees.entry(location.clone()).or_default();

        // Parent directories are listed before their children, as a remote
        // tree listing would.
        let mut parent = String::new();
        let parts: Vec<&str> = path.split('/').collect();
        for part in &parts[..parts.len().saturating_sub(1)] {
            if !parent.is_empty() {
                parent.push('/');
            }
            parent.push_str(part);
            if !entries.iter().any(|e| e.entry.path == parent) {
                entries.push(StoredEntry {
                    entry: RemoteEntry {
                        path: parent.clone(),
                        kind: EntryKind::Directory,
                        size: 0,
                    },
                    content: None,
                });
            }
        }

        entries.push(StoredEntry {
            entry: RemoteEntry {
                path: path.to_string(),
                kind,
                size,
            },
            content,
        });
        self
    }
}

impl TreeSource for MemoryTreeSource {
    fn list_tree(&self, location: &RepoLocation) -> Result<Vec<RemoteEntry>, FetchError> {
        self.tree_calls.fetch_add(1, Ordering::SeqCst);
        let url = format!("memory://{}", location);
        if self.failing_trees.contains(location) {
            return Err(FetchError::Transport {
                url,
                message: "connection reset".to_string(),
            });
        }
        match self.trees.get(location) {
            Some(entries) => Ok(entries.iter().map(|e| e.entry.clone()).collect()),
            None => Err(FetchError::Status {
                url,
                status: 404,
                body: "Not Found".to_string(),
            }),
        }
    }

    fn read_text(&self, location: &RepoLocation, path: &str) -> Result<String, ReadError> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self
            .failing_reads
            .contains(&(location.clone(), path.to_string()))
        {
            return Err(ReadError::Fetch(FetchError::Transport {
                url: format!("memory://{}/{}", location, path),
                message: "read timed out".to_string(),
            }));
        }
        self.trees
            .get(location)
            .and_then(|entries| entries.iter().find(|e| e.entry.path == path))
            .and_then(|e| e.content.clone())
            .ok_or_else(|| ReadError::NotFound {
                path: path.to_string(),
            })
    }
}
