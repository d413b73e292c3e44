//! Remote source abstraction for Repo Inventory.
//!
//! Two traits describe everything the inventory needs from the outside
//! world:
//!
//! | Trait | Purpose |
//! |-------|---------|
//! | [`RepositorySource`] | List an account's repositories |
//! | [`TreeSource`] | Enumerate and read a repository tree at a branch |
//!
//! The root crate implements both on top of the GitHub REST API; the
//! [`memory`] module provides in-process implementations for tests.
//!
//! All calls are blocking and are made one at a time by the inventory.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::errors::{FetchError, ReadError};
use crate::models::RepositoryRecord;

/// Addresses one repository tree: `(account, repository, branch)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepoLocation {
    pub account: String,
    pub repository: String,
    pub branch: String,
}

impl RepoLocation {
    pub fn new(
        account: impl Into<String>,
        repository: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self {
            account: account.into(),
            repository: repository.into(),
            branch: branch.into(),
        }
    }
}

impl std::fmt::Display for RepoLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}@{}", self.account, self.repository, self.branch)
    }
}

/// Kind of an entry in a remote tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    /// A nested repository reference. Listed like a directory, never read.
    Submodule,
}

/// One entry of a remote tree listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Path relative to the repository root, `/`-separated, no leading slash.
    pub path: String,
    pub kind: EntryKind,
    /// Byte size for files; 0 otherwise.
    pub size: u64,
}

impl RemoteEntry {
    pub fn is_directory(&self) -> bool {
        !matches!(self.kind, EntryKind::File)
    }
}

/// The remote repository-listing service.
pub trait RepositorySource: Send + Sync {
    /// List the public repositories of `account`, in service order.
    fn list_repositories(&self, account: &str) -> Result<Vec<RepositoryRecord>, FetchError>;
}

/// A browsable, readable view of repository trees without a local checkout.
pub trait TreeSource: Send + Sync {
    /// Every entry of the tree at `location`, at all depths, in the
    /// enumeration order of the remote listing.
    fn list_tree(&self, location: &RepoLocation) -> Result<Vec<RemoteEntry>, FetchError>;

    /// Full text of the file at `path` (relative to the repository root).
    fn read_text(&self, location: &RepoLocation, path: &str) -> Result<String, ReadError>;
}
