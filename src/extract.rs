//! Content reader.
//!
//! Reads the text of every file row produced by the tree walker. A failed
//! read never aborts the batch: the row is kept with empty content and the
//! failure is logged.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::models::{FileContentRecord, FileEntryRecord, RepositoryRecord};
use crate::source::{RepoLocation, TreeSource};
use crate::walk::RepoFs;

/// Attach content to `entries`. Directories get `""` without a read.
pub fn read_contents(
    source: &dyn TreeSource,
    account: &str,
    repos: &[RepositoryRecord],
    entries: Vec<FileEntryRecord>,
) -> Vec<FileContentRecord> {
    if entries.is_empty() {
        return Vec::new();
    }

    let branches: HashMap<&str, &str> = repos
        .iter()
        .map(|r| (r.name.as_str(), r.default_branch.as_str()))
        .collect();

    let mut rows = Vec::with_capacity(entries.len());
    let mut failures = 0usize;

    for entry in entries {
        if entry.is_directory {
            rows.push(FileContentRecord::new(entry, String::new()));
            continue;
        }

        let branch = branches
            .get(entry.repository_name.as_str())
            .copied()
            .unwrap_or("main");
        let fs = RepoFs::open(
            source,
            RepoLocation::new(account, &entry.repository_name, branch),
        );

        let content = match fs.read_text(&entry.file_path) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    "Failed to read {}/{}: {}",
                    entry.repository_name, entry.file_path, e
                );
                failures += 1;
                String::new()
            }
        };
        rows.push(FileContentRecord::new(entry, content));
    }

    debug!("Read {} rows ({} failed)", rows.len(), failures);
    rows
}
