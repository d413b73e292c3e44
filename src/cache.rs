//! Per-account repository cache.
//!
//! One file per account, `<dir>/<account>_repos`, holding one JSON-encoded
//! [`RepositoryRecord`] per line. Only the repository listing is cached;
//! trees and file contents are always fetched live.
//!
//! A missing or unparsable file reads as "no cache". Writes go to a sibling
//! temporary file that is renamed into place, so a concurrent reader sees
//! either the old or the new listing. There is no cross-process locking.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::errors::CacheError;
use crate::models::RepositoryRecord;

#[derive(Debug, Clone)]
pub struct RepositoryCache {
    dir: PathBuf,
}

impl RepositoryCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<user cache dir>/repo-inventory`, if the platform has one.
    pub fn default_dir() -> Option<PathBuf> {
        dirs::cache_dir().map(|d| d.join(crate::APP_NAME))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, account: &str) -> PathBuf {
        self.dir.join(format!("{}_repos", account))
    }

    /// Load the cached listing for `account`.
    pub fn read(&self, account: &str) -> Option<Vec<RepositoryRecord>> {
        let path = self.path_for(account);
        if !path.is_file() {
            debug!("No cache at {}", path.display());
            return None;
        }

        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) => {
                warn!("Ignoring unreadable cache {}: {}", path.display(), e);
                return None;
            }
        };

        let mut records = Vec::new();
        for (lineno, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<RepositoryRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(
                        "Ignoring corrupt cache {} (line {}): {}",
                        path.display(),
                        lineno + 1,
                        e
                    );
                    return None;
                }
            }
        }

        debug!("Loaded {} repositories from {}", records.len(), path.display());
        Some(records)
    }

    /// Persist the listing for `account`, replacing any previous one.
    pub fn write(&self, account: &str, records: &[RepositoryRecord]) -> Result<(), CacheError> {
        fs::create_dir_all(&self.dir).map_err(|source| CacheError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut body = String::new();
        for record in records {
            body.push_str(&serde_json::to_string(record)?);
            body.push('\n');
        }

        let path = self.path_for(account);
        let tmp = self
            .dir
            .join(format!("{}_repos.tmp.{}", account, std::process::id()));
        fs::write(&tmp, body).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, &path).map_err(|source| {
            let _ = fs::remove_file(&tmp);
            CacheError::Io {
                path: path.clone(),
                source,
            }
        })?;

        debug!("Cached {} repositories at {}", records.len(), path.display());
        Ok(())
    }
}
