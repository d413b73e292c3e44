//! Error types for the Repo Inventory core library.

use std::path::PathBuf;

/// A filter string that failed to parse or type check.
///
/// Always fatal: the inventory never falls back to an unfiltered table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Failed to evaluate filter {input:?}: {cause}")]
pub struct ExpressionError {
    /// The filter exactly as the user supplied it (before expansion).
    pub input: String,
    pub cause: String,
}

impl ExpressionError {
    pub fn new(input: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            cause: cause.into(),
        }
    }
}

/// The remote service could not be reached or returned an unusable answer.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("Request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} returned HTTP {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("Could not decode response from {url}: {message}")]
    Decode { url: String, message: String },
}

/// A single file could not be read. Never escapes the content reader.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("{path} not found")]
    NotFound { path: String },

    #[error("{path} is not valid UTF-8 text")]
    Decode { path: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),
}

/// Local cache read or write failure.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cache serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Top-level error enum for inventory operations.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error(transparent)]
    Expression(#[from] ExpressionError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Cache(#[from] CacheError),

    #[error("Invalid glob pattern {pattern:?}: {message}")]
    Pattern { pattern: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type InventoryResult<T> = Result<T, InventoryError>;
