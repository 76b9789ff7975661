// src/error.rs

use thiserror::Error;

/// Core error types for pkgcore
#[derive(Error, Debug)]
pub enum Error {
    /// A handle was used after the `Base` that issued it was dropped
    #[error("Invalid handle to {0}: the owning base no longer exists")]
    Invalidated(&'static str),

    /// The subsystem behind a handle is already borrowed incompatibly
    #[error("{0} is already borrowed")]
    Busy(&'static str),

    /// Lookup miss (variable, repository, ...)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Repository identifier already taken
    #[error("Repository '{0}' already exists")]
    DuplicateId(String),

    /// Repository already loaded; configuration is frozen
    #[error("Repository '{0}' is already loaded")]
    AlreadyLoaded(String),

    /// Repository metadata has not been loaded yet
    #[error("Repository '{0}' is not loaded")]
    NotLoaded(String),

    /// The system repository can only be created once per package registry
    #[error("System repository already exists")]
    SystemRepoExists,

    /// Metadata acquisition for a repository failed
    #[error("Failed to load repository '{repo_id}': {source}")]
    RepoLoad {
        repo_id: String,
        #[source]
        source: Box<Error>,
    },

    /// Comparison operator not applicable to the filter
    #[error("Comparison {cmp:?} is not supported by {filter}")]
    UnsupportedCmp {
        filter: &'static str,
        cmp: crate::query::QueryCmp,
    },

    /// Glob or regular expression failed to compile
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),

    /// Missing or malformed configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Metadata source the loader cannot handle
    #[error("Unsupported metadata source: {0}")]
    UnsupportedSource(String),

    /// Metadata parsing failure
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Metadata checksum verification failure
    #[error("Checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON index errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Whether this error reports use of a handle after its base was dropped
    pub fn is_invalidated(&self) -> bool {
        matches!(self, Error::Invalidated(_))
    }
}

/// Result type alias using pkgcore's Error type
pub type Result<T> = std::result::Result<T, Error>;
