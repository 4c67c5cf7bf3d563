use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by the cache engine and by codecs.
///
/// Every variant is fatal to the operation that produced it; the engine never
/// retries. A stale or incompatible cache is *not* an error: it is reported as
/// `false` from [`CacheStore::initialize`](crate::CacheStore::initialize).
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("a value of type {expected} was not found for field '{field}'")]
    InvalidType {
        field: String,
        expected: &'static str,
    },

    #[error("{description} cannot be null")]
    NullValue { description: &'static str },

    #[error("cache entry for key '{key}' does not exist")]
    NonexistentEntry { key: String },

    #[error("failed to write cache entry for key '{key}'")]
    WriteFailure {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    #[error("failed to read cache entry for key '{key}'")]
    ReadFailure {
        key: String,
        #[source]
        source: Box<CacheError>,
    },

    #[error("failed to load cache metadata file {path}")]
    MetadataLoadFailure {
        path: PathBuf,
        #[source]
        source: Box<CacheError>,
    },

    #[error("failed to save cache metadata file {path}")]
    MetadataSaveFailure {
        path: PathBuf,
        #[source]
        source: Box<CacheError>,
    },

    #[error("invalid cache key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("malformed persistent summary for key '{key}': {reason}")]
    MalformedSummary { key: String, reason: String },

    #[error("malformed metadata line {line}: {reason}")]
    MalformedMetadata { line: usize, reason: String },

    #[error("cache entry for key '{key}' is not loaded")]
    NotMaterialized { key: String },

    #[error("cache has not been initialized")]
    Uninitialized,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl CacheError {
    pub fn invalid_type(field: impl Into<String>, expected: &'static str) -> Self {
        Self::InvalidType {
            field: field.into(),
            expected,
        }
    }

    pub fn malformed_summary(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedSummary {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` for the "no backing file" error, including when wrapped in a read failure.
    pub fn is_nonexistent_entry(&self) -> bool {
        match self {
            Self::NonexistentEntry { .. } => true,
            Self::ReadFailure { source, .. } => source.is_nonexistent_entry(),
            _ => false,
        }
    }
}
