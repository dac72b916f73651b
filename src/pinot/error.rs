//! Error kinds shared across the crawl/filter/index/query pipeline (spec §7).

use std::path::PathBuf;

use thiserror::Error;

/// Unified error type returned by fallible crate operations.
///
/// Per-document failures (`FilterInput`, `FilterExtract`, `UnsupportedType`)
/// are meant to be caught by the caller and logged, not propagated past the
/// one document or directory entry that produced them.
#[derive(Debug, Error)]
pub enum PinotError {
    /// A required location or MIME type was empty at the pipeline entry point.
    #[error("input missing: {0}")]
    InputMissing(String),

    /// No filter is registered for a MIME type and no parent type applies.
    #[error("unsupported type: {0}")]
    UnsupportedType(String),

    /// A filter could not be fed bytes or a path.
    #[error("could not feed filter for {path:?}: {reason}")]
    FilterInput {
        /// Path of the document that could not be fed, if any.
        path: Option<PathBuf>,
        /// Human readable explanation.
        reason: String,
    },

    /// A filter raised an error, or produced invalid output, while extracting text.
    #[error("filter extraction failed: {0}")]
    FilterExtract(String),

    /// The index backend failed transiently; the caller may retry.
    #[error("index I/O error: {0}")]
    IndexIo(String),

    /// The requested document id or url is not present in the index.
    #[error("not found: {0}")]
    NotFound(String),

    /// The on-disk index format is obsolete or incompatible.
    #[error("index corrupt or incompatible: {0}")]
    IndexCorrupt(String),

    /// A crawl root no longer exists on disk.
    #[error("source vanished: {0}")]
    SourceVanished(String),

    /// The query failed to parse.
    #[error("syntax error near '{0}'")]
    QuerySyntax(String),
}

impl From<std::io::Error> for PinotError {
    fn from(value: std::io::Error) -> Self {
        PinotError::IndexIo(value.to_string())
    }
}

impl From<serde_json::Error> for PinotError {
    fn from(value: serde_json::Error) -> Self {
        PinotError::IndexIo(value.to_string())
    }
}

impl From<rusqlite::Error> for PinotError {
    fn from(value: rusqlite::Error) -> Self {
        PinotError::IndexIo(value.to_string())
    }
}

impl From<bincode::Error> for PinotError {
    fn from(value: bincode::Error) -> Self {
        PinotError::IndexIo(value.to_string())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, PinotError>;
