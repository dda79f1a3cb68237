//! Error types for the engine.
//!
//! Fatal errors (bad configuration, unreadable inputs, failed exports)
//! surface through these enums. Per-record defects (one malformed
//! message, one bad row) are logged and counted at the call site and
//! never cross the record boundary.

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Export error: {0}")]
    Export(#[from] ExportError),

    #[error("Worker task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Configuration-related errors. All fatal: the run aborts before any
/// processing starts.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read configuration {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration {path}: {reason}")]
    Parse { path: String, reason: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Mail-archive scan errors.
///
/// Only whole-archive failures are errors; a single malformed message is
/// skipped with a diagnostic.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Failed to read archive {path}: {reason}")]
    Read { path: String, reason: String },

    #[error("Message {index} could not be parsed: {reason}")]
    Message { index: usize, reason: String },
}

/// Tabular-source errors. A missing file is a warning handled by the
/// loader, not an error; these cover genuine read failures.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to read {table} table {path}: {reason}")]
    Read {
        table: String,
        path: String,
        reason: String,
    },
}

/// Output-table write errors.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
