//! Domain-level error taxonomy for plugbench.
//!
//! Only fatal conditions are errors. Per-subject failures (spawn, timeout,
//! non-zero exit, unparseable output) are recorded as
//! [`RunOutcome`](super::outcome::RunOutcome) values and never unwind past the
//! subject loop.

use std::path::PathBuf;

/// Errors produced while enumerating subjects.
#[derive(Debug, thiserror::Error)]
pub enum DiscoveryError {
    #[error("subject directory not found: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("invalid subject pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("no subjects found in {dir} matching {pattern}")]
    NoMatches { dir: PathBuf, pattern: String },

    #[error("io error reading {dir}: {source}")]
    Io {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Exit code for fatal errors outside the named classes (I/O, CSV,
/// serialization, chart rendering).
pub const GENERIC_ERROR_EXIT: u8 = 5;

/// Fatal plugbench errors. Any of these aborts a command before or instead of
/// producing a report.
#[derive(Debug, thiserror::Error)]
pub enum BenchError {
    #[error("discovery failed: {0}")]
    Discovery(#[from] DiscoveryError),

    #[error("{tool} binary not found (looked in: {searched})")]
    ToolMissing { tool: String, searched: String },

    #[error("required artifact not found: {0}")]
    ArtifactMissing(PathBuf),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("chart rendering failed: {0}")]
    Chart(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl BenchError {
    /// Process exit code the CLI reports for this error.
    ///
    /// `0` and `1` are reserved for clean and non-clean batches.
    pub fn exit_code(&self) -> u8 {
        match self {
            BenchError::Discovery(_) => 2,
            BenchError::ToolMissing { .. } => 3,
            BenchError::ArtifactMissing(_) => 4,
            BenchError::Csv(_)
            | BenchError::Serialization(_)
            | BenchError::Chart(_)
            | BenchError::Io(_) => GENERIC_ERROR_EXIT,
        }
    }
}

/// Result type for plugbench domain operations.
pub type Result<T> = std::result::Result<T, BenchError>;
