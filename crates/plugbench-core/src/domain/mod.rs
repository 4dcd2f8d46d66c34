//! Domain model for plugbench batches.

pub mod batch;
pub mod config;
pub mod error;
pub mod outcome;
pub mod row;
pub mod subject;
pub mod validation;

pub use batch::{estimate_remaining, BatchEntry, BatchError, BatchResult, FailurePolicy};
pub use config::{
    parse_block_sizes, BitDepth, RunConfig, DEFAULT_BENCH_TIMEOUT_SECS,
    DEFAULT_VALIDATION_TIMEOUT_SECS,
};
pub use error::{BenchError, DiscoveryError, Result, GENERIC_ERROR_EXIT};
pub use outcome::{
    FailureReason, RunOutcome, PARSE_DIAGNOSTIC, TIMEOUT_DIAGNOSTIC, UNKNOWN_ERROR_DIAGNOSTIC,
};
pub use row::{ResultRow, SubjectSummary};
pub use subject::{
    collides_with_merged_output, safe_file_stem, PresetMetadata, Subject, MERGED_PLUGINS_FILE,
    MERGED_PRESETS_FILE,
};
pub use validation::{
    ValidationOutcome, ValidationRecord, ValidationReport, ValidationSummary,
    NO_OUTPUT_DIAGNOSTIC,
};
