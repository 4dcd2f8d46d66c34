//! plugbench core library
//!
//! Domain model and offline artifact handling for batch plugin benchmarks:
//! subject discovery, result loading, merging, reports and charts.

pub mod chart;
pub mod discovery;
pub mod domain;
pub mod merge;
pub mod metrics;
pub mod obs;
pub mod reporting;
pub mod results;
pub mod telemetry;

pub use chart::{render_chart, ChartData, ChartError, ChartPoint, StabilityBand};
pub use discovery::{discover_subjects, PLUGIN_PATTERN, PRESET_INDEX_FILE, PRESET_PATTERN};
pub use domain::{
    collides_with_merged_output, estimate_remaining, parse_block_sizes, safe_file_stem,
    BatchEntry, BatchError, BatchResult, BenchError, BitDepth, DiscoveryError, FailurePolicy,
    FailureReason, PresetMetadata, Result, ResultRow, RunConfig, RunOutcome, Subject,
    SubjectSummary, ValidationOutcome, ValidationRecord, ValidationReport, ValidationSummary,
    DEFAULT_BENCH_TIMEOUT_SECS, DEFAULT_VALIDATION_TIMEOUT_SECS, GENERIC_ERROR_EXIT,
    MERGED_PLUGINS_FILE, MERGED_PRESETS_FILE, NO_OUTPUT_DIAGNOSTIC, PARSE_DIAGNOSTIC,
    TIMEOUT_DIAGNOSTIC, UNKNOWN_ERROR_DIAGNOSTIC,
};
pub use merge::{merge_results, MergeReport, MergeSource, MERGED_EXTRA_COLUMNS};
pub use metrics::{Metrics, MetricsSnapshot, METRICS};
pub use obs::{
    emit_artifact_error, emit_batch_finished, emit_batch_halted, emit_batch_started, emit_eta,
    emit_heartbeat, emit_subject_finished, emit_subject_started, emit_validation_finished,
    SubjectSpan,
};
pub use reporting::{
    render_batch_summary, render_validation_report, write_batch_reports, BatchReportArtifact,
    ReportPaths, SUMMARY_JSON_FILE, SUMMARY_TEXT_FILE,
};
pub use results::{load_results, outcome_from_output, LoadError};
pub use telemetry::{init_tracing, LogFormat, LogSettings};
