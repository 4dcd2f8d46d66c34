//! Per-subject outcome of one pipeline pass.

use serde::{Deserialize, Serialize};

use super::row::{ResultRow, SubjectSummary};

/// Diagnostic recorded for a run that exceeded its timeout.
pub const TIMEOUT_DIAGNOSTIC: &str = "Timeout";

/// Diagnostic recorded when a run exited cleanly but left no usable rows.
pub const PARSE_DIAGNOSTIC: &str = "Could not parse results";

/// Diagnostic recorded for a non-zero exit with empty stderr.
pub const UNKNOWN_ERROR_DIAGNOSTIC: &str = "Unknown error";

/// Why a subject failed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureReason {
    /// The process could not be started.
    Spawn,

    /// The process exited with a non-zero code.
    NonZeroExit { code: i32 },

    /// The process succeeded but its output file was missing, empty or malformed.
    Parse,

    /// The verifier output did not contain the success pattern.
    Validation,
}

/// Outcome of one subject. Produced exactly once per subject per pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    Success { rows: Vec<ResultRow> },
    Failed { reason: FailureReason, diagnostic: String },
    TimedOut,
}

impl RunOutcome {
    /// A failure for a process that exited with `code`; `stderr` becomes the
    /// diagnostic unless it is blank.
    pub fn non_zero_exit(code: i32, stderr: &str) -> Self {
        let trimmed = stderr.trim();
        let diagnostic = if trimmed.is_empty() {
            UNKNOWN_ERROR_DIAGNOSTIC.to_string()
        } else {
            trimmed.to_string()
        };
        RunOutcome::Failed {
            reason: FailureReason::NonZeroExit { code },
            diagnostic,
        }
    }

    pub fn parse_failure() -> Self {
        RunOutcome::Failed {
            reason: FailureReason::Parse,
            diagnostic: PARSE_DIAGNOSTIC.to_string(),
        }
    }

    pub fn spawn_failure(error: impl Into<String>) -> Self {
        RunOutcome::Failed {
            reason: FailureReason::Spawn,
            diagnostic: error.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Success { .. })
    }

    /// Diagnostic text for failed and timed-out outcomes.
    pub fn diagnostic(&self) -> Option<&str> {
        match self {
            RunOutcome::Success { .. } => None,
            RunOutcome::Failed { diagnostic, .. } => Some(diagnostic),
            RunOutcome::TimedOut => Some(TIMEOUT_DIAGNOSTIC),
        }
    }

    /// Rows of a successful outcome.
    pub fn rows(&self) -> Option<&[ResultRow]> {
        match self {
            RunOutcome::Success { rows } => Some(rows),
            _ => None,
        }
    }

    /// Summary of a successful outcome.
    pub fn summary(&self) -> Option<SubjectSummary> {
        self.rows().and_then(SubjectSummary::from_rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::row::sample_row;

    #[test]
    fn test_non_zero_exit_uses_stderr() {
        let outcome = RunOutcome::non_zero_exit(2, "CreatePluginInstance failed\n");
        assert_eq!(outcome.diagnostic(), Some("CreatePluginInstance failed"));
        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                reason: FailureReason::NonZeroExit { code: 2 },
                ..
            }
        ));
    }

    #[test]
    fn test_non_zero_exit_blank_stderr_is_unknown() {
        let outcome = RunOutcome::non_zero_exit(1, "   \n");
        assert_eq!(outcome.diagnostic(), Some("Unknown error"));
    }

    #[test]
    fn test_timed_out_diagnostic() {
        assert_eq!(RunOutcome::TimedOut.diagnostic(), Some("Timeout"));
        assert!(!RunOutcome::TimedOut.is_success());
    }

    #[test]
    fn test_parse_failure_is_distinct_from_process_failure() {
        let outcome = RunOutcome::parse_failure();
        assert_eq!(outcome.diagnostic(), Some("Could not parse results"));
        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                reason: FailureReason::Parse,
                ..
            }
        ));
    }

    #[test]
    fn test_success_summary() {
        let outcome = RunOutcome::Success {
            rows: vec![sample_row(64, 10.0, 2.0), sample_row(128, 20.0, 4.0)],
        };
        let summary = outcome.summary().expect("summary");
        assert_eq!(summary.row_count, 2);
        assert!(outcome.diagnostic().is_none());
    }
}
