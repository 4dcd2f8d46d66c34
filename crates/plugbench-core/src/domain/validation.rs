//! Preset validation outcomes and their batch-level summary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Diagnostic used when the verifier printed neither a success line nor an
/// error marker.
pub const NO_OUTPUT_DIAGNOSTIC: &str = "no output";

/// Result of verifying one preset.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationOutcome {
    pub applied: u32,
    pub total: u32,
    pub success: bool,
    pub diagnostic: String,
}

impl ValidationOutcome {
    pub fn passed(applied: u32, total: u32) -> Self {
        Self {
            applied,
            total,
            success: true,
            diagnostic: String::new(),
        }
    }

    pub fn failed(diagnostic: impl Into<String>) -> Self {
        Self {
            applied: 0,
            total: 0,
            success: false,
            diagnostic: diagnostic.into(),
        }
    }
}

/// Outcome for a named subject.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationRecord {
    pub subject: String,
    pub outcome: ValidationOutcome,
}

/// Aggregate statistics over a validation sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationSummary {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    /// Percentage in `0.0..=100.0`.
    pub success_rate: f64,
    /// Mean applied count across successful subjects.
    pub mean_applied: Option<f64>,
    /// Mean total count across successful subjects.
    pub mean_total: Option<f64>,
    /// Mean of `applied / total` across successful subjects with `total > 0`.
    pub mean_applied_ratio: Option<f64>,
}

impl ValidationSummary {
    pub fn from_records(records: &[ValidationRecord]) -> Self {
        let total = records.len();
        let passed: Vec<&ValidationOutcome> = records
            .iter()
            .map(|r| &r.outcome)
            .filter(|o| o.success)
            .collect();
        let successful = passed.len();

        let mean = |values: Vec<f64>| -> Option<f64> {
            if values.is_empty() {
                None
            } else {
                Some(values.iter().sum::<f64>() / values.len() as f64)
            }
        };

        let mean_applied = mean(passed.iter().map(|o| o.applied as f64).collect());
        let mean_total = mean(passed.iter().map(|o| o.total as f64).collect());
        let mean_applied_ratio = mean(
            passed
                .iter()
                .filter(|o| o.total > 0)
                .map(|o| o.applied as f64 / o.total as f64)
                .collect(),
        );

        Self {
            total,
            successful,
            failed: total - successful,
            success_rate: if total == 0 {
                0.0
            } else {
                successful as f64 / total as f64 * 100.0
            },
            mean_applied,
            mean_total,
            mean_applied_ratio,
        }
    }
}

/// Full validation sweep: per-subject records plus summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub plugin: String,
    pub generated_at: DateTime<Utc>,
    pub records: Vec<ValidationRecord>,
    pub summary: ValidationSummary,
}

impl ValidationReport {
    pub fn new(plugin: impl Into<String>, records: Vec<ValidationRecord>) -> Self {
        let summary = ValidationSummary::from_records(&records);
        Self {
            plugin: plugin.into(),
            generated_at: Utc::now(),
            records,
            summary,
        }
    }

    /// True when every preset validated.
    pub fn is_clean(&self) -> bool {
        self.summary.failed == 0
    }
}
