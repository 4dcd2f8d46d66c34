//! Batch accumulator: an append-only log of per-subject outcomes.
//!
//! The "successful" and "failed" views are projections over the log, so a
//! subject can never appear in both.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

use super::config::RunConfig;
use super::outcome::RunOutcome;
use super::row::SubjectSummary;

/// What to do after a subject fails.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Stop iterating right after the first failure is recorded.
    #[default]
    StopOnFirstFailure,

    /// Keep going through every subject.
    SkipErrors,
}

/// Errors raised by the batch accumulator.
#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("subject {0:?} already recorded in this batch")]
    DuplicateSubject(String),
}

/// One log entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    /// Subject identity (source file name).
    pub subject: String,

    /// Preset category, when known.
    pub category: Option<String>,

    /// CSV the measurement tool was told to write.
    pub output_path: Option<PathBuf>,

    /// Wall-clock time spent on this subject.
    pub duration_ms: u64,

    pub outcome: RunOutcome,
}

/// Accumulated state of one batch invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchResult {
    pub batch_id: Uuid,
    pub config: RunConfig,
    pub policy: FailurePolicy,
    /// Number of subjects discovered for this batch.
    pub discovered: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Set when `StopOnFirstFailure` ended the batch before every subject ran.
    pub halted_early: bool,
    entries: Vec<BatchEntry>,
}

impl BatchResult {
    pub fn new(config: RunConfig, policy: FailurePolicy, discovered: usize) -> Self {
        Self {
            batch_id: Uuid::new_v4(),
            config,
            policy,
            discovered,
            started_at: Utc::now(),
            finished_at: None,
            halted_early: false,
            entries: Vec::new(),
        }
    }

    /// Append an outcome. Each subject may be recorded once.
    pub fn record(&mut self, entry: BatchEntry) -> Result<(), BatchError> {
        if self.entries.iter().any(|e| e.subject == entry.subject) {
            return Err(BatchError::DuplicateSubject(entry.subject));
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Log entries in the order subjects were attempted.
    pub fn entries(&self) -> &[BatchEntry] {
        &self.entries
    }

    /// Subjects attempted so far, in order.
    pub fn tested(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.subject.as_str()).collect()
    }

    /// Successful subjects and their summaries, sorted by name.
    pub fn successful(&self) -> BTreeMap<String, SubjectSummary> {
        self.entries
            .iter()
            .filter_map(|e| e.outcome.summary().map(|s| (e.subject.clone(), s)))
            .collect()
    }

    /// Failed subjects and their diagnostics, sorted by name.
    pub fn failed(&self) -> BTreeMap<String, String> {
        self.entries
            .iter()
            .filter_map(|e| {
                e.outcome
                    .diagnostic()
                    .map(|d| (e.subject.clone(), d.to_string()))
            })
            .collect()
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|e| e.outcome.is_success()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.entries.len() - self.success_count()
    }

    /// Subjects that were discovered but never attempted.
    pub fn untested_count(&self) -> usize {
        self.discovered.saturating_sub(self.entries.len())
    }

    /// Percentage of attempted subjects that succeeded.
    pub fn success_rate(&self) -> f64 {
        if self.entries.is_empty() {
            0.0
        } else {
            self.success_count() as f64 / self.entries.len() as f64 * 100.0
        }
    }

    /// True when every attempted subject succeeded.
    pub fn is_clean(&self) -> bool {
        self.entries.iter().all(|e| e.outcome.is_success())
    }

    /// Whether the policy requires iteration to stop now.
    pub fn should_halt(&self) -> bool {
        self.policy == FailurePolicy::StopOnFirstFailure
            && self
                .entries
                .last()
                .is_some_and(|e| !e.outcome.is_success())
    }

    /// Stamp the end time.
    pub fn finish(&mut self) {
        self.halted_early = self.entries.len() < self.discovered;
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration between start and finish (or now).
    pub fn elapsed(&self) -> Duration {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).to_std().unwrap_or_default()
    }
}

/// Adaptive ETA: mean time per completed subject times the subjects left.
///
/// Returns `None` until at least one subject has completed.
pub fn estimate_remaining(elapsed: Duration, completed: usize, total: usize) -> Option<Duration> {
    if completed == 0 {
        return None;
    }
    let remaining = total.saturating_sub(completed);
    Some(elapsed.mul_f64(remaining as f64 / completed as f64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::FailureReason;
    use crate::domain::row::sample_row;

    fn entry(subject: &str, outcome: RunOutcome) -> BatchEntry {
        BatchEntry {
            subject: subject.to_string(),
            category: None,
            output_path: None,
            duration_ms: 10,
            outcome,
        }
    }

    fn success() -> RunOutcome {
        RunOutcome::Success {
            rows: vec![sample_row(64, 10.0, 2.0)],
        }
    }

    #[test]
    fn test_projections_are_disjoint() {
        let mut batch = BatchResult::new(RunConfig::default(), FailurePolicy::SkipErrors, 3);
        batch.record(entry("b.vst3", success())).unwrap();
        batch.record(entry("a.vst3", RunOutcome::TimedOut)).unwrap();
        batch
            .record(entry(
                "c.vst3",
                RunOutcome::Failed {
                    reason: FailureReason::Spawn,
                    diagnostic: "No such file".into(),
                },
            ))
            .unwrap();

        let ok = batch.successful();
        let failed = batch.failed();
        assert_eq!(ok.len() + failed.len(), batch.tested().len());
        for name in batch.tested() {
            assert!(ok.contains_key(name) ^ failed.contains_key(name));
        }
        assert_eq!(failed.get("a.vst3").map(String::as_str), Some("Timeout"));
        assert_eq!(batch.tested(), vec!["b.vst3", "a.vst3", "c.vst3"]);
    }

    #[test]
    fn test_duplicate_subject_rejected() {
        let mut batch = BatchResult::new(RunConfig::default(), FailurePolicy::SkipErrors, 1);
        batch.record(entry("a.vst3", success())).unwrap();
        let err = batch.record(entry("a.vst3", RunOutcome::TimedOut)).unwrap_err();
        assert!(err.to_string().contains("a.vst3"));
        assert_eq!(batch.entries().len(), 1);
    }

    #[test]
    fn test_should_halt_only_under_stop_policy() {
        let mut stop = BatchResult::new(RunConfig::default(), FailurePolicy::StopOnFirstFailure, 2);
        stop.record(entry("a", success())).unwrap();
        assert!(!stop.should_halt());
        stop.record(entry("b", RunOutcome::TimedOut)).unwrap();
        assert!(stop.should_halt());

        let mut skip = BatchResult::new(RunConfig::default(), FailurePolicy::SkipErrors, 2);
        skip.record(entry("a", RunOutcome::TimedOut)).unwrap();
        assert!(!skip.should_halt());
    }

    #[test]
    fn test_clean_and_counts() {
        let mut batch = BatchResult::new(RunConfig::default(), FailurePolicy::StopOnFirstFailure, 4);
        batch.record(entry("a", success())).unwrap();
        assert!(batch.is_clean());
        batch.record(entry("b", RunOutcome::parse_failure())).unwrap();
        batch.finish();

        assert!(!batch.is_clean());
        assert!(batch.halted_early);
        assert_eq!(batch.untested_count(), 2);
        assert!((batch.success_rate() - 50.0).abs() < 1e-9);
        assert!(batch.finished_at.is_some());
    }

    #[test]
    fn test_eta_before_first_completion() {
        assert!(estimate_remaining(Duration::from_secs(5), 0, 10).is_none());
    }

    #[test]
    fn test_eta_tightens_toward_zero() {
        let total = 4;
        let mut last = Duration::MAX;
        for completed in 1..=total {
            let elapsed = Duration::from_secs(10 * completed as u64);
            let eta = estimate_remaining(elapsed, completed, total).expect("eta");
            assert!(eta <= last);
            last = eta;
        }
        assert_eq!(last, Duration::ZERO);
        assert_eq!(
            estimate_remaining(Duration::from_secs(10), 1, 4),
            Some(Duration::from_secs(30))
        );
    }
}
