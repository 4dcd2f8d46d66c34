//! Structured lifecycle events for batches and subjects.
//!
//! Every event carries an `event` field (`batch.started`,
//! `subject.finished`, ...) so JSON logs can be filtered without parsing
//! messages.

use std::time::Duration;
use tracing::{info, warn};

use crate::domain::outcome::RunOutcome;

/// Enters a span tagged with the batch id and subject for the lifetime of
/// the guard.
pub struct SubjectSpan {
    _span: tracing::span::EnteredSpan,
}

impl SubjectSpan {
    pub fn enter(batch_id: &str, subject: &str) -> Self {
        let span = tracing::info_span!("plugbench.subject", batch_id = %batch_id, subject = %subject);
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_batch_started(batch_id: &str, kind: &str, discovered: usize, config_digest: &str) {
    info!(
        event = "batch.started",
        batch_id = %batch_id,
        kind = %kind,
        discovered = discovered,
        config_digest = %config_digest,
    );
}

pub fn emit_subject_started(index: usize, total: usize, subject: &str) {
    info!(event = "subject.started", index = index, total = total, subject = %subject);
}

/// Emit the per-subject verdict. Failures are logged at `warn!`.
pub fn emit_subject_finished(subject: &str, duration_ms: u64, outcome: &RunOutcome) {
    match outcome {
        RunOutcome::Success { rows } => info!(
            event = "subject.finished",
            subject = %subject,
            duration_ms = duration_ms,
            status = "success",
            rows = rows.len(),
        ),
        other => warn!(
            event = "subject.finished",
            subject = %subject,
            duration_ms = duration_ms,
            status = "failed",
            diagnostic = other.diagnostic().unwrap_or_default(),
        ),
    }
}

/// Emit a supervision heartbeat for a still-running child.
pub fn emit_heartbeat(subject: &str, elapsed: Duration) {
    info!(event = "subject.heartbeat", subject = %subject, elapsed_secs = elapsed.as_secs());
}

pub fn emit_eta(completed: usize, total: usize, remaining: Duration) {
    info!(
        event = "batch.eta",
        completed = completed,
        total = total,
        remaining_secs = remaining.as_secs(),
    );
}

pub fn emit_batch_halted(batch_id: &str, subject: &str) {
    warn!(event = "batch.halted", batch_id = %batch_id, subject = %subject);
}

pub fn emit_batch_finished(
    batch_id: &str,
    tested: usize,
    successful: usize,
    failed: usize,
    duration_ms: u64,
) {
    info!(
        event = "batch.finished",
        batch_id = %batch_id,
        tested = tested,
        successful = successful,
        failed = failed,
        duration_ms = duration_ms,
    );
}

pub fn emit_validation_finished(plugin: &str, total: usize, successful: usize, success_rate: f64) {
    info!(
        event = "validation.finished",
        plugin = %plugin,
        total = total,
        successful = successful,
        success_rate = success_rate,
    );
}

/// Emit a non-fatal artifact error (report, merge or chart).
pub fn emit_artifact_error(artifact: &str, error: &dyn std::fmt::Display) {
    warn!(event = "artifact.error", artifact = %artifact, error = %error);
}
