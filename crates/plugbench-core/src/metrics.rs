//! Process-wide run statistics.
//!
//! The supervisor records spawns, kills and heartbeats; the batch loop records
//! one entry per finished subject with its outcome and wall time. A
//! [`MetricsSnapshot`] is emitted as a `batch.metrics` event when a batch ends.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::domain::outcome::RunOutcome;

/// Global metrics singleton.
pub static METRICS: Metrics = Metrics::new();

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub runs_spawned: u64,
    pub runs_killed: u64,
    pub heartbeats: u64,
    pub subjects_succeeded: u64,
    pub subjects_failed: u64,
    pub subjects_timed_out: u64,
    pub rows_loaded: u64,
    pub subject_wall_ms: u64,
    pub slowest_subject: Option<String>,
    pub slowest_subject_ms: u64,
}

impl MetricsSnapshot {
    /// Subjects recorded, whatever their outcome.
    pub fn subjects_finished(&self) -> u64 {
        self.subjects_succeeded + self.subjects_failed + self.subjects_timed_out
    }

    pub fn mean_subject_ms(&self) -> Option<u64> {
        match self.subjects_finished() {
            0 => None,
            n => Some(self.subject_wall_ms / n),
        }
    }
}

pub struct Metrics {
    runs_spawned: AtomicU64,
    runs_killed: AtomicU64,
    heartbeats: AtomicU64,
    subjects_succeeded: AtomicU64,
    subjects_failed: AtomicU64,
    subjects_timed_out: AtomicU64,
    rows_loaded: AtomicU64,
    subject_wall_ms: AtomicU64,
    slowest: Mutex<Option<(String, u64)>>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub const fn new() -> Self {
        Self {
            runs_spawned: AtomicU64::new(0),
            runs_killed: AtomicU64::new(0),
            heartbeats: AtomicU64::new(0),
            subjects_succeeded: AtomicU64::new(0),
            subjects_failed: AtomicU64::new(0),
            subjects_timed_out: AtomicU64::new(0),
            rows_loaded: AtomicU64::new(0),
            subject_wall_ms: AtomicU64::new(0),
            slowest: Mutex::new(None),
        }
    }

    pub fn record_spawn(&self) {
        self.runs_spawned.fetch_add(1, Ordering::Relaxed);
    }

    /// A child was killed after exceeding its timeout.
    pub fn record_kill(&self) {
        self.runs_killed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_rows_loaded(&self, n: u64) {
        self.rows_loaded.fetch_add(n, Ordering::Relaxed);
    }

    /// Count one finished subject under its outcome and add its wall time.
    pub fn record_subject(&self, subject: &str, outcome: &RunOutcome, wall: Duration) {
        let (counter, status) = match outcome {
            RunOutcome::Success { .. } => (&self.subjects_succeeded, "success"),
            RunOutcome::Failed { .. } => (&self.subjects_failed, "failed"),
            RunOutcome::TimedOut => (&self.subjects_timed_out, "timed_out"),
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let wall_ms = wall.as_millis() as u64;
        self.subject_wall_ms.fetch_add(wall_ms, Ordering::Relaxed);
        if let Ok(mut slowest) = self.slowest.lock() {
            if slowest.as_ref().map_or(true, |(_, ms)| wall_ms > *ms) {
                *slowest = Some((subject.to_string(), wall_ms));
            }
        }
        tracing::trace!(subject, wall_ms, status, "subject recorded");
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let (slowest_subject, slowest_subject_ms) = self
            .slowest
            .lock()
            .ok()
            .and_then(|slowest| slowest.as_ref().cloned())
            .map_or((None, 0), |(name, ms)| (Some(name), ms));

        MetricsSnapshot {
            runs_spawned: self.runs_spawned.load(Ordering::Relaxed),
            runs_killed: self.runs_killed.load(Ordering::Relaxed),
            heartbeats: self.heartbeats.load(Ordering::Relaxed),
            subjects_succeeded: self.subjects_succeeded.load(Ordering::Relaxed),
            subjects_failed: self.subjects_failed.load(Ordering::Relaxed),
            subjects_timed_out: self.subjects_timed_out.load(Ordering::Relaxed),
            rows_loaded: self.rows_loaded.load(Ordering::Relaxed),
            subject_wall_ms: self.subject_wall_ms.load(Ordering::Relaxed),
            slowest_subject,
            slowest_subject_ms,
        }
    }

    /// Emit the current snapshot as one `batch.metrics` event.
    pub fn flush(&self, batch_id: &str) {
        let snap = self.snapshot();
        tracing::info!(
            event = "batch.metrics",
            batch_id,
            runs_spawned = snap.runs_spawned,
            runs_killed = snap.runs_killed,
            heartbeats = snap.heartbeats,
            succeeded = snap.subjects_succeeded,
            failed = snap.subjects_failed,
            timed_out = snap.subjects_timed_out,
            rows_loaded = snap.rows_loaded,
            mean_subject_ms = snap.mean_subject_ms(),
            slowest_subject = snap.slowest_subject.as_deref(),
            slowest_subject_ms = snap.slowest_subject_ms,
        );
    }

    pub fn reset(&self) {
        for counter in [
            &self.runs_spawned,
            &self.runs_killed,
            &self.heartbeats,
            &self.subjects_succeeded,
            &self.subjects_failed,
            &self.subjects_timed_out,
            &self.rows_loaded,
            &self.subject_wall_ms,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut slowest) = self.slowest.lock() {
            *slowest = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_subject_splits_by_outcome() {
        let m = Metrics::new();
        let ok = RunOutcome::Success { rows: Vec::new() };
        m.record_subject("A.vst3", &ok, Duration::from_millis(1200));
        m.record_subject("B.vst3", &RunOutcome::parse_failure(), Duration::from_millis(300));
        m.record_subject("C.vst3", &RunOutcome::TimedOut, Duration::from_secs(301));

        let snap = m.snapshot();
        assert_eq!(snap.subjects_succeeded, 1);
        assert_eq!(snap.subjects_failed, 1);
        assert_eq!(snap.subjects_timed_out, 1);
        assert_eq!(snap.subjects_finished(), 3);
        assert_eq!(snap.subject_wall_ms, 302_500);
        assert_eq!(snap.slowest_subject.as_deref(), Some("C.vst3"));
        assert_eq!(snap.slowest_subject_ms, 301_000);
    }

    #[test]
    fn test_mean_subject_ms() {
        let m = Metrics::new();
        assert_eq!(m.snapshot().mean_subject_ms(), None);
        m.record_subject("A.vst3", &RunOutcome::TimedOut, Duration::from_millis(100));
        m.record_subject("B.vst3", &RunOutcome::TimedOut, Duration::from_millis(300));
        assert_eq!(m.snapshot().mean_subject_ms(), Some(200));
    }

    #[test]
    fn test_supervisor_counters_and_reset() {
        let m = Metrics::new();
        m.record_spawn();
        m.record_spawn();
        m.record_kill();
        m.record_heartbeat();
        m.add_rows_loaded(6);
        m.record_subject("A.vst3", &RunOutcome::TimedOut, Duration::from_secs(1));

        let snap = m.snapshot();
        assert_eq!((snap.runs_spawned, snap.runs_killed, snap.heartbeats), (2, 1, 1));
        assert_eq!(snap.rows_loaded, 6);

        m.reset();
        assert_eq!(m.snapshot(), MetricsSnapshot::default());
    }
}
