//! Structured lifecycle events are emitted with their `event` tags.

use plugbench_core::{
    emit_artifact_error, emit_batch_finished, emit_batch_halted, emit_batch_started, emit_eta,
    emit_heartbeat, emit_subject_finished, emit_subject_started, emit_validation_finished,
    load_results, RunOutcome, SubjectSpan, METRICS,
};
use std::time::Duration;
use tracing_test::traced_test;

#[traced_test]
#[test]
fn test_batch_lifecycle_events_logged() {
    emit_batch_started("batch-1", "plugins", 3, "abc123");
    emit_subject_started(1, 3, "Reverb.vst3");
    emit_batch_finished("batch-1", 3, 2, 1, 4200);

    assert!(logs_contain("batch.started"));
    assert!(logs_contain("subject.started"));
    assert!(logs_contain("batch.finished"));
    assert!(logs_contain("Reverb.vst3"));
}

#[traced_test]
#[test]
fn test_subject_finished_reports_diagnostic_on_failure() {
    emit_subject_finished("Hang.vst3", 300_000, &RunOutcome::TimedOut);
    assert!(logs_contain("subject.finished"));
    assert!(logs_contain("Timeout"));
    assert!(logs_contain("WARN"));
}

#[traced_test]
#[test]
fn test_subject_finished_success_counts_rows() {
    emit_subject_finished("Gain.vst3", 1200, &RunOutcome::Success { rows: Vec::new() });
    assert!(logs_contain("status=\"success\""));
}

#[traced_test]
#[test]
fn test_progress_events() {
    emit_heartbeat("Synth.vst3", Duration::from_secs(4));
    emit_eta(2, 5, Duration::from_secs(90));
    emit_batch_halted("batch-2", "Broken.vst3");
    emit_validation_finished("Space.vst3", 10, 9, 90.0);
    emit_artifact_error("summary.json", &"disk full");

    assert!(logs_contain("subject.heartbeat"));
    assert!(logs_contain("batch.eta"));
    assert!(logs_contain("batch.halted"));
    assert!(logs_contain("validation.finished"));
    assert!(logs_contain("disk full"));
}

#[traced_test]
#[test]
fn test_subject_span_tags_nested_events() {
    let span = SubjectSpan::enter("batch-3", "Delay.vst3");
    tracing::info!("inside subject");
    drop(span);
    assert!(logs_contain("plugbench.subject"));
}

#[traced_test]
#[test]
fn test_metrics_flush_reports_slowest_subject() {
    METRICS.record_subject("Slow Reverb.vst3", &RunOutcome::TimedOut, Duration::from_secs(400));
    METRICS.flush("batch-4");
    assert!(logs_contain("batch.metrics"));
    assert!(logs_contain("batch-4"));
    assert!(logs_contain("Slow Reverb.vst3"));
}

#[traced_test]
#[test]
fn test_result_loading_logs_row_count() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("perf.csv");
    std::fs::write(
        &path,
        "plugin_name,format,channels,block_size,mean_us,median_us,p95_us,min_us,max_us,std_dev_us,cv_pct,approx_rt_cpu_pct,dsp_load_pct\n\
         Gain,VST3,2,128,1,1,1,1,1,0,0,0.1,0.1\n",
    )
    .expect("write");

    let rows = load_results(&path).expect("load");
    assert_eq!(rows.len(), 1);
    assert!(logs_contain("loaded result rows"));
    assert!(logs_contain("perf.csv"));
}
