//! End-to-end batches against a shell-script stand-in for `plugperf`.
//!
//! The fake tool picks its behaviour from the plugin path:
//! `Broken` exits 2 with a stderr message, `Hang` sleeps past the timeout,
//! `Quiet` exits 0 without writing a CSV, `Partial` writes its rows and then
//! exits 3, anything else writes two rows.

#![cfg(unix)]

use plugbench_core::{
    discover_subjects, load_results, BatchReportArtifact, FailurePolicy, RunConfig, Subject,
    PLUGIN_PATTERN, PRESET_PATTERN,
};
use plugbench_runner::{
    BatchKind, BatchOptions, BenchmarkPipeline, Supervisor, SupervisorPolicy, TokioLauncher,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use tempfile::TempDir;

const FAKE_PLUGPERF: &str = r#"#!/bin/sh
plugin=""
preset=""
out=""
while [ $# -gt 0 ]; do
  case "$1" in
    --plugin) plugin="$2"; shift 2 ;;
    --preset-json) preset="$2"; shift 2 ;;
    --out) out="$2"; shift 2 ;;
    *) shift ;;
  esac
done
case "$plugin" in
  *Broken*) echo "CreatePluginInstance failed" 1>&2; exit 2 ;;
  *Hang*) sleep 5; exit 0 ;;
  *Quiet*) exit 0 ;;
esac
if [ -n "$preset" ]; then
  echo "Loaded preset: $preset" 1>&2
fi
cat > "$out" <<CSV
plugin_name,plugin_path,format,sr,channels,bit_depth,warmup,iterations,block_size,mean_us,median_us,p95_us,min_us,max_us,std_dev_us,cv_pct,approx_rt_cpu_pct,dsp_load_pct,latency_samples
Fake,$plugin,VST3,48000,2,32f,40,200,64,120.0,110.0,150.0,100.0,200.0,12.0,2.0,9.5,10.0,0
Fake,$plugin,VST3,48000,2,32f,40,200,256,420.0,400.0,480.0,390.0,600.0,20.0,4.0,8.0,20.0,0
CSV
case "$plugin" in
  *Partial*) echo "engine crashed during teardown" 1>&2; exit 3 ;;
esac
"#;

/// Written once before any test spawns a process, so no forked child can
/// hold the script open for writing when it is executed.
fn fake_tool() -> &'static Path {
    static TOOL: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = TOOL.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("plugperf");
        std::fs::write(&path, FAKE_PLUGPERF).expect("write script");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).expect("chmod");
        (dir, path)
    });
    path
}

fn pipeline(timeout: Duration) -> BenchmarkPipeline {
    let supervisor = Supervisor::new(
        Arc::new(TokioLauncher),
        SupervisorPolicy::benchmark().with_timeout(timeout),
    );
    BenchmarkPipeline::new(supervisor, fake_tool())
}

fn plugin_subjects(dir: &Path, names: &[&str]) -> Vec<Subject> {
    for name in names {
        std::fs::create_dir(dir.join(name)).expect("mkdir bundle");
    }
    discover_subjects(dir, PLUGIN_PATTERN)
        .expect("discover")
        .into_iter()
        .map(Subject::plugin)
        .collect()
}

fn options(out: &Path, policy: FailurePolicy) -> BatchOptions {
    BatchOptions::new(BatchKind::Plugins, out)
        .with_config(RunConfig {
            block_sizes: vec![64, 256],
            ..RunConfig::default()
        })
        .with_policy(policy)
}

#[tokio::test]
async fn test_skip_errors_attempts_every_subject() {
    fake_tool();
    let plugins = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let subjects = plugin_subjects(plugins.path(), &["Alpha.vst3", "Broken.vst3", "Gamma.vst3"]);

    let output = pipeline(Duration::from_secs(30))
        .run_batch(&subjects, &options(out.path(), FailurePolicy::SkipErrors))
        .await
        .expect("batch");
    let batch = &output.result;

    assert_eq!(batch.entries().len(), batch.discovered);
    assert_eq!(batch.success_count(), 2);
    assert!(!batch.is_clean());
    assert!(!batch.halted_early);
    assert_eq!(
        batch.failed().get("Broken.vst3").map(String::as_str),
        Some("CreatePluginInstance failed")
    );

    let summary = batch.successful();
    let alpha = summary.get("Alpha.vst3").expect("alpha summary");
    assert!((alpha.mean_dsp_load - 15.0).abs() < 1e-9);
    assert!((alpha.mean_cv - 3.0).abs() < 1e-9);

    assert!(out.path().join("Alpha.csv").exists());
    assert!(output.reports.text.exists());
    let raw = std::fs::read_to_string(&output.reports.json).expect("read json");
    let report: BatchReportArtifact = serde_json::from_str(&raw).expect("parse json");
    assert_eq!(report.counts.tested, 3);
    assert_eq!(report.counts.failed, 1);

    let merged = output.merged.expect("merged");
    assert_eq!(merged.rows, 4);
    assert_eq!(merged.files_merged, 2);
    assert!(out.path().join("all_plugins_benchmark.csv").exists());
}

#[tokio::test]
async fn test_stop_on_first_failure_halts_and_still_reports() {
    fake_tool();
    let plugins = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let subjects = plugin_subjects(plugins.path(), &["Alpha.vst3", "Broken.vst3", "Gamma.vst3"]);

    let output = pipeline(Duration::from_secs(30))
        .run_batch(&subjects, &options(out.path(), FailurePolicy::StopOnFirstFailure))
        .await
        .expect("batch");

    assert_eq!(output.result.tested(), vec!["Alpha.vst3", "Broken.vst3"]);
    assert!(output.result.halted_early);
    assert_eq!(output.result.untested_count(), 1);
    assert!(!out.path().join("Gamma.csv").exists());
    assert!(output.reports.json.exists());
}

#[tokio::test]
async fn test_timeout_is_recorded_and_batch_continues_with_skip_errors() {
    fake_tool();
    let plugins = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let subjects = plugin_subjects(plugins.path(), &["Hang.vst3", "Zed.vst3"]);

    let output = pipeline(Duration::from_secs(1))
        .run_batch(&subjects, &options(out.path(), FailurePolicy::SkipErrors))
        .await
        .expect("batch");

    let failed = output.result.failed();
    assert_eq!(failed.get("Hang.vst3").map(String::as_str), Some("Timeout"));
    assert!(output.result.successful().contains_key("Zed.vst3"));
}

#[tokio::test]
async fn test_clean_exit_without_results_is_a_parse_failure() {
    fake_tool();
    let plugins = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let subjects = plugin_subjects(plugins.path(), &["Quiet.vst3"]);

    let output = pipeline(Duration::from_secs(30))
        .run_batch(&subjects, &options(out.path(), FailurePolicy::SkipErrors))
        .await
        .expect("batch");

    assert_eq!(
        output.result.failed().get("Quiet.vst3").map(String::as_str),
        Some("Could not parse results")
    );
    assert_eq!(output.merged.map(|m| m.rows), Some(0));
}

#[tokio::test]
async fn test_preset_batch_tags_merged_rows_with_metadata() {
    fake_tool();
    let presets = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    std::fs::write(
        presets.path().join("Warm Hall.json"),
        r#"{"preset": {"metadata": {"name": "Warm Hall", "category": "Reverb"}}}"#,
    )
    .expect("write preset");
    std::fs::write(presets.path().join("Dry.json"), r#"{"metadata": {}}"#).expect("write preset");
    std::fs::write(presets.path().join("preset_index.json"), "[]").expect("write index");

    let plugin = presets.path().join("Space.vst3");
    let subjects: Vec<Subject> = discover_subjects(presets.path(), PRESET_PATTERN)
        .expect("discover")
        .into_iter()
        .map(|p| Subject::preset(&plugin, p))
        .collect();
    assert_eq!(subjects.len(), 2);

    let output = pipeline(Duration::from_secs(30))
        .run_batch(
            &subjects,
            &BatchOptions::new(BatchKind::Presets, out.path()).with_policy(FailurePolicy::SkipErrors),
        )
        .await
        .expect("batch");

    assert!(output.result.is_clean());
    assert!(out.path().join("Warm Hall_benchmark.csv").exists());
    let rows = load_results(&out.path().join("Dry_benchmark.csv")).expect("rows");
    assert_eq!(rows.len(), 2);

    let merged_path = out.path().join("all_presets_benchmark.csv");
    let mut reader = csv::Reader::from_path(&merged_path).expect("open merged");
    let headers = reader.headers().expect("headers").clone();
    let name_col = headers.iter().position(|h| h == "preset_name").expect("name col");
    let category_col = headers
        .iter()
        .position(|h| h == "preset_category")
        .expect("category col");

    let records: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("record")).collect();
    assert_eq!(records.len(), 4);
    let warm: Vec<_> = records
        .iter()
        .filter(|r| r.get(name_col) == Some("Warm Hall"))
        .collect();
    assert_eq!(warm.len(), 2);
    assert!(warm.iter().all(|r| r.get(category_col) == Some("Reverb")));
}

#[tokio::test]
async fn test_failed_subject_output_is_still_merged_when_present() {
    fake_tool();
    let plugins = tempfile::tempdir().expect("tempdir");
    let out = tempfile::tempdir().expect("tempdir");
    let subjects = plugin_subjects(plugins.path(), &["Alpha.vst3", "Partial.vst3", "Quiet.vst3"]);

    let output = pipeline(Duration::from_secs(30))
        .run_batch(&subjects, &options(out.path(), FailurePolicy::SkipErrors))
        .await
        .expect("batch");

    let failed = output.result.failed();
    assert_eq!(
        failed.get("Partial.vst3").map(String::as_str),
        Some("engine crashed during teardown")
    );
    assert!(failed.contains_key("Quiet.vst3"));
    assert!(out.path().join("Partial.csv").exists());

    let merged = output.merged.expect("merged");
    assert_eq!(merged.files_merged, 2);
    assert_eq!(merged.rows, 4);
}
