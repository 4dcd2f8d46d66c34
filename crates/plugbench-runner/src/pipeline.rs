//! Benchmark batch orchestration.

use anyhow::{Context, Result};
use plugbench_core::{
    emit_artifact_error, emit_batch_finished, emit_batch_halted, emit_batch_started, emit_eta,
    emit_subject_finished, emit_subject_started, estimate_remaining, merge_results,
    outcome_from_output, write_batch_reports, BatchEntry, BatchResult, FailurePolicy,
    MergeReport, MergeSource, ReportPaths, RunConfig, RunOutcome, Subject, SubjectSpan,
    MERGED_PLUGINS_FILE, MERGED_PRESETS_FILE, METRICS,
};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

use crate::supervisor::{ProcessOutcome, Supervisor};
use crate::tool::{measurement_args, ToolInvocation};

/// Marker the measurement tool prints on stderr after applying a preset.
pub const PRESET_LOADED_MARKER: &str = "Loaded preset:";

/// What a batch iterates over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Plugins,
    Presets,
}

impl BatchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchKind::Plugins => "plugins",
            BatchKind::Presets => "presets",
        }
    }

    /// File name of the merged dataset written after the batch.
    pub fn merged_file_name(&self) -> &'static str {
        match self {
            BatchKind::Plugins => MERGED_PLUGINS_FILE,
            BatchKind::Presets => MERGED_PRESETS_FILE,
        }
    }
}

/// Per-batch settings.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub kind: BatchKind,
    pub output_dir: PathBuf,
    pub config: RunConfig,
    pub policy: FailurePolicy,
    /// Merge per-subject CSVs once the batch ends.
    pub merge: bool,
}

impl BatchOptions {
    pub fn new(kind: BatchKind, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            output_dir: output_dir.into(),
            config: RunConfig::default(),
            policy: FailurePolicy::default(),
            merge: true,
        }
    }

    pub fn with_config(mut self, config: RunConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_merge(mut self, merge: bool) -> Self {
        self.merge = merge;
        self
    }
}

/// Everything a finished batch produced.
#[derive(Debug, Clone)]
pub struct BatchOutput {
    pub result: BatchResult,
    pub reports: ReportPaths,
    /// `None` when merging was disabled or failed.
    pub merged: Option<MergeReport>,
}

/// Map a supervised measurement run onto a subject outcome.
///
/// A clean exit still has to produce loadable rows. For preset subjects a
/// missing [`PRESET_LOADED_MARKER`] is only a warning.
pub fn classify_measurement(process: ProcessOutcome, subject: &Subject, out: &Path) -> RunOutcome {
    match process {
        ProcessOutcome::Completed {
            exit_code: 0,
            output,
            ..
        } => {
            if subject.is_preset() && !output.stderr.contains(PRESET_LOADED_MARKER) {
                warn!(subject = %subject.name, "tool did not confirm preset load");
            }
            outcome_from_output(out)
        }
        ProcessOutcome::Completed {
            exit_code, output, ..
        } => RunOutcome::non_zero_exit(exit_code, &output.stderr),
        ProcessOutcome::TimedOut { .. } => RunOutcome::TimedOut,
        ProcessOutcome::SpawnFailed { error } => RunOutcome::spawn_failure(error),
    }
}

/// Runs the measurement tool over a list of subjects, one at a time.
pub struct BenchmarkPipeline {
    supervisor: Supervisor,
    tool: PathBuf,
}

impl BenchmarkPipeline {
    pub fn new(supervisor: Supervisor, tool: impl Into<PathBuf>) -> Self {
        Self {
            supervisor,
            tool: tool.into(),
        }
    }

    /// Measure a single subject, writing its CSV to `out`.
    pub async fn run_subject(&self, subject: &Subject, config: &RunConfig, out: &Path) -> RunOutcome {
        let invocation = ToolInvocation::new(&self.tool, measurement_args(subject, config, out));
        let process = self.supervisor.supervise(&subject.name, &invocation).await;
        classify_measurement(process, subject, out)
    }

    /// Run every subject under `options`, then write reports and merge.
    ///
    /// Subject failures are recorded, never returned. Errors are limited to
    /// the output directory and report files.
    pub async fn run_batch(&self, subjects: &[Subject], options: &BatchOptions) -> Result<BatchOutput> {
        let dir = &options.output_dir;
        std::fs::create_dir_all(dir).with_context(|| format!("create {:?}", dir))?;

        let total = subjects.len();
        let mut batch = BatchResult::new(options.config.clone(), options.policy, total);
        let batch_id = batch.batch_id.to_string();
        emit_batch_started(
            &batch_id,
            options.kind.as_str(),
            total,
            &options.config.digest(),
        );

        let started = Instant::now();
        for (index, subject) in subjects.iter().enumerate() {
            let _span = SubjectSpan::enter(&batch_id, &subject.name);
            emit_subject_started(index + 1, total, &subject.name);

            let out = dir.join(subject.output_file_name());
            let subject_started = Instant::now();
            let outcome = self.run_subject(subject, &options.config, &out).await;
            let wall = subject_started.elapsed();
            let duration_ms = wall.as_millis() as u64;

            emit_subject_finished(&subject.name, duration_ms, &outcome);
            METRICS.record_subject(&subject.name, &outcome, wall);

            batch.record(BatchEntry {
                subject: subject.name.clone(),
                category: subject.category().map(str::to_string),
                output_path: Some(out),
                duration_ms,
                outcome,
            })?;

            if let Some(remaining) = estimate_remaining(started.elapsed(), index + 1, total) {
                emit_eta(index + 1, total, remaining);
            }

            if batch.should_halt() {
                if index + 1 < total {
                    emit_batch_halted(&batch_id, &subject.name);
                }
                break;
            }
        }
        batch.finish();

        let reports = write_batch_reports(dir, &batch)?;
        info!(text = %reports.text.display(), json = %reports.json.display(), "reports written");

        let merged = if options.merge {
            merge_outputs(&batch, &dir.join(options.kind.merged_file_name()))
        } else {
            None
        };

        emit_batch_finished(
            &batch_id,
            batch.entries().len(),
            batch.success_count(),
            batch.failure_count(),
            started.elapsed().as_millis() as u64,
        );
        METRICS.flush(&batch_id);

        Ok(BatchOutput {
            result: batch,
            reports,
            merged,
        })
    }
}

/// Merge the output of every attempted subject, failed ones included;
/// `merge_results` skips files that are missing or empty.
fn merge_outputs(batch: &BatchResult, output: &Path) -> Option<MergeReport> {
    let sources: Vec<MergeSource> = batch
        .entries()
        .iter()
        .filter_map(|e| {
            let path = e.output_path.as_ref()?;
            Some(MergeSource::from_path(path).with_category(e.category.clone()))
        })
        .collect();

    match merge_results(&sources, output) {
        Ok(report) => Some(report),
        Err(e) => {
            emit_artifact_error(&output.display().to_string(), &e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::process::CapturedOutput;
    use plugbench_core::FailureReason;
    use std::time::Duration;
    use tracing_test::traced_test;

    const ONE_ROW_CSV: &str = "plugin_name,format,channels,block_size,mean_us,median_us,p95_us,min_us,max_us,std_dev_us,cv_pct,approx_rt_cpu_pct,dsp_load_pct\n\
         Space,VST3,2,128,1,1,1,1,1,0,0,0.1,0.1\n";

    fn completed(code: i32, stderr: &str) -> ProcessOutcome {
        ProcessOutcome::Completed {
            exit_code: code,
            output: CapturedOutput {
                stdout: String::new(),
                stderr: stderr.to_string(),
            },
            elapsed: Duration::from_secs(1),
        }
    }

    #[test]
    fn test_nonzero_exit_uses_stderr_or_unknown() {
        let subject = Subject::plugin("/p/Bad.vst3");
        let out = Path::new("/nonexistent/Bad.csv");

        let outcome = classify_measurement(completed(1, "boom\n"), &subject, out);
        assert_eq!(outcome.diagnostic(), Some("boom"));
        assert!(matches!(
            outcome,
            RunOutcome::Failed {
                reason: FailureReason::NonZeroExit { code: 1 },
                ..
            }
        ));

        let outcome = classify_measurement(completed(1, "  "), &subject, out);
        assert_eq!(outcome.diagnostic(), Some("Unknown error"));
    }

    #[test]
    fn test_clean_exit_without_csv_is_parse_failure() {
        let subject = Subject::plugin("/p/Quiet.vst3");
        let outcome = classify_measurement(completed(0, ""), &subject, Path::new("/nonexistent.csv"));
        assert_eq!(outcome.diagnostic(), Some("Could not parse results"));
    }

    #[test]
    fn test_timeout_and_spawn_failure() {
        let subject = Subject::plugin("/p/X.vst3");
        let out = Path::new("x.csv");
        let timed_out = classify_measurement(
            ProcessOutcome::TimedOut {
                elapsed: Duration::from_secs(301),
            },
            &subject,
            out,
        );
        assert_eq!(timed_out, RunOutcome::TimedOut);
        assert_eq!(timed_out.diagnostic(), Some("Timeout"));

        let spawn = classify_measurement(
            ProcessOutcome::SpawnFailed {
                error: "permission denied".to_string(),
            },
            &subject,
            out,
        );
        assert_eq!(spawn.diagnostic(), Some("permission denied"));
    }

    #[traced_test]
    #[test]
    fn test_preset_run_without_load_marker_warns_but_succeeds() {
        let dir = tempfile::tempdir().expect("tempdir");
        let preset = dir.path().join("Warm Hall.json");
        std::fs::write(&preset, r#"{"metadata": {"category": "Reverb"}}"#).expect("write preset");
        let out = dir.path().join("Warm Hall_benchmark.csv");
        std::fs::write(&out, ONE_ROW_CSV).expect("write csv");
        let subject = Subject::preset("/p/Space.vst3", &preset);

        let outcome = classify_measurement(completed(0, "initialising\n"), &subject, &out);

        assert!(outcome.is_success());
        assert!(logs_contain("tool did not confirm preset load"));
    }

    #[traced_test]
    #[test]
    fn test_preset_run_with_load_marker_is_quiet() {
        let dir = tempfile::tempdir().expect("tempdir");
        let preset = dir.path().join("Dry.json");
        std::fs::write(&preset, "{}").expect("write preset");
        let out = dir.path().join("Dry_benchmark.csv");
        std::fs::write(&out, ONE_ROW_CSV).expect("write csv");
        let subject = Subject::preset("/p/Space.vst3", &preset);

        let stderr = format!("{PRESET_LOADED_MARKER} Dry.json\n");
        let outcome = classify_measurement(completed(0, &stderr), &subject, &out);

        assert!(outcome.is_success());
        assert!(!logs_contain("tool did not confirm preset load"));
    }

    #[test]
    fn test_batch_options_defaults() {
        let options = BatchOptions::new(BatchKind::Presets, "/out");
        assert_eq!(options.policy, FailurePolicy::StopOnFirstFailure);
        assert!(options.merge);
        assert_eq!(options.kind.merged_file_name(), "all_presets_benchmark.csv");
    }
}
