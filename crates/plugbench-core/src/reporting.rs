//! Batch and validation report artifacts.
//!
//! Every batch produces two reports from the same [`BatchResult`]:
//! - `summary.txt`: fixed-width table for humans
//! - `summary.json`: [`BatchReportArtifact`] for automation

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::domain::batch::{BatchResult, FailurePolicy};
use crate::domain::config::RunConfig;
use crate::domain::row::{ResultRow, SubjectSummary};
use crate::domain::validation::ValidationReport;

pub const SUMMARY_TEXT_FILE: &str = "summary.txt";
pub const SUMMARY_JSON_FILE: &str = "summary.json";

const RULE_WIDTH: usize = 90;

// ── summary.json schema ───────────────────────────────────────────────────

/// A successful subject with its summary and source rows.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectSummaryArtifact {
    #[serde(flatten)]
    pub summary: SubjectSummary,
    pub rows: Vec<ResultRow>,
}

/// Headline counts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchCountsArtifact {
    pub discovered: usize,
    pub tested: usize,
    pub successful: usize,
    pub failed: usize,
    pub untested: usize,
    pub success_rate: f64,
    pub clean: bool,
    pub halted_early: bool,
}

/// Machine-readable batch report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchReportArtifact {
    pub schema_version: String,
    pub batch_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub policy: FailurePolicy,
    pub config: RunConfig,
    pub config_digest: String,
    pub counts: BatchCountsArtifact,
    pub tested: Vec<String>,
    pub successful: BTreeMap<String, SubjectSummaryArtifact>,
    pub failed: BTreeMap<String, String>,
}

impl BatchReportArtifact {
    pub fn from_batch(batch: &BatchResult) -> Self {
        let successful = batch
            .entries()
            .iter()
            .filter_map(|e| {
                let rows = e.outcome.rows()?;
                let summary = SubjectSummary::from_rows(rows)?;
                Some((
                    e.subject.clone(),
                    SubjectSummaryArtifact {
                        summary,
                        rows: rows.to_vec(),
                    },
                ))
            })
            .collect();

        Self {
            schema_version: "1.0".to_string(),
            batch_id: batch.batch_id,
            generated_at: Utc::now(),
            started_at: batch.started_at,
            finished_at: batch.finished_at,
            policy: batch.policy,
            config: batch.config.clone(),
            config_digest: batch.config.digest(),
            counts: BatchCountsArtifact {
                discovered: batch.discovered,
                tested: batch.entries().len(),
                successful: batch.success_count(),
                failed: batch.failure_count(),
                untested: batch.untested_count(),
                success_rate: batch.success_rate(),
                clean: batch.is_clean(),
                halted_early: batch.halted_early,
            },
            tested: batch.tested().into_iter().map(str::to_string).collect(),
            successful,
            failed: batch.failed(),
        }
    }
}

// ── summary.txt rendering ─────────────────────────────────────────────────

/// Render the fixed-width text report.
pub fn render_batch_summary(batch: &BatchResult, generated_at: DateTime<Utc>) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let thin = "-".repeat(RULE_WIDTH);
    let successful = batch.successful();
    let failed = batch.failed();

    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "PLUGBENCH BATCH SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Batch: {}", batch.batch_id);
    let _ = writeln!(
        out,
        "Config: sr={} channels={} bits={} buffers={} warmup={} iterations={} timeout={}s",
        batch.config.sample_rate,
        batch.config.channels,
        batch.config.bit_depth,
        batch.config.buffers_arg(),
        batch.config.warmup,
        batch.config.iterations,
        batch.config.timeout_secs
    );
    let _ = writeln!(out, "Total subjects tested: {}", batch.entries().len());
    let _ = writeln!(out, "Successful: {}", successful.len());
    let _ = writeln!(out, "Failed: {}", failed.len());
    if batch.untested_count() > 0 {
        let _ = writeln!(out, "Not tested: {}", batch.untested_count());
    }
    let _ = writeln!(out, "Success Rate: {:.1}%", batch.success_rate());
    out.push('\n');

    if !successful.is_empty() {
        let _ = writeln!(out, "SUCCESSFUL TESTS");
        let _ = writeln!(out, "{thin}");
        let _ = writeln!(
            out,
            "{:<50} {:<12} {:<12} {:<10}",
            "Subject", "Avg DSP%", "Avg CV%", "Buffers"
        );
        let _ = writeln!(out, "{thin}");
        for (name, summary) in &successful {
            let _ = writeln!(
                out,
                "{:<50} {:<12.2} {:<12.2} {:<10}",
                name, summary.mean_dsp_load, summary.mean_cv, summary.row_count
            );
        }
        out.push('\n');
    }

    if !failed.is_empty() {
        let _ = writeln!(out, "FAILED TESTS");
        let _ = writeln!(out, "{thin}");
        for (name, diagnostic) in &failed {
            let _ = writeln!(out, "{name}: {diagnostic}");
        }
        out.push('\n');
    }

    out
}

/// Paths written by [`write_batch_reports`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportPaths {
    pub text: PathBuf,
    pub json: PathBuf,
}

/// Write `summary.txt` and `summary.json` into `dir`.
pub fn write_batch_reports(dir: &Path, batch: &BatchResult) -> Result<ReportPaths> {
    let artifact = BatchReportArtifact::from_batch(batch);
    let text = render_batch_summary(batch, artifact.generated_at);

    let text_path = dir.join(SUMMARY_TEXT_FILE);
    std::fs::write(&text_path, text).with_context(|| format!("write {:?}", text_path))?;

    let json_path = dir.join(SUMMARY_JSON_FILE);
    let content = serde_json::to_string_pretty(&artifact).context("serialize batch report")?;
    std::fs::write(&json_path, content).with_context(|| format!("write {:?}", json_path))?;

    Ok(ReportPaths {
        text: text_path,
        json: json_path,
    })
}

// ── validation report ─────────────────────────────────────────────────────

/// Render the text validation report.
pub fn render_validation_report(report: &ValidationReport, preset_dir: &Path) -> String {
    let rule = "=".repeat(80);
    let mut out = String::new();
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Preset Validation Report");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Plugin:  {}", report.plugin);
    let _ = writeln!(
        out,
        "Presets: {} found in {}",
        report.records.len(),
        preset_dir.display()
    );
    let _ = writeln!(out, "{rule}");
    out.push('\n');

    for record in &report.records {
        let o = &record.outcome;
        if o.success {
            let _ = writeln!(out, "✓ {}: {}/{} parameters", record.subject, o.applied, o.total);
        } else {
            let _ = writeln!(out, "✗ {}: {}", record.subject, o.diagnostic);
        }
    }

    let s = &report.summary;
    out.push('\n');
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "Total Presets:    {}", s.total);
    let _ = writeln!(out, "Successful:       {}", s.successful);
    let _ = writeln!(out, "Failed:           {}", s.failed);
    let _ = writeln!(out, "Success Rate:     {:.1}%", s.success_rate);

    if let (Some(applied), Some(total)) = (s.mean_applied, s.mean_total) {
        let _ = writeln!(out, "\nAverage Parameters Applied: {applied:.1}/{total:.1}");
    }
    if let Some(ratio) = s.mean_applied_ratio {
        let _ = writeln!(out, "Mean Applied Ratio:         {:.1}%", ratio * 100.0);
    }

    let failures: Vec<_> = report.records.iter().filter(|r| !r.outcome.success).collect();
    if !failures.is_empty() {
        let _ = writeln!(out, "\nFailed Presets:");
        for record in failures {
            let _ = writeln!(out, "  - {}: {}", record.subject, record.outcome.diagnostic);
        }
    }
    let _ = writeln!(out, "{rule}");
    out
}
