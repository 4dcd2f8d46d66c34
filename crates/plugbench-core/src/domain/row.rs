//! Measurement rows produced by plugperf and their per-subject summary.

use serde::{Deserialize, Serialize};

/// One measurement: a single block size for one subject.
///
/// Rows of the same subject share every context field except `block_size`
/// and the statistics derived from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResultRow {
    pub plugin_name: String,
    #[serde(default)]
    pub plugin_path: Option<String>,
    pub format: String,
    #[serde(default)]
    pub sr: Option<f64>,
    pub channels: u32,
    #[serde(default)]
    pub bit_depth: String,
    #[serde(default)]
    pub warmup: Option<u32>,
    #[serde(default)]
    pub iterations: Option<u32>,
    pub block_size: u32,
    pub mean_us: f64,
    pub median_us: f64,
    pub p95_us: f64,
    pub min_us: f64,
    pub max_us: f64,
    pub std_dev_us: f64,
    pub cv_pct: f64,
    pub approx_rt_cpu_pct: f64,
    pub dsp_load_pct: f64,
    #[serde(default)]
    pub latency_samples: Option<i64>,
}

/// Per-subject statistics derived from a successful run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubjectSummary {
    pub plugin_name: String,
    pub format: String,
    pub channels: u32,
    pub bit_depth: String,
    pub row_count: usize,
    pub mean_dsp_load: f64,
    pub mean_cv: f64,
}

impl SubjectSummary {
    /// Summarize a non-empty row set. Returns `None` for an empty slice.
    pub fn from_rows(rows: &[ResultRow]) -> Option<Self> {
        let first = rows.first()?;
        let n = rows.len() as f64;
        let mean_dsp_load = rows.iter().map(|r| r.dsp_load_pct).sum::<f64>() / n;
        let mean_cv = rows.iter().map(|r| r.cv_pct).sum::<f64>() / n;

        Some(Self {
            plugin_name: first.plugin_name.clone(),
            format: first.format.clone(),
            channels: first.channels,
            bit_depth: first.bit_depth.clone(),
            row_count: rows.len(),
            mean_dsp_load,
            mean_cv,
        })
    }
}

#[cfg(test)]
pub(crate) fn sample_row(block_size: u32, dsp_load_pct: f64, cv_pct: f64) -> ResultRow {
    ResultRow {
        plugin_name: "TestPlugin".to_string(),
        plugin_path: None,
        format: "VST3".to_string(),
        sr: Some(48_000.0),
        channels: 2,
        bit_depth: "32f".to_string(),
        warmup: Some(40),
        iterations: Some(200),
        block_size,
        mean_us: 120.0,
        median_us: 110.0,
        p95_us: 150.0,
        min_us: 100.0,
        max_us: 200.0,
        std_dev_us: 12.0,
        cv_pct,
        approx_rt_cpu_pct: 9.0,
        dsp_load_pct,
        latency_samples: Some(0),
    }
}
