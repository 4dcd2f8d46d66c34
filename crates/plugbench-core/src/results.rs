//! Result loading: parse a plugperf CSV into rows.

use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, warn};

use crate::domain::outcome::RunOutcome;
use crate::domain::row::ResultRow;
use crate::metrics::METRICS;

/// Why a result file could not be turned into rows.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("result file not found: {0}")]
    Missing(String),

    #[error("result file has no data rows: {0}")]
    Empty(String),

    #[error("malformed result file {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: csv::Error,
    },
}

/// Read every row of a plugperf CSV. Fails when the file is missing, has no
/// data rows, or any row does not match the expected schema.
pub fn load_results(path: &Path) -> Result<Vec<ResultRow>, LoadError> {
    let shown = path.display().to_string();
    if !path.is_file() {
        return Err(LoadError::Missing(shown));
    }

    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|source| LoadError::Malformed {
            path: shown.clone(),
            source,
        })?;

    let rows = reader
        .deserialize::<ResultRow>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| LoadError::Malformed {
            path: shown.clone(),
            source,
        })?;

    if rows.is_empty() {
        return Err(LoadError::Empty(shown));
    }

    debug!(path = %shown, rows = rows.len(), "loaded result rows");
    METRICS.add_rows_loaded(rows.len() as u64);
    Ok(rows)
}

/// Turn a cleanly-exited run's output file into an outcome.
///
/// Any [`LoadError`] becomes `Failed` with the parse diagnostic, so an exit
/// code of 0 alone never makes a subject successful.
pub fn outcome_from_output(path: &Path) -> RunOutcome {
    match load_results(path) {
        Ok(rows) => RunOutcome::Success { rows },
        Err(e) => {
            warn!(error = %e, "could not parse results");
            RunOutcome::parse_failure()
        }
    }
}

#[cfg(test)]
pub(crate) const SAMPLE_HEADER: &str = "plugin_name,plugin_path,format,sr,channels,bit_depth,warmup,iterations,block_size,mean_us,median_us,p95_us,min_us,max_us,std_dev_us,cv_pct,approx_rt_cpu_pct,dsp_load_pct,latency_samples";

#[cfg(test)]
pub(crate) fn sample_csv(rows: &[(u32, f64, f64)]) -> String {
    let mut out = String::from(SAMPLE_HEADER);
    out.push('\n');
    for (block, dsp, cv) in rows {
        out.push_str(&format!(
            "Synth,/p/Synth.vst3,VST3,48000,2,32f,40,200,{block},120.5,110.0,150.0,100.0,200.0,12.0,{cv},9.5,{dsp},0\n"
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::outcome::FailureReason;

    #[test]
    fn test_load_results_and_summary() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("perf.csv");
        std::fs::write(&path, sample_csv(&[(64, 10.0, 2.0), (256, 20.0, 4.0)])).expect("write");

        let rows = load_results(&path).expect("load");
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].block_size, 64);
        assert_eq!(rows[1].latency_samples, Some(0));

        let outcome = outcome_from_output(&path);
        let summary = outcome.summary().expect("summary");
        assert!((summary.mean_dsp_load - 15.0).abs() < 1e-9);
        assert!((summary.mean_cv - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_load_results_accepts_minimal_schema() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("min.csv");
        std::fs::write(
            &path,
            "plugin_name,format,channels,block_size,mean_us,median_us,p95_us,min_us,max_us,std_dev_us,cv_pct,approx_rt_cpu_pct,dsp_load_pct\n\
             Gain,VST3,2,128,1,1,1,1,1,0,0,0.1,0.1\n",
        )
        .expect("write");

        let rows = load_results(&path).expect("load");
        assert_eq!(rows[0].bit_depth, "");
        assert!(rows[0].plugin_path.is_none());
    }

    #[test]
    fn test_missing_file_is_parse_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let outcome = outcome_from_output(&dir.path().join("nope.csv"));
        assert_eq!(outcome.diagnostic(), Some("Could not parse results"));
    }

    #[test]
    fn test_header_only_is_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("empty.csv");
        std::fs::write(&path, format!("{SAMPLE_HEADER}\n")).expect("write");

        assert!(matches!(load_results(&path), Err(LoadError::Empty(_))));
        assert!(matches!(
            outcome_from_output(&path),
            RunOutcome::Failed {
                reason: FailureReason::Parse,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_row() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bad.csv");
        std::fs::write(
            &path,
            format!("{SAMPLE_HEADER}\nSynth,/p,VST3,48000,2,32f,40,200,not-a-number,1,1,1,1,1,1,1,1,1,0\n"),
        )
        .expect("write");

        assert!(matches!(load_results(&path), Err(LoadError::Malformed { .. })));
    }
}
