//! Concatenate per-subject CSVs into one dataset tagged by subject.

use anyhow::{Context, Result};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Columns appended to the measurement schema in the merged file.
pub const MERGED_EXTRA_COLUMNS: [&str; 2] = ["preset_name", "preset_category"];

/// One per-subject CSV to merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSource {
    pub path: PathBuf,
    pub subject_id: String,
    pub category: Option<String>,
}

impl MergeSource {
    /// Source whose subject id is derived from the file stem with any
    /// trailing `_benchmark` removed.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let subject_id = stem
            .strip_suffix("_benchmark")
            .map(str::to_string)
            .unwrap_or(stem);
        Self {
            path,
            subject_id,
            category: None,
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = category;
        self
    }
}

/// Outcome of a merge.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeReport {
    pub output: PathBuf,
    /// Data rows written (header excluded).
    pub rows: usize,
    /// Sources that contributed a header or rows.
    pub files_merged: usize,
    /// Sources that were absent, empty or unreadable.
    pub files_skipped: usize,
}

/// Read a source completely. `None` when the file is absent, empty, or
/// cannot be read.
fn read_source(path: &Path) -> Option<(StringRecord, Vec<StringRecord>)> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .ok()?;
    let header = reader.headers().ok()?.clone();
    if header.is_empty() {
        return None;
    }
    let rows = reader.records().collect::<Result<Vec<_>, _>>().ok()?;
    Some((header, rows))
}

/// Merge `sources` into `output`.
///
/// The header of the first readable source is used, extended with
/// [`MERGED_EXTRA_COLUMNS`]. Missing or unreadable sources are skipped
/// without error, so a partial batch still yields a usable dataset.
pub fn merge_results(sources: &[MergeSource], output: &Path) -> Result<MergeReport> {
    let mut header: Option<StringRecord> = None;
    let mut merged: Vec<StringRecord> = Vec::new();
    let mut files_merged = 0;
    let mut files_skipped = 0;

    for source in sources {
        let Some((file_header, rows)) = read_source(&source.path) else {
            debug!(path = %source.path.display(), "skipping merge source");
            files_skipped += 1;
            continue;
        };

        if header.is_none() {
            let mut extended = file_header.clone();
            for column in MERGED_EXTRA_COLUMNS {
                extended.push_field(column);
            }
            header = Some(extended);
        }

        let category = source.category.as_deref().unwrap_or("");
        for mut row in rows {
            row.push_field(&source.subject_id);
            row.push_field(category);
            merged.push(row);
        }
        files_merged += 1;
    }

    let mut writer = WriterBuilder::new()
        .flexible(true)
        .from_path(output)
        .with_context(|| format!("create {:?}", output))?;
    if let Some(header) = &header {
        writer.write_record(header)?;
    }
    for row in &merged {
        writer.write_record(row)?;
    }
    writer.flush().with_context(|| format!("write {:?}", output))?;

    info!(
        output = %output.display(),
        rows = merged.len(),
        files = files_merged,
        "merged results"
    );

    Ok(MergeReport {
        output: output.to_path_buf(),
        rows: merged.len(),
        files_merged,
        files_skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::sample_csv;

    #[test]
    fn test_source_id_strips_benchmark_suffix() {
        let src = MergeSource::from_path("/out/Warm Hall_benchmark.csv");
        assert_eq!(src.subject_id, "Warm Hall");
        let src = MergeSource::from_path("/out/Reverb.csv");
        assert_eq!(src.subject_id, "Reverb");
    }

    #[test]
    fn test_merge_counts_and_tags_rows() {
        let dir = tempfile::tempdir().expect("tempdir");
        let a = dir.path().join("a_benchmark.csv");
        let b = dir.path().join("b_benchmark.csv");
        std::fs::write(&a, sample_csv(&[(64, 1.0, 1.0), (128, 2.0, 2.0)])).expect("write");
        std::fs::write(&b, sample_csv(&[(64, 3.0, 3.0)])).expect("write");
        let missing = dir.path().join("gone_benchmark.csv");
        let out = dir.path().join("merged.csv");

        let sources = vec![
            MergeSource::from_path(&a).with_category(Some("Reverb".to_string())),
            MergeSource::from_path(&missing),
            MergeSource::from_path(&b),
        ];
        let report = merge_results(&sources, &out).expect("merge");

        assert_eq!(report.rows, 3);
        assert_eq!(report.files_merged, 2);
        assert_eq!(report.files_skipped, 1);

        let mut reader = ReaderBuilder::new().from_path(&out).expect("open merged");
        let headers = reader.headers().expect("headers").clone();
        assert_eq!(headers.get(headers.len() - 2), Some("preset_name"));
        assert_eq!(headers.get(headers.len() - 1), Some("preset_category"));

        let rows: Vec<StringRecord> = reader.records().map(|r| r.expect("row")).collect();
        assert_eq!(rows.len(), 3);
        let last = rows[0].len() - 1;
        assert_eq!(rows[0].get(last - 1), Some("a"));
        assert_eq!(rows[0].get(last), Some("Reverb"));
        assert_eq!(rows[2].get(last - 1), Some("b"));
        assert_eq!(rows[2].get(last), Some(""));
    }

    #[test]
    fn test_merge_with_no_sources_writes_empty_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let out = dir.path().join("merged.csv");
        let report = merge_results(&[MergeSource::from_path(dir.path().join("x.csv"))], &out)
            .expect("merge");
        assert_eq!(report.rows, 0);
        assert_eq!(report.files_merged, 0);
        assert!(out.exists());
    }

    #[test]
    fn test_empty_source_file_is_skipped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let empty = dir.path().join("empty.csv");
        std::fs::write(&empty, "").expect("write");
        let good = dir.path().join("good.csv");
        std::fs::write(&good, sample_csv(&[(64, 1.0, 1.0)])).expect("write");
        let out = dir.path().join("merged.csv");

        let report = merge_results(
            &[MergeSource::from_path(&empty), MergeSource::from_path(&good)],
            &out,
        )
        .expect("merge");
        assert_eq!(report.rows, 1);
        assert_eq!(report.files_skipped, 1);
    }
}
