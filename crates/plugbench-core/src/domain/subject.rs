//! Benchmark subjects: a plugin bundle, or a plugin paired with a preset.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

/// Merged dataset written after a plugin batch.
pub const MERGED_PLUGINS_FILE: &str = "all_plugins_benchmark.csv";

/// Merged dataset written after a preset batch.
pub const MERGED_PRESETS_FILE: &str = "all_presets_benchmark.csv";

/// Descriptive metadata carried by a preset JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PresetMetadata {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub category: Option<String>,
}

impl PresetMetadata {
    /// Read metadata from a preset descriptor.
    ///
    /// Metadata lives under `preset.metadata` in wrapped documents and under
    /// `metadata` otherwise. Unreadable files yield `None`.
    pub fn load(path: &Path) -> Option<Self> {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read preset metadata");
                return None;
            }
        };
        let doc: serde_json::Value = match serde_json::from_str(&raw) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not parse preset metadata");
                return None;
            }
        };

        let node = match doc.get("preset") {
            Some(preset) => preset.get("metadata"),
            None => doc.get("metadata"),
        }?;
        serde_json::from_value(node.clone()).ok()
    }
}

/// One entry in a batch. Immutable once discovered.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Subject {
    /// File name of the source entry (`Reverb.vst3`, `Warm Hall.json`).
    pub name: String,

    /// File stem of the source entry.
    pub stem: String,

    /// Plugin bundle handed to the measurement tool.
    pub plugin_path: PathBuf,

    /// Preset descriptor, when benchmarking plugin+preset pairs.
    pub preset_path: Option<PathBuf>,

    /// Metadata extracted from the preset descriptor.
    pub metadata: Option<PresetMetadata>,
}

impl Subject {
    /// A bare plugin bundle subject.
    pub fn plugin(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            name: file_name(&path),
            stem: file_stem(&path),
            plugin_path: path,
            preset_path: None,
            metadata: None,
        }
    }

    /// A plugin+preset subject; metadata is read from the preset file.
    pub fn preset(plugin_path: impl Into<PathBuf>, preset_path: impl Into<PathBuf>) -> Self {
        let preset_path = preset_path.into();
        let metadata = PresetMetadata::load(&preset_path);
        Self {
            name: file_name(&preset_path),
            stem: file_stem(&preset_path),
            plugin_path: plugin_path.into(),
            preset_path: Some(preset_path),
            metadata,
        }
    }

    /// Whether this subject benchmarks a preset.
    pub fn is_preset(&self) -> bool {
        self.preset_path.is_some()
    }

    /// Category from preset metadata, if any.
    pub fn category(&self) -> Option<&str> {
        self.metadata.as_ref().and_then(|m| m.category.as_deref())
    }

    /// File name of this subject's CSV inside the batch output directory.
    pub fn output_file_name(&self) -> String {
        if self.is_preset() {
            format!("{}_benchmark.csv", self.stem)
        } else {
            format!("{}.csv", safe_file_stem(&self.stem))
        }
    }
}

/// Whether a subject with this stem would write its CSV over one of the
/// merged datasets, as a plugin or as a preset. Compared case-insensitively.
pub fn collides_with_merged_output(stem: &str) -> bool {
    let candidates = [
        format!("{stem}_benchmark.csv"),
        format!("{}.csv", safe_file_stem(stem)),
    ];
    candidates.iter().any(|name| {
        name.eq_ignore_ascii_case(MERGED_PLUGINS_FILE)
            || name.eq_ignore_ascii_case(MERGED_PRESETS_FILE)
    })
}

/// Replace every character other than alphanumerics, `-` and `_` with `_`.
pub fn safe_file_stem(stem: &str) -> String {
    stem.chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name(path))
}
