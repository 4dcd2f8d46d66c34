//! Subject discovery: enumerate plugin bundles or preset files in a directory.

use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use crate::domain::error::DiscoveryError;
use crate::domain::subject::collides_with_merged_output;

/// Index file that sits alongside presets but is not itself a preset.
pub const PRESET_INDEX_FILE: &str = "preset_index.json";

/// Default pattern for plugin bundle discovery.
pub const PLUGIN_PATTERN: &str = "*.vst3";

/// Default pattern for preset discovery.
pub const PRESET_PATTERN: &str = "*.json";

/// List entries of `dir` whose file name matches `pattern`, sorted.
///
/// Matching is case-insensitive so `*.vst3` also picks up `Foo.VST3`. Both
/// files and directories qualify (VST3 bundles are directories on macOS).
/// [`PRESET_INDEX_FILE`] is never returned, nor is any entry whose CSV would
/// overwrite a merged dataset.
pub fn discover_subjects(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, DiscoveryError> {
    if !dir.is_dir() {
        return Err(DiscoveryError::DirectoryNotFound(dir.to_path_buf()));
    }

    let matcher = Pattern::new(pattern).map_err(|e| DiscoveryError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;
    let options = MatchOptions {
        case_sensitive: false,
        require_literal_separator: true,
        require_literal_leading_dot: true,
    };

    let entries = std::fs::read_dir(dir).map_err(|source| DiscoveryError::Io {
        dir: dir.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|source| DiscoveryError::Io {
            dir: dir.to_path_buf(),
            source,
        })?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if name == PRESET_INDEX_FILE {
            debug!(file = %name, "skipping preset index");
            continue;
        }
        if !matcher.matches_with(&name, options) {
            continue;
        }
        let path = entry.path();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        if collides_with_merged_output(&stem) {
            warn!(file = %name, "skipping entry whose output would overwrite a merged dataset");
            continue;
        }
        found.push(path);
    }

    if found.is_empty() {
        return Err(DiscoveryError::NoMatches {
            dir: dir.to_path_buf(),
            pattern: pattern.to_string(),
        });
    }

    found.sort();
    debug!(dir = %dir.display(), count = found.len(), "discovered subjects");
    Ok(found)
}
