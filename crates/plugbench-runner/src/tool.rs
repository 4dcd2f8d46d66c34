//! External tool location and argument building.

use plugbench_core::{BenchError, RunConfig, Subject};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Measurement tool binary name.
pub const PLUGPERF: &str = "plugperf";

/// Parameter verifier binary name.
pub const PLUGPARAMS: &str = "plugparams";

/// A fully-resolved command line for one child process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl ToolInvocation {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// Human-readable command line for logs.
    pub fn display(&self) -> String {
        let mut line = self.program.display().to_string();
        for arg in &self.args {
            line.push(' ');
            if arg.contains(' ') {
                line.push('"');
                line.push_str(arg);
                line.push('"');
            } else {
                line.push_str(arg);
            }
        }
        line
    }
}

/// Arguments for one measurement run of `subject` writing to `out`.
pub fn measurement_args(subject: &Subject, config: &RunConfig, out: &Path) -> Vec<String> {
    let mut args = vec![
        "--plugin".to_string(),
        subject.plugin_path.display().to_string(),
    ];
    if let Some(preset) = &subject.preset_path {
        args.push("--preset-json".to_string());
        args.push(preset.display().to_string());
    }
    args.extend([
        "--sr".to_string(),
        config.sample_rate.to_string(),
        "--channels".to_string(),
        config.channels.to_string(),
        "--bits".to_string(),
        config.bit_depth.to_string(),
        "--buffers".to_string(),
        config.buffers_arg(),
        "--warmup".to_string(),
        config.warmup.to_string(),
        "--iterations".to_string(),
        config.iterations.to_string(),
        "--out".to_string(),
        out.display().to_string(),
    ]);
    args
}

/// Arguments for one verifier run of `preset` against `plugin`.
pub fn verifier_args(plugin: &Path, preset: &Path) -> Vec<String> {
    vec![
        "--plugin".to_string(),
        plugin.display().to_string(),
        "--preset-json".to_string(),
        preset.display().to_string(),
    ]
}

/// Default search locations for `tool`, relative to the working directory.
pub fn tool_candidates(tool: &str) -> Vec<PathBuf> {
    vec![
        Path::new("build").join(tool),
        Path::new("build").join("Release").join(tool),
        Path::new(".").join(tool),
    ]
}

/// Resolve the binary for `tool`.
///
/// An explicit path must exist. Otherwise [`tool_candidates`] are tried in
/// order relative to `base`.
pub fn locate_tool(explicit: Option<&Path>, tool: &str, base: &Path) -> Result<PathBuf, BenchError> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Ok(path.to_path_buf());
        }
        return Err(BenchError::ToolMissing {
            tool: tool.to_string(),
            searched: path.display().to_string(),
        });
    }

    let candidates = tool_candidates(tool);
    for candidate in &candidates {
        let full = base.join(candidate);
        if full.is_file() {
            debug!(tool, path = %full.display(), "located tool");
            return Ok(full);
        }
    }

    Err(BenchError::ToolMissing {
        tool: tool.to_string(),
        searched: candidates
            .iter()
            .map(|c| c.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}
