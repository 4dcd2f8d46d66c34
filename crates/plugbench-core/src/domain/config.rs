//! Batch run configuration shared read-only across every subject.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Default per-subject timeout for benchmark runs.
pub const DEFAULT_BENCH_TIMEOUT_SECS: u64 = 300;

/// Default per-subject timeout for validation runs.
pub const DEFAULT_VALIDATION_TIMEOUT_SECS: u64 = 30;

/// Sample format the measurement tool processes with.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum BitDepth {
    #[default]
    #[serde(rename = "32f")]
    Float32,
    #[serde(rename = "64f")]
    Float64,
}

impl BitDepth {
    /// The flag value understood by plugperf.
    pub fn as_str(&self) -> &'static str {
        match self {
            BitDepth::Float32 => "32f",
            BitDepth::Float64 => "64f",
        }
    }
}

impl fmt::Display for BitDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BitDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "32f" => Ok(BitDepth::Float32),
            "64f" => Ok(BitDepth::Float64),
            other => Err(format!("unsupported bit depth {other:?} (expected 32f or 64f)")),
        }
    }
}

/// Measurement parameters for one batch invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunConfig {
    /// Sample rate in Hz.
    pub sample_rate: u32,

    /// Channel count.
    pub channels: u32,

    /// Processing precision.
    pub bit_depth: BitDepth,

    /// Block sizes in the order they are measured.
    pub block_sizes: Vec<u32>,

    /// Untimed iterations per block size.
    pub warmup: u32,

    /// Timed iterations per block size.
    pub iterations: u32,

    /// Hard wall-clock limit per subject.
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48_000,
            channels: 2,
            bit_depth: BitDepth::Float32,
            block_sizes: vec![64, 256, 1024, 4096],
            warmup: 40,
            iterations: 200,
            timeout_secs: DEFAULT_BENCH_TIMEOUT_SECS,
        }
    }
}

impl RunConfig {
    /// Comma-joined block sizes, as passed to `--buffers`.
    pub fn buffers_arg(&self) -> String {
        self.block_sizes
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Stable SHA-256 digest over the canonical configuration fields.
    ///
    /// Two reports with equal digests were produced with identical settings.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.sample_rate.to_le_bytes());
        hasher.update(self.channels.to_le_bytes());
        hasher.update(self.bit_depth.as_str().as_bytes());
        hasher.update(b"\0");
        for block in &self.block_sizes {
            hasher.update(block.to_le_bytes());
        }
        hasher.update(b"\0");
        hasher.update(self.warmup.to_le_bytes());
        hasher.update(self.iterations.to_le_bytes());
        hasher.update(self.timeout_secs.to_le_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Parse a comma-separated block-size list such as `64,256,1024`.
pub fn parse_block_sizes(raw: &str) -> Result<Vec<u32>, String> {
    let sizes = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u32>()
                .map_err(|e| format!("invalid block size {s:?}: {e}"))
                .and_then(|v| {
                    if v == 0 {
                        Err("block size must be positive".to_string())
                    } else {
                        Ok(v)
                    }
                })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if sizes.is_empty() {
        return Err("at least one block size is required".to_string());
    }
    Ok(sizes)
}
