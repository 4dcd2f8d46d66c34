//! Interpretation of `plugparams` output.

use plugbench_core::{ValidationOutcome, NO_OUTPUT_DIAGNOSTIC};
use regex::Regex;

/// Turns verifier output into a [`ValidationOutcome`].
pub trait VerifierOutputParser: Send + Sync {
    fn parse(&self, output: &str) -> ValidationOutcome;
}

const APPLIED_PATTERN: &str = r"Applied (\d+) parameters";
const TOTAL_PATTERN: &str = r"Total parameters in preset: (\d+)";
const ERROR_MARKERS: [&str; 2] = ["ERROR", "Failed"];
const MAX_ERROR_LINES: usize = 3;

/// Pattern-matching parser for the verifier's text output.
#[derive(Debug, Clone)]
pub struct RegexVerifierParser {
    applied: Regex,
    total: Regex,
}

impl RegexVerifierParser {
    pub fn new() -> Result<Self, regex::Error> {
        Self::with_patterns(APPLIED_PATTERN, TOTAL_PATTERN)
    }

    /// Both patterns must capture the count as group 1.
    pub fn with_patterns(applied: &str, total: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            applied: Regex::new(applied)?,
            total: Regex::new(total)?,
        })
    }

    fn capture_count(re: &Regex, text: &str) -> Option<u32> {
        re.captures(text)?.get(1)?.as_str().parse().ok()
    }
}

impl VerifierOutputParser for RegexVerifierParser {
    fn parse(&self, output: &str) -> ValidationOutcome {
        if let Some(applied) = Self::capture_count(&self.applied, output) {
            let total = Self::capture_count(&self.total, output).unwrap_or(applied);
            return ValidationOutcome::passed(applied, total);
        }

        let errors: Vec<&str> = output
            .lines()
            .filter(|line| ERROR_MARKERS.iter().any(|m| line.contains(m)))
            .map(str::trim)
            .take(MAX_ERROR_LINES)
            .collect();
        if errors.is_empty() {
            ValidationOutcome::failed(NO_OUTPUT_DIAGNOSTIC)
        } else {
            ValidationOutcome::failed(errors.join("; "))
        }
    }
}
