//! Preset validation sweep.

use plugbench_core::{
    emit_validation_finished, ValidationOutcome, ValidationRecord, ValidationReport,
    TIMEOUT_DIAGNOSTIC,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::supervisor::{ProcessOutcome, Supervisor};
use crate::tool::{verifier_args, ToolInvocation};
use crate::verifier::VerifierOutputParser;

/// Map a supervised verifier run onto a validation outcome. The exit code
/// is ignored; only the text decides.
pub fn classify_verification(
    process: ProcessOutcome,
    parser: &dyn VerifierOutputParser,
) -> ValidationOutcome {
    match process {
        ProcessOutcome::Completed { output, .. } => parser.parse(&output.combined()),
        ProcessOutcome::TimedOut { .. } => ValidationOutcome::failed(TIMEOUT_DIAGNOSTIC),
        ProcessOutcome::SpawnFailed { error } => ValidationOutcome::failed(error),
    }
}

/// Runs the verifier over every preset. Never stops early.
pub struct ValidationPipeline {
    supervisor: Supervisor,
    tool: PathBuf,
    parser: Arc<dyn VerifierOutputParser>,
}

impl ValidationPipeline {
    pub fn new(
        supervisor: Supervisor,
        tool: impl Into<PathBuf>,
        parser: Arc<dyn VerifierOutputParser>,
    ) -> Self {
        Self {
            supervisor,
            tool: tool.into(),
            parser,
        }
    }

    pub async fn run(&self, plugin: &Path, presets: &[PathBuf]) -> ValidationReport {
        let mut records = Vec::with_capacity(presets.len());

        for (index, preset) in presets.iter().enumerate() {
            let subject = preset
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| preset.display().to_string());
            info!(index = index + 1, total = presets.len(), preset = %subject, "validating");

            let invocation = ToolInvocation::new(&self.tool, verifier_args(plugin, preset));
            let process = self.supervisor.supervise(&subject, &invocation).await;
            let outcome = classify_verification(process, self.parser.as_ref());

            if outcome.success {
                info!(preset = %subject, applied = outcome.applied, total = outcome.total, "preset valid");
            } else {
                warn!(preset = %subject, diagnostic = %outcome.diagnostic, "preset invalid");
            }
            records.push(ValidationRecord { subject, outcome });
        }

        let plugin_name = plugin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| plugin.display().to_string());
        let report = ValidationReport::new(plugin_name, records);
        emit_validation_finished(
            &report.plugin,
            report.summary.total,
            report.summary.successful,
            report.summary.success_rate,
        );
        report
    }
}
