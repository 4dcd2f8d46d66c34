//! plugbench - batch benchmark supervisor for audio plugins
//!
//! ## Commands
//!
//! - `plugins`: benchmark every plugin bundle in a directory
//! - `presets`: benchmark one plugin against every preset in a directory
//! - `validate`: check that each preset applies its parameters
//! - `merge`: combine per-subject CSVs into one dataset
//! - `chart`: render a four-panel PNG from one result CSV
//! - `measure`: run a single measurement and print a quick table

mod progress;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use plugbench_core::{
    discover_subjects, load_results, merge_results, parse_block_sizes, render_chart,
    render_validation_report, BenchError, BitDepth, FailurePolicy, FailureReason, LogSettings,
    MergeSource, RunConfig, RunOutcome, Subject, DEFAULT_BENCH_TIMEOUT_SECS,
    DEFAULT_VALIDATION_TIMEOUT_SECS, GENERIC_ERROR_EXIT, PLUGIN_PATTERN, PRESET_PATTERN,
};
use plugbench_runner::{
    locate_tool, BatchKind, BatchOptions, BatchOutput, BenchmarkPipeline, RegexVerifierParser,
    Supervisor, SupervisorPolicy, TokioLauncher, ValidationPipeline, PLUGPARAMS, PLUGPERF,
};

use crate::progress::SpinnerProgress;

#[derive(Parser)]
#[command(name = "plugbench")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Batch benchmark supervisor for audio plugins and presets", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true, env = "PLUGBENCH_VERBOSE")]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true, env = "PLUGBENCH_LOG_JSON")]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Measurement settings shared by every command that runs `plugperf`.
#[derive(Args, Debug, Clone)]
struct RunArgs {
    /// Sample rate in Hz
    #[arg(long = "sr", env = "PLUGBENCH_SAMPLE_RATE", default_value_t = 48_000)]
    sample_rate: u32,

    /// Channel count
    #[arg(long, env = "PLUGBENCH_CHANNELS", default_value_t = 2)]
    channels: u32,

    /// Sample format: 32f or 64f
    #[arg(long, env = "PLUGBENCH_BITS", default_value = "32f")]
    bits: BitDepth,

    /// Comma-separated block sizes
    #[arg(long, env = "PLUGBENCH_BUFFERS", default_value = "64,256,1024,4096")]
    buffers: String,

    /// Warmup iterations per block size
    #[arg(long, env = "PLUGBENCH_WARMUP", default_value_t = 40)]
    warmup: u32,

    /// Timed iterations per block size
    #[arg(long, env = "PLUGBENCH_ITERATIONS", default_value_t = 200)]
    iterations: u32,

    /// Per-subject timeout in seconds
    #[arg(long, env = "PLUGBENCH_TIMEOUT", default_value_t = DEFAULT_BENCH_TIMEOUT_SECS)]
    timeout: u64,

    /// Path to the plugperf binary (searched in build/ when omitted)
    #[arg(long, env = "PLUGBENCH_PLUGPERF")]
    plugperf: Option<PathBuf>,
}

impl RunArgs {
    fn to_config(&self) -> Result<RunConfig> {
        let block_sizes = parse_block_sizes(&self.buffers).map_err(anyhow::Error::msg)?;
        Ok(RunConfig {
            sample_rate: self.sample_rate,
            channels: self.channels,
            bit_depth: self.bits,
            block_sizes,
            warmup: self.warmup,
            iterations: self.iterations,
            timeout_secs: self.timeout,
        })
    }
}

/// Batch behaviour shared by `plugins` and `presets`.
#[derive(Args, Debug, Clone)]
struct BatchArgs {
    /// Continue past failed subjects instead of stopping at the first one
    #[arg(long, env = "PLUGBENCH_SKIP_ERRORS")]
    skip_errors: bool,

    /// Do not merge per-subject CSVs after the batch
    #[arg(long)]
    no_merge: bool,
}

impl BatchArgs {
    fn policy(&self) -> FailurePolicy {
        if self.skip_errors {
            FailurePolicy::SkipErrors
        } else {
            FailurePolicy::StopOnFirstFailure
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum ReportFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Benchmark every plugin bundle in a directory
    Plugins {
        /// Directory containing plugin bundles
        #[arg(short, long, env = "PLUGBENCH_PLUGIN_DIR")]
        dir: PathBuf,

        /// Output directory for CSVs and reports
        #[arg(short, long, env = "PLUGBENCH_OUTPUT", default_value = "benchmark_results")]
        output: PathBuf,

        /// File name pattern for bundles
        #[arg(long, default_value = PLUGIN_PATTERN)]
        pattern: String,

        /// Benchmark at most this many plugins
        #[arg(long)]
        max_subjects: Option<usize>,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Benchmark one plugin against every preset in a directory
    Presets {
        /// Plugin bundle to load presets into
        #[arg(short, long)]
        plugin: PathBuf,

        /// Directory containing preset JSON files
        #[arg(long)]
        presets: PathBuf,

        /// Output directory for CSVs and reports
        #[arg(short, long, env = "PLUGBENCH_OUTPUT", default_value = "preset_benchmarks")]
        output: PathBuf,

        /// File name pattern for presets
        #[arg(long, default_value = PRESET_PATTERN)]
        pattern: String,

        /// Benchmark at most this many presets
        #[arg(long)]
        max_presets: Option<usize>,

        #[command(flatten)]
        run: RunArgs,

        #[command(flatten)]
        batch: BatchArgs,
    },

    /// Check that every preset in a directory applies its parameters
    Validate {
        /// Plugin bundle to load presets into
        #[arg(short, long)]
        plugin: PathBuf,

        /// Directory containing preset JSON files
        #[arg(long)]
        presets: PathBuf,

        /// File name pattern for presets
        #[arg(long, default_value = PRESET_PATTERN)]
        pattern: String,

        /// Validate at most this many presets
        #[arg(long)]
        max_presets: Option<usize>,

        /// Per-preset timeout in seconds
        #[arg(long, env = "PLUGBENCH_VALIDATION_TIMEOUT", default_value_t = DEFAULT_VALIDATION_TIMEOUT_SECS)]
        timeout: u64,

        /// Path to the plugparams binary (searched in build/ when omitted)
        #[arg(long, env = "PLUGBENCH_PLUGPARAMS")]
        plugparams: Option<PathBuf>,

        /// Report format
        #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
        format: ReportFormat,

        /// Write the report here instead of stdout
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Merge per-subject CSVs (files or directories of CSVs) into one file
    Merge {
        /// CSV files or directories
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Merged output file
        #[arg(short, long, default_value = "merged_benchmark.csv")]
        output: PathBuf,
    },

    /// Render a four-panel PNG from one result CSV
    Chart {
        /// Result CSV written by plugperf
        csv: PathBuf,

        /// Output PNG (defaults to the CSV path with a .png extension)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Chart title (defaults to the plugin name in the CSV)
        #[arg(long)]
        title: Option<String>,
    },

    /// Run one measurement and print a quick table
    Measure {
        /// Plugin bundle to measure
        #[arg(short, long)]
        plugin: PathBuf,

        /// Result CSV path
        #[arg(long, default_value = "plugperf_measure.csv")]
        out: PathBuf,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    plugbench_core::init_tracing(&LogSettings::from_flags(cli.verbose, cli.json));

    let interactive = !cli.json && std::io::stderr().is_terminal();
    match run(cli.command, interactive).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::from(exit_code_for(&e))
        }
    }
}

async fn run(command: Commands, interactive: bool) -> Result<ExitCode> {
    match command {
        Commands::Plugins {
            dir,
            output,
            pattern,
            max_subjects,
            run,
            batch,
        } => cmd_plugins(&dir, &output, &pattern, max_subjects, &run, &batch, interactive).await,
        Commands::Presets {
            plugin,
            presets,
            output,
            pattern,
            max_presets,
            run,
            batch,
        } => {
            cmd_presets(
                &plugin,
                &presets,
                &output,
                &pattern,
                max_presets,
                &run,
                &batch,
                interactive,
            )
            .await
        }
        Commands::Validate {
            plugin,
            presets,
            pattern,
            max_presets,
            timeout,
            plugparams,
            format,
            report,
        } => {
            cmd_validate(
                &plugin,
                &presets,
                &pattern,
                max_presets,
                timeout,
                plugparams.as_deref(),
                format,
                report.as_deref(),
                interactive,
            )
            .await
        }
        Commands::Merge { inputs, output } => cmd_merge(&inputs, &output),
        Commands::Chart {
            csv,
            output,
            title,
        } => cmd_chart(&csv, output.as_deref(), title.as_deref()),
        Commands::Measure { plugin, out, run } => cmd_measure(&plugin, &out, &run, interactive).await,
    }
}

/// Exit code for a fatal error: the [`BenchError`] class when there is one.
fn exit_code_for(error: &anyhow::Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<BenchError>())
        .map(BenchError::exit_code)
        .unwrap_or(GENERIC_ERROR_EXIT)
}

fn batch_exit_code(clean: bool) -> ExitCode {
    if clean {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    }
}

/// Discover subjects and apply an optional limit.
fn discover(dir: &Path, pattern: &str, limit: Option<usize>) -> Result<Vec<PathBuf>, BenchError> {
    let mut found = discover_subjects(dir, pattern)?;
    if let Some(limit) = limit {
        found.truncate(limit);
    }
    Ok(found)
}

fn require_artifact(path: &Path) -> Result<(), BenchError> {
    if path.exists() {
        Ok(())
    } else {
        Err(BenchError::ArtifactMissing(path.to_path_buf()))
    }
}

fn supervisor(policy: SupervisorPolicy, interactive: bool) -> Supervisor {
    let supervisor = Supervisor::new(Arc::new(TokioLauncher), policy);
    if interactive {
        supervisor.with_observer(Arc::new(SpinnerProgress::default()))
    } else {
        supervisor
    }
}

fn benchmark_pipeline(run: &RunArgs, interactive: bool) -> Result<BenchmarkPipeline> {
    let cwd = std::env::current_dir().context("read current directory")?;
    let tool = locate_tool(run.plugperf.as_deref(), PLUGPERF, &cwd)?;
    info!(tool = %tool.display(), "using measurement tool");
    let policy = SupervisorPolicy::benchmark().with_timeout(Duration::from_secs(run.timeout));
    Ok(BenchmarkPipeline::new(supervisor(policy, interactive), tool))
}

fn print_batch(output: &BatchOutput) {
    let batch = &output.result;
    println!();
    println!("Batch: {}", batch.batch_id);
    println!(
        "Status: {}",
        if batch.is_clean() { "✓ CLEAN" } else { "✗ FAILURES" }
    );
    println!(
        "Tested: {}/{}  Successful: {}  Failed: {}  ({:.1}%)",
        batch.entries().len(),
        batch.discovered,
        batch.success_count(),
        batch.failure_count(),
        batch.success_rate()
    );
    if batch.halted_early {
        println!("Stopped after the first failure (use --skip-errors to continue)");
    }
    println!();
    for entry in batch.entries() {
        match entry.outcome.diagnostic() {
            None => println!("  ✓ {} ({}ms)", entry.subject, entry.duration_ms),
            Some(d) => println!("  ✗ {} ({}ms): {}", entry.subject, entry.duration_ms, d),
        }
    }
    println!();
    println!("Reports: {}", output.reports.text.display());
    println!("         {}", output.reports.json.display());
    if let Some(merged) = &output.merged {
        println!(
            "Merged:  {} ({} rows from {} files)",
            merged.output.display(),
            merged.rows,
            merged.files_merged
        );
    }
}

async fn cmd_plugins(
    dir: &Path,
    output: &Path,
    pattern: &str,
    max_subjects: Option<usize>,
    run: &RunArgs,
    batch: &BatchArgs,
    interactive: bool,
) -> Result<ExitCode> {
    let config = run.to_config()?;
    let pipeline = benchmark_pipeline(run, interactive)?;
    let subjects: Vec<Subject> = discover(dir, pattern, max_subjects)?
        .into_iter()
        .map(Subject::plugin)
        .collect();

    println!("Benchmarking {} plugins from {}", subjects.len(), dir.display());
    let options = BatchOptions::new(BatchKind::Plugins, output)
        .with_config(config)
        .with_policy(batch.policy())
        .with_merge(!batch.no_merge);
    let result = pipeline.run_batch(&subjects, &options).await?;

    print_batch(&result);
    Ok(batch_exit_code(result.result.is_clean()))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_presets(
    plugin: &Path,
    presets: &Path,
    output: &Path,
    pattern: &str,
    max_presets: Option<usize>,
    run: &RunArgs,
    batch: &BatchArgs,
    interactive: bool,
) -> Result<ExitCode> {
    require_artifact(plugin)?;
    let config = run.to_config()?;
    let pipeline = benchmark_pipeline(run, interactive)?;
    let subjects: Vec<Subject> = discover(presets, pattern, max_presets)?
        .into_iter()
        .map(|preset| Subject::preset(plugin, preset))
        .collect();

    println!(
        "Benchmarking {} presets of {} from {}",
        subjects.len(),
        plugin.display(),
        presets.display()
    );
    let options = BatchOptions::new(BatchKind::Presets, output)
        .with_config(config)
        .with_policy(batch.policy())
        .with_merge(!batch.no_merge);
    let result = pipeline.run_batch(&subjects, &options).await?;

    print_batch(&result);
    Ok(batch_exit_code(result.result.is_clean()))
}

#[allow(clippy::too_many_arguments)]
async fn cmd_validate(
    plugin: &Path,
    presets: &Path,
    pattern: &str,
    max_presets: Option<usize>,
    timeout: u64,
    plugparams: Option<&Path>,
    format: ReportFormat,
    report_path: Option<&Path>,
    interactive: bool,
) -> Result<ExitCode> {
    require_artifact(plugin)?;
    let cwd = std::env::current_dir().context("read current directory")?;
    let tool = locate_tool(plugparams, PLUGPARAMS, &cwd)?;
    let preset_files = discover(presets, pattern, max_presets)?;

    let parser = RegexVerifierParser::new().context("compile verifier patterns")?;
    let policy = SupervisorPolicy::validation().with_timeout(Duration::from_secs(timeout));
    let pipeline = ValidationPipeline::new(supervisor(policy, interactive), tool, Arc::new(parser));
    let report = pipeline.run(plugin, &preset_files).await;

    let rendered = match format {
        ReportFormat::Text => render_validation_report(&report, presets),
        ReportFormat::Json => {
            serde_json::to_string_pretty(&report).context("serialize validation report")?
        }
    };
    match report_path {
        Some(path) => {
            std::fs::write(path, &rendered).with_context(|| format!("write {:?}", path))?;
            println!("Report written to {}", path.display());
        }
        None => println!("{rendered}"),
    }

    Ok(batch_exit_code(report.is_clean()))
}

/// Expand directories to the CSVs they contain, skipping `output` itself.
fn collect_merge_inputs(inputs: &[PathBuf], output: &Path) -> Result<Vec<PathBuf>, BenchError> {
    let mut files = Vec::new();
    for input in inputs {
        if input.is_dir() {
            files.extend(
                discover_subjects(input, "*.csv")?
                    .into_iter()
                    .filter(|p| p.file_name() != output.file_name() || p.parent() != output.parent()),
            );
        } else {
            files.push(input.clone());
        }
    }
    Ok(files)
}

fn cmd_merge(inputs: &[PathBuf], output: &Path) -> Result<ExitCode> {
    let sources: Vec<MergeSource> = collect_merge_inputs(inputs, output)?
        .into_iter()
        .map(MergeSource::from_path)
        .collect();
    let report = merge_results(&sources, output)?;

    println!(
        "Merged {} rows from {} files into {}",
        report.rows,
        report.files_merged,
        report.output.display()
    );
    if report.files_skipped > 0 {
        println!("Skipped {} missing or empty files", report.files_skipped);
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_chart(csv: &Path, output: Option<&Path>, title: Option<&str>) -> Result<ExitCode> {
    require_artifact(csv)?;
    let rows = load_results(csv).with_context(|| format!("load {:?}", csv))?;

    let title = match title {
        Some(t) => t.to_string(),
        None => rows
            .first()
            .map(|r| r.plugin_name.clone())
            .unwrap_or_else(|| csv.display().to_string()),
    };
    let output = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| csv.with_extension("png"));

    render_chart(&rows, &title, &output).map_err(BenchError::from)?;
    println!("Chart written to {}", output.display());
    Ok(ExitCode::SUCCESS)
}

async fn cmd_measure(plugin: &Path, out: &Path, run: &RunArgs, interactive: bool) -> Result<ExitCode> {
    require_artifact(plugin)?;
    let config = run.to_config()?;
    let pipeline = benchmark_pipeline(run, interactive)?;
    let subject = Subject::plugin(plugin);

    let outcome = pipeline.run_subject(&subject, &config, out).await;
    if is_missing_output(&outcome, out) {
        return Err(BenchError::ArtifactMissing(out.to_path_buf()).into());
    }
    match &outcome {
        RunOutcome::Success { rows } => {
            println!(
                "{:>10} {:>12} {:>12} {:>14}",
                "block_size", "median_us", "p95_us", "approx_rt_cpu%"
            );
            for row in rows {
                println!(
                    "{:>10} {:>12.2} {:>12.2} {:>14.2}",
                    row.block_size, row.median_us, row.p95_us, row.approx_rt_cpu_pct
                );
            }
            println!("\nWrote {}", out.display());
        }
        other => {
            eprintln!(
                "✗ {}: {}",
                subject.name,
                other.diagnostic().unwrap_or_default()
            );
        }
    }
    Ok(ExitCode::from(measure_exit_code(&outcome)))
}

/// The tool exited cleanly but never wrote its CSV.
fn is_missing_output(outcome: &RunOutcome, out: &Path) -> bool {
    matches!(
        outcome,
        RunOutcome::Failed {
            reason: FailureReason::Parse,
            ..
        }
    ) && !out.is_file()
}

/// Follow the child's exit code where there is one.
fn measure_exit_code(outcome: &RunOutcome) -> u8 {
    match outcome {
        RunOutcome::Success { .. } => 0,
        RunOutcome::Failed {
            reason: FailureReason::NonZeroExit { code },
            ..
        } => u8::try_from(*code).ok().filter(|c| *c != 0).unwrap_or(1),
        _ => 1,
    }
}
