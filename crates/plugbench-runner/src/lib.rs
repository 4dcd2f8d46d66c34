//! plugbench runner
//!
//! Supervised execution of the external measurement and verifier tools:
//! - Spawns one child at a time behind a launcher seam
//! - Enforces timeouts, reports heartbeats
//! - Classifies each run and feeds the batch log

pub mod pipeline;
pub mod process;
pub mod supervisor;
pub mod tool;
pub mod validation;
pub mod verifier;

pub use pipeline::{
    classify_measurement, BatchKind, BatchOptions, BatchOutput, BenchmarkPipeline,
    PRESET_LOADED_MARKER,
};
pub use process::{CapturedOutput, ChildProcess, ProcessLauncher, TokioLauncher};
pub use supervisor::{
    Heartbeat, LogProgress, PollState, ProcessOutcome, ProgressObserver, Supervisor,
    SupervisorPolicy, Tick, HEARTBEAT_INTERVAL, POLL_INTERVAL,
};
pub use tool::{
    locate_tool, measurement_args, tool_candidates, verifier_args, ToolInvocation, PLUGPARAMS,
    PLUGPERF,
};
pub use validation::{classify_verification, ValidationPipeline};
pub use verifier::{RegexVerifierParser, VerifierOutputParser};
