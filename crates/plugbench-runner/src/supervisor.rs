//! Run supervision: spawn, poll, heartbeat, kill on timeout.

use plugbench_core::{
    emit_heartbeat, DEFAULT_BENCH_TIMEOUT_SECS, DEFAULT_VALIDATION_TIMEOUT_SECS, METRICS,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::process::{CapturedOutput, ProcessLauncher};
use crate::tool::ToolInvocation;

/// How often liveness is checked.
pub const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// How often a heartbeat is reported while the child runs.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(2);

const SPINNER: [char; 4] = ['|', '/', '-', '\\'];

/// Timing knobs for one supervised run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupervisorPolicy {
    pub timeout: Duration,
    pub poll_interval: Duration,
    pub heartbeat_interval: Duration,
}

impl SupervisorPolicy {
    /// Measurement runs: 300 s.
    pub fn benchmark() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_BENCH_TIMEOUT_SECS),
            poll_interval: POLL_INTERVAL,
            heartbeat_interval: HEARTBEAT_INTERVAL,
        }
    }

    /// Verifier runs: 30 s.
    pub fn validation() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_VALIDATION_TIMEOUT_SECS),
            ..Self::benchmark()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SupervisorPolicy {
    fn default() -> Self {
        Self::benchmark()
    }
}

/// Periodic progress for a running child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heartbeat {
    pub elapsed: Duration,
    pub indicator: char,
}

/// Result of advancing [`PollState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Continue,
    Heartbeat(Heartbeat),
    Expired,
}

/// Poll bookkeeping for one child, advanced from elapsed time alone.
#[derive(Debug, Clone)]
pub struct PollState {
    timeout: Duration,
    heartbeat_interval: Duration,
    next_heartbeat: Duration,
    frame: usize,
}

impl PollState {
    pub fn new(policy: &SupervisorPolicy) -> Self {
        Self {
            timeout: policy.timeout,
            heartbeat_interval: policy.heartbeat_interval,
            next_heartbeat: policy.heartbeat_interval,
            frame: 0,
        }
    }

    pub fn advance(&mut self, elapsed: Duration) -> Tick {
        if elapsed > self.timeout {
            return Tick::Expired;
        }
        if self.heartbeat_interval.is_zero() || elapsed < self.next_heartbeat {
            return Tick::Continue;
        }
        while self.next_heartbeat <= elapsed {
            self.next_heartbeat += self.heartbeat_interval;
        }
        let indicator = SPINNER[self.frame % SPINNER.len()];
        self.frame += 1;
        Tick::Heartbeat(Heartbeat { elapsed, indicator })
    }
}

/// Terminal state of a supervised run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessOutcome {
    Completed {
        exit_code: i32,
        output: CapturedOutput,
        elapsed: Duration,
    },
    TimedOut {
        elapsed: Duration,
    },
    SpawnFailed {
        error: String,
    },
}

impl ProcessOutcome {
    pub fn elapsed(&self) -> Duration {
        match self {
            ProcessOutcome::Completed { elapsed, .. } | ProcessOutcome::TimedOut { elapsed } => {
                *elapsed
            }
            ProcessOutcome::SpawnFailed { .. } => Duration::ZERO,
        }
    }
}

/// Receives progress for supervised runs.
pub trait ProgressObserver: Send + Sync {
    fn on_start(&self, _label: &str) {}
    fn on_heartbeat(&self, label: &str, beat: &Heartbeat);
    fn on_finish(&self, _label: &str, _outcome: &ProcessOutcome) {}
}

/// Reports heartbeats as structured log events.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_heartbeat(&self, label: &str, beat: &Heartbeat) {
        emit_heartbeat(label, beat.elapsed);
    }
}

/// Runs one child at a time under a [`SupervisorPolicy`].
#[derive(Clone)]
pub struct Supervisor {
    launcher: Arc<dyn ProcessLauncher>,
    observer: Arc<dyn ProgressObserver>,
    policy: SupervisorPolicy,
}

impl Supervisor {
    pub fn new(launcher: Arc<dyn ProcessLauncher>, policy: SupervisorPolicy) -> Self {
        Self {
            launcher,
            observer: Arc::new(LogProgress),
            policy,
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn policy(&self) -> &SupervisorPolicy {
        &self.policy
    }

    /// Run `invocation` to completion, timeout or spawn failure. Never
    /// returns an error: every failure mode is a [`ProcessOutcome`].
    pub async fn supervise(&self, label: &str, invocation: &ToolInvocation) -> ProcessOutcome {
        self.observer.on_start(label);
        debug!(command = %invocation.display(), "spawning");

        let outcome = self.run(label, invocation).await;
        self.observer.on_finish(label, &outcome);
        outcome
    }

    /// Time left for draining pipes after the child exits: the rest of the
    /// timeout, but at least one poll interval.
    fn drain_budget(&self, elapsed: Duration) -> Duration {
        self.policy
            .timeout
            .saturating_sub(elapsed)
            .max(self.policy.poll_interval)
    }

    async fn run(&self, label: &str, invocation: &ToolInvocation) -> ProcessOutcome {
        let mut child = match self.launcher.launch(invocation) {
            Ok(child) => child,
            Err(e) => {
                warn!(subject = %label, error = %e, "spawn failed");
                return ProcessOutcome::SpawnFailed {
                    error: e.to_string(),
                };
            }
        };
        METRICS.record_spawn();

        let start = Instant::now();
        let mut poll = PollState::new(&self.policy);

        loop {
            match child.try_wait() {
                Ok(Some(exit_code)) => {
                    let elapsed = start.elapsed();
                    let output = child.collect_output(self.drain_budget(elapsed)).await;
                    return ProcessOutcome::Completed {
                        exit_code,
                        output,
                        elapsed,
                    };
                }
                Ok(None) => {}
                Err(e) => {
                    warn!(subject = %label, error = %e, "lost track of child");
                    if let Err(e) = child.kill().await {
                        debug!(error = %e, "kill after wait error");
                    }
                    return ProcessOutcome::SpawnFailed {
                        error: e.to_string(),
                    };
                }
            }

            let elapsed = start.elapsed();
            match poll.advance(elapsed) {
                Tick::Expired => {
                    warn!(
                        subject = %label,
                        timeout_secs = self.policy.timeout.as_secs(),
                        "timeout, killing child"
                    );
                    if let Err(e) = child.kill().await {
                        warn!(subject = %label, error = %e, "kill failed");
                    }
                    METRICS.record_kill();
                    return ProcessOutcome::TimedOut { elapsed };
                }
                Tick::Heartbeat(beat) => {
                    METRICS.record_heartbeat();
                    self.observer.on_heartbeat(label, &beat);
                }
                Tick::Continue => {}
            }

            tokio::time::sleep(self.policy.poll_interval).await;
        }
    }
}
