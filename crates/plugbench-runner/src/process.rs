//! Process launching seam.
//!
//! The supervisor only sees [`ProcessLauncher`] and [`ChildProcess`], so tests
//! can substitute a scripted child and drive it with tokio's paused clock.

use async_trait::async_trait;
use std::io;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::tool::ToolInvocation;

/// Text captured from a child's pipes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut text = self.stdout.clone();
        if !text.is_empty() && !text.ends_with('\n') && !self.stderr.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stderr);
        text
    }
}

/// A running child process.
#[async_trait]
pub trait ChildProcess: Send {
    /// Exit code once the child has exited, `None` while it runs. A child
    /// killed by a signal reports `-1`.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;

    /// Forcibly terminate the child and reap it.
    async fn kill(&mut self) -> io::Result<()>;

    /// Everything the child wrote. Call after it has exited.
    ///
    /// A grandchild can inherit the pipes and keep them open after the child
    /// exits, so draining stops after `budget` and whatever arrived by then
    /// is returned.
    async fn collect_output(self: Box<Self>, budget: Duration) -> CapturedOutput;
}

/// Starts child processes.
pub trait ProcessLauncher: Send + Sync {
    fn launch(&self, invocation: &ToolInvocation) -> io::Result<Box<dyn ChildProcess>>;
}

/// Launches real processes with `tokio::process`.
///
/// Must be called from within a tokio runtime: the pipe readers are spawned
/// as tasks as soon as the child starts.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioLauncher;

impl ProcessLauncher for TokioLauncher {
    fn launch(&self, invocation: &ToolInvocation) -> io::Result<Box<dyn ChildProcess>> {
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdout = PipeReader::spawn(child.stdout.take());
        let stderr = PipeReader::spawn(child.stderr.take());
        Ok(Box::new(TokioChild {
            child,
            stdout,
            stderr,
        }))
    }
}

/// Drains one pipe into a shared buffer, so a reader aborted mid-stream
/// still leaves what it read.
struct PipeReader {
    buf: Arc<Mutex<Vec<u8>>>,
    task: JoinHandle<()>,
}

impl PipeReader {
    fn spawn<R>(pipe: Option<R>) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&buf);
        let task = tokio::spawn(async move {
            let Some(mut pipe) = pipe else { return };
            let mut chunk = [0u8; 4096];
            loop {
                match pipe.read(&mut chunk).await {
                    Ok(0) => break,
                    Ok(n) => {
                        if let Ok(mut buf) = sink.lock() {
                            buf.extend_from_slice(&chunk[..n]);
                        }
                    }
                    Err(e) => {
                        debug!(error = %e, "pipe read ended early");
                        break;
                    }
                }
            }
        });
        Self { buf, task }
    }

    fn text(&self) -> String {
        self.buf
            .lock()
            .map(|buf| String::from_utf8_lossy(&buf).into_owned())
            .unwrap_or_default()
    }
}

struct TokioChild {
    child: Child,
    stdout: PipeReader,
    stderr: PipeReader,
}

#[async_trait]
impl ChildProcess for TokioChild {
    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }

    async fn kill(&mut self) -> io::Result<()> {
        self.child.kill().await
    }

    async fn collect_output(self: Box<Self>, budget: Duration) -> CapturedOutput {
        let TokioChild {
            mut stdout,
            mut stderr,
            ..
        } = *self;
        let drained = tokio::time::timeout(budget, async {
            let _ = (&mut stdout.task).await;
            let _ = (&mut stderr.task).await;
        })
        .await;

        if drained.is_err() {
            warn!(
                budget_ms = budget.as_millis() as u64,
                "pipes still open after exit, keeping partial output"
            );
            stdout.task.abort();
            stderr.task.abort();
        }

        CapturedOutput {
            stdout: stdout.text(),
            stderr: stderr.text(),
        }
    }
}
