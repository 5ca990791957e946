//! Execution sandbox: one scratch unit, one child process, one outcome
//!
//! Per submission the sandbox walks
//! `Idle -> Materialized -> Running -> {Completed | TimedOut | LaunchFailed} -> Released`.
//! `Released` is reached on every path because the scratch unit is dropped
//! before [`Sandbox::run`] returns, whatever happened in between.

use crate::isolation;
use crate::outcome::ExecutionOutcome;
use crate::scratch::ScratchUnit;
use crate::{SandboxConfig, SandpitError};
use nix::errno::Errno;
use nix::sys::signal::{Signal, killpg};
use nix::unistd::Pid;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// How long to keep reading pipes after the child exits. Descendants that
/// escaped the process group (`setsid`) can hold them open indefinitely.
const DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Lifecycle of a single submission inside the sandbox
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Nothing allocated yet
    Idle,
    /// Scratch unit written
    Materialized,
    /// Child process spawned
    Running,
    /// Child exited on its own
    Completed,
    /// Wall-clock bound hit, child killed
    TimedOut,
    /// Child could not be spawned or waited on
    LaunchFailed,
    /// Scratch unit removed (terminal)
    Released,
}

/// A pipe being read in the background. Firing `stop` makes the reader
/// return what it has kept so far.
struct Drain {
    handle: JoinHandle<std::io::Result<Vec<u8>>>,
    stop: oneshot::Sender<()>,
}

impl Drain {
    fn spawn<R>(reader: R, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (stop, stopped) = oneshot::channel();
        Self {
            handle: tokio::spawn(drain(reader, limit, stopped)),
            stop,
        }
    }
}

/// Runs accepted submissions as `interpreter <scratch file>`
#[derive(Debug, Clone)]
pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    #[must_use]
    pub const fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    #[must_use]
    pub const fn config(&self) -> &SandboxConfig {
        &self.config
    }

    /// Run `code` once and report what happened. Never retries and never
    /// fails: internal errors become [`ExecutionOutcome::SystemError`].
    pub async fn run(&self, code: &str) -> ExecutionOutcome {
        let start = Instant::now();
        tracing::debug!(phase = ?Phase::Idle, code_len = code.len(), "submission accepted");

        let outcome = match ScratchUnit::create(
            &self.config.scratch_dir,
            &self.config.scratch_suffix,
            code,
        )
        .await
        {
            Ok(unit) => {
                tracing::debug!(phase = ?Phase::Materialized, path = %unit.path().display());
                let outcome = self.supervise(&unit).await;
                drop(unit);
                outcome
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to materialize submission");
                ExecutionOutcome::SystemError {
                    cause: e.to_string(),
                }
            }
        };

        tracing::debug!(
            phase = ?Phase::Released,
            outcome = outcome.kind(),
            elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "submission finished"
        );
        outcome
    }

    fn command(&self, unit: &ScratchUnit) -> Command {
        // Exactly `interpreter path`: no shell, nothing derived from the code.
        let mut cmd = Command::new(&self.config.interpreter);
        cmd.arg(unit.path())
            .current_dir(unit.dir())
            .env_clear()
            .envs(
                self.config
                    .env
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str())),
            )
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        isolation::install(&mut cmd, self.config.effective_limits(), self.config.namespaces);
        cmd
    }

    async fn supervise(&self, unit: &ScratchUnit) -> ExecutionOutcome {
        let mut child = match self.command(unit).spawn() {
            Ok(child) => child,
            Err(e) => {
                let e = SandpitError::Launch(e);
                tracing::warn!(phase = ?Phase::LaunchFailed, error = %e);
                return ExecutionOutcome::SystemError {
                    cause: e.to_string(),
                };
            }
        };

        let pid = child.id();
        tracing::debug!(phase = ?Phase::Running, pid);

        // Drain both pipes while waiting, otherwise a chatty child blocks on a
        // full pipe and looks like a timeout.
        let limit = self.config.max_output_bytes;
        let stdout = child.stdout.take().map(|s| Drain::spawn(s, limit));
        let stderr = child.stderr.take().map(|s| Drain::spawn(s, limit));

        let waited = tokio::time::timeout(self.config.timeout, child.wait()).await;
        match waited {
            Ok(Ok(status)) => {
                // Background descendants must not outlive the submission.
                // A pgid stays reserved while any member is alive, so this
                // only reaches leftovers of this child.
                kill_group(pid);

                let exit_code = exit_code_of(status);
                let stdout = collect(stdout).await;
                let stderr = collect(stderr).await;
                tracing::debug!(
                    phase = ?Phase::Completed,
                    exit_code,
                    stdout_len = stdout.len(),
                    stderr_len = stderr.len()
                );

                if exit_code == 0 {
                    ExecutionOutcome::Success { stdout }
                } else {
                    ExecutionOutcome::ProcessFailure { stderr, exit_code }
                }
            }
            Ok(Err(e)) => {
                kill_group(pid);
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill child after wait error");
                }
                abort(stdout);
                abort(stderr);

                let e = SandpitError::Wait(e);
                tracing::warn!(phase = ?Phase::LaunchFailed, error = %e);
                ExecutionOutcome::SystemError {
                    cause: e.to_string(),
                }
            }
            Err(_) => {
                // Not reaped yet, so the pid (and its group id) cannot have
                // been recycled.
                kill_group(pid);
                if let Err(e) = child.kill().await {
                    tracing::warn!(error = %e, "failed to kill timed out child");
                }
                abort(stdout);
                abort(stderr);

                tracing::warn!(
                    phase = ?Phase::TimedOut,
                    timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX),
                    "execution timed out"
                );
                ExecutionOutcome::TimedOut {
                    after: self.config.timeout,
                }
            }
        }
    }
}

/// Read to EOF or until `stop` fires, keeping at most `limit` bytes
async fn drain<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
    mut stop: oneshot::Receiver<()>,
) -> std::io::Result<Vec<u8>> {
    let mut kept = Vec::new();
    let mut buf = [0u8; 8192];
    loop {
        // A dropped sender counts as a stop as well.
        let n = tokio::select! {
            biased;
            _ = &mut stop => break,
            n = reader.read(&mut buf) => n?,
        };
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        kept.extend_from_slice(&buf[..n.min(room)]);
    }
    Ok(kept)
}

/// Wait for a pipe to close, then keep whatever was read. A pipe still held
/// open after [`DRAIN_GRACE`] is cut off with its partial output kept.
async fn collect(drain: Option<Drain>) -> String {
    let Some(Drain { mut handle, stop }) = drain else {
        return String::new();
    };

    let joined = match tokio::time::timeout(DRAIN_GRACE, &mut handle).await {
        Ok(joined) => joined,
        Err(_) => {
            tracing::warn!("child output still open after exit, cutting it off");
            let _ = stop.send(());
            handle.await
        }
    };

    match joined {
        Ok(Ok(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "failed to read child output");
            String::new()
        }
        Err(e) => {
            tracing::warn!(error = %e, "output reader task failed");
            String::new()
        }
    }
}

fn abort(drain: Option<Drain>) {
    if let Some(drain) = drain {
        drain.handle.abort();
    }
}

fn exit_code_of(status: ExitStatus) -> i32 {
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(-1)
}

/// SIGKILL the child's whole process group
fn kill_group(pid: Option<u32>) {
    let Some(pid) = pid.and_then(|p| i32::try_from(p).ok()) else {
        return;
    };

    match killpg(Pid::from_raw(pid), Signal::SIGKILL) {
        Ok(()) | Err(Errno::ESRCH) => {}
        Err(e) => tracing::warn!(pid, error = %e, "failed to kill process group"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_drain_truncates() {
        let data = vec![b'x'; 20_000];
        let (_stop, stopped) = oneshot::channel();
        let kept = drain(&data[..], 100, stopped).await.unwrap();
        assert_eq!(kept.len(), 100);
    }

    #[tokio::test]
    async fn test_stopped_drain_keeps_partial_output() {
        let (mut writer, reader) = tokio::io::duplex(64);
        let drain = Drain::spawn(reader, 1024);

        tokio::io::AsyncWriteExt::write_all(&mut writer, b"partial")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The writer stays open, so only the stop ends the read.
        let _ = drain.stop.send(());
        let kept = drain.handle.await.unwrap().unwrap();
        assert_eq!(kept, b"partial");
        drop(writer);
    }

    #[test]
    fn test_exit_code_from_signal() {
        // Raw wait status for "killed by SIGKILL"
        let status = ExitStatus::from_raw(9);
        assert_eq!(exit_code_of(status), 137);

        let status = ExitStatus::from_raw(3 << 8);
        assert_eq!(exit_code_of(status), 3);
    }
}
