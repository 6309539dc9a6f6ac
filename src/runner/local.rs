//! Launcher that spawns child processes on the local host.
//!
//! On unix every target runs as the leader of its own process group. The
//! whole group is killed when the target times out, when it exits, and when
//! the launch future is dropped, so launcher workers (MPI ranks, background
//! helpers) never outlive the run that started them.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;

use crate::command::CommandSpec;
use crate::error::{Error, Result};

use super::{ExitDisposition, LaunchOutcome, ProcessLauncher};

/// How long to keep draining output after a normal exit.
///
/// Only processes that left the target's group (daemonized helpers) can
/// still hold the pipes open at this point.
const EXIT_DRAIN_GRACE: Duration = Duration::from_secs(2);

/// How long to keep draining output after a timeout kill.
const KILL_DRAIN_GRACE: Duration = Duration::from_millis(250);

type OutputBuffer = Arc<Mutex<Vec<u8>>>;

/// Spawns targets with `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct LocalLauncher;

impl LocalLauncher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ProcessLauncher for LocalLauncher {
    async fn launch(
        &self,
        spec: &CommandSpec,
        work_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<LaunchOutcome> {
        let executable = spec.executable();

        tracing::debug!(
            command = %spec,
            work_dir = ?work_dir,
            timeout = ?timeout,
            "spawning target"
        );

        let mut command = Command::new(&executable);
        command
            .args(spec.args())
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command.process_group(0);

        let mut child = command.spawn().map_err(|e| Error::Launch {
            program: executable.to_string_lossy().into_owned(),
            reason: e.to_string(),
        })?;
        let group = ProcessGroup::new(child.id());

        let stdout = OutputBuffer::default();
        let stderr = OutputBuffer::default();
        let mut drains = Vec::with_capacity(2);
        if let Some(pipe) = child.stdout.take() {
            drains.push(tokio::spawn(drain(pipe, stdout.clone())));
        }
        if let Some(pipe) = child.stderr.take() {
            drains.push(tokio::spawn(drain(pipe, stderr.clone())));
        }

        let disposition = match timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => classify(status?),
                    Err(_) => {
                        tracing::warn!(
                            command = %spec,
                            timeout_secs = limit.as_secs_f64(),
                            "target exceeded timeout, killing its process group"
                        );
                        group.kill();
                        // kill() also waits, so the child is reaped here.
                        child.kill().await?;
                        ExitDisposition::TimedOut(limit)
                    }
                }
            }
            None => classify(child.wait().await?),
        };

        // Anything the target left behind in its group goes too; this also
        // closes the pipes those processes inherited.
        group.kill();

        let grace = if disposition.timed_out() {
            KILL_DRAIN_GRACE
        } else {
            EXIT_DRAIN_GRACE
        };
        let abandoned = finish_drains(drains, grace).await;

        let mut stderr = take_output(&stderr);
        if abandoned {
            tracing::warn!(command = %spec, "output pipes still open after exit, output abandoned");
            stderr.push_str(&format!(
                "[output abandoned: pipes still open {:.1}s after exit]\n",
                grace.as_secs_f64()
            ));
        }

        Ok(LaunchOutcome {
            disposition,
            stdout: take_output(&stdout),
            stderr,
        })
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// The target's process group, killed when this handle is dropped.
///
/// Dropping covers the cancellation path: if the launch future is dropped
/// mid-run, `kill_on_drop` only reaches the direct child.
struct ProcessGroup {
    #[cfg_attr(not(unix), allow(dead_code))]
    id: Option<u32>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self { id: leader }
    }

    /// Sends SIGKILL to every member of the group. A group with no members
    /// left is not an error.
    #[cfg(unix)]
    fn kill(&self) {
        let Some(id) = self.id.and_then(|id| libc::pid_t::try_from(id).ok()) else {
            return;
        };
        // SAFETY: killpg has no memory-safety preconditions.
        let rc = unsafe { libc::killpg(id, libc::SIGKILL) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::debug!(group = id, error = %err, "failed to kill process group");
            }
        }
    }

    #[cfg(not(unix))]
    fn kill(&self) {}
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Copies a pipe into `sink` chunk by chunk so a partial read survives a kill.
async fn drain<R: AsyncRead + Unpin>(mut reader: R, sink: OutputBuffer) {
    let mut chunk = [0u8; 8192];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut buffer = sink.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
                buffer.extend_from_slice(&chunk[..n]);
            }
            Err(e) => {
                tracing::debug!(error = %e, "error reading child output");
                break;
            }
        }
    }
}

/// Waits up to `grace` for each drain; returns true if any was abandoned.
async fn finish_drains(drains: Vec<JoinHandle<()>>, grace: Duration) -> bool {
    let mut abandoned = false;
    for mut handle in drains {
        if tokio::time::timeout(grace, &mut handle).await.is_err() {
            tracing::debug!("output pipe still open after grace period, abandoning");
            handle.abort();
            abandoned = true;
        }
    }
    abandoned
}

fn take_output(buffer: &OutputBuffer) -> String {
    let bytes = std::mem::take(&mut *buffer.lock().unwrap_or_else(|p| p.into_inner()));
    String::from_utf8_lossy(&bytes).into_owned()
}

fn classify(status: ExitStatus) -> ExitDisposition {
    match status.code() {
        Some(code) => ExitDisposition::Exited(code),
        None => ExitDisposition::Signaled(signal_of(&status)),
    }
}

#[cfg(unix)]
fn signal_of(status: &ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt;
    status.signal()
}

#[cfg(not(unix))]
fn signal_of(_status: &ExitStatus) -> Option<i32> {
    None
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn captures_stdout_and_stderr_separately() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("/bin/sh")
            .with_positional("-c")
            .with_positional("echo out; echo err >&2; exit 3");

        let outcome = LocalLauncher::new()
            .launch(&spec, dir.path(), None)
            .await
            .unwrap();

        assert_eq!(outcome.disposition, ExitDisposition::Exited(3));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
    }

    #[tokio::test]
    async fn runs_in_work_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        std::fs::write(dir.path().join("marker"), "here").unwrap();
        let spec = CommandSpec::new("/bin/sh")
            .with_positional("-c")
            .with_positional("cat marker");

        let outcome = LocalLauncher::new()
            .launch(&spec, dir.path(), None)
            .await
            .unwrap();

        assert!(outcome.disposition.success());
        assert_eq!(outcome.stdout, "here");
    }

    #[tokio::test]
    async fn reports_signal_termination() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("/bin/sh")
            .with_positional("-c")
            .with_positional("kill -9 $$");

        let outcome = LocalLauncher::new()
            .launch(&spec, dir.path(), None)
            .await
            .unwrap();

        assert_eq!(outcome.disposition, ExitDisposition::Signaled(Some(9)));
    }

    #[tokio::test]
    async fn kills_child_after_timeout() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("/bin/sh")
            .with_positional("-c")
            .with_positional("echo started; exec sleep 30");
        let limit = Duration::from_millis(300);

        let start = Instant::now();
        let outcome = LocalLauncher::new()
            .launch(&spec, dir.path(), Some(limit))
            .await
            .unwrap();

        assert_eq!(outcome.disposition, ExitDisposition::TimedOut(limit));
        assert!(start.elapsed() >= limit);
        assert!(start.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.stdout, "started\n");
    }

    #[tokio::test]
    async fn missing_launcher_is_launch_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let spec = CommandSpec::new("./does-not-exist");

        let err = LocalLauncher::new()
            .launch(&spec, dir.path(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Launch { .. }));
    }

    #[test]
    fn local_launcher_has_correct_name() {
        assert_eq!(LocalLauncher::new().name(), "local");
    }
}
