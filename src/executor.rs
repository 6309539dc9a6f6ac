//! Run executor: one target, one command line, one verdict.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::command::CommandSpec;
use crate::runner::{ExitDisposition, ProcessLauncher};

/// Classification of a single run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Exit status was exactly zero.
    Pass,
    /// Non-zero exit, signal, timeout or launch failure.
    Fail,
    /// The target file does not exist; nothing was launched.
    MissingExecutable,
}

impl Verdict {
    pub fn is_pass(self) -> bool {
        self == Verdict::Pass
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Verdict::Pass => "pass",
            Verdict::Fail => "fail",
            Verdict::MissingExecutable => "missing-executable",
        };
        f.write_str(text)
    }
}

/// Outcome of one invocation.
#[derive(Debug, Clone)]
pub struct RunResult {
    pub verdict: Verdict,
    /// How the child ended; `None` when it never ran.
    pub disposition: Option<ExitDisposition>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl RunResult {
    /// Result for a target that is not on disk.
    pub fn missing() -> Self {
        Self {
            verdict: Verdict::MissingExecutable,
            disposition: None,
            stdout: String::new(),
            stderr: String::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Returns true if the output was cut short by a timeout kill.
    pub fn truncated(&self) -> bool {
        self.disposition.is_some_and(|d| d.timed_out())
    }

    /// Short human-readable reason for a failure, e.g. `exit code 2`.
    pub fn failure_reason(&self) -> Option<String> {
        match (self.verdict, self.disposition) {
            (Verdict::Pass, _) => None,
            (Verdict::MissingExecutable, _) => Some("executable not present".to_string()),
            (Verdict::Fail, Some(disposition)) => Some(disposition.to_string()),
            (Verdict::Fail, None) => Some("launch failed".to_string()),
        }
    }
}

/// Runs commands through a [`ProcessLauncher`], relative to a working directory.
pub struct RunExecutor<L: ProcessLauncher> {
    launcher: L,
    work_dir: PathBuf,
}

impl<L: ProcessLauncher> RunExecutor<L> {
    /// Creates an executor resolving targets against `work_dir`.
    pub fn new(launcher: L, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            launcher,
            work_dir: work_dir.into(),
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Plain existence test for a target, relative to the working directory.
    pub fn target_exists(&self, target: &Path) -> bool {
        self.work_dir.join(target).is_file()
    }

    /// Runs `spec` to completion or until `timeout` elapses.
    ///
    /// A zero timeout means none. Missing targets are reported without a
    /// launch; launch errors become a failed run carrying the error text.
    pub async fn execute(&self, spec: &CommandSpec, timeout: Option<Duration>) -> RunResult {
        if !self.target_exists(spec.target()) {
            tracing::warn!(program = ?spec.target(), "target executable not present");
            return RunResult::missing();
        }

        let timeout = timeout.filter(|t| !t.is_zero());
        let start = Instant::now();
        let launched = self.launcher.launch(spec, &self.work_dir, timeout).await;
        let elapsed = start.elapsed();

        match launched {
            Ok(outcome) => {
                let verdict = if outcome.disposition.success() {
                    Verdict::Pass
                } else {
                    Verdict::Fail
                };
                tracing::debug!(
                    command = %spec,
                    verdict = %verdict,
                    disposition = %outcome.disposition,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "run finished"
                );
                RunResult {
                    verdict,
                    disposition: Some(outcome.disposition),
                    stdout: outcome.stdout,
                    stderr: outcome.stderr,
                    elapsed,
                }
            }
            Err(e) => {
                tracing::warn!(command = %spec, error = %e, "failed to launch target");
                RunResult {
                    verdict: Verdict::Fail,
                    disposition: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                    elapsed,
                }
            }
        }
    }
}
