//! Process launchers.
//!
//! The only platform-dependent code in the harness lives behind
//! [`ProcessLauncher`]: spawning a child, draining its output and killing it
//! when its time is up.

mod local;

pub use local::LocalLauncher;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::command::CommandSpec;
use crate::error::Result;

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitDisposition {
    /// Exited normally with a status code.
    Exited(i32),
    /// Terminated by a signal (number, where the platform reports one).
    Signaled(Option<i32>),
    /// Killed after exceeding the timeout.
    TimedOut(Duration),
}

impl ExitDisposition {
    /// Returns true only for a zero exit status.
    pub fn success(&self) -> bool {
        matches!(self, ExitDisposition::Exited(0))
    }

    pub fn timed_out(&self) -> bool {
        matches!(self, ExitDisposition::TimedOut(_))
    }
}

impl fmt::Display for ExitDisposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitDisposition::Exited(code) => write!(f, "exit code {}", code),
            ExitDisposition::Signaled(Some(signal)) => write!(f, "killed by signal {}", signal),
            ExitDisposition::Signaled(None) => write!(f, "killed by signal"),
            ExitDisposition::TimedOut(limit) => {
                write!(f, "timed out after {}s, output truncated", limit.as_secs_f64())
            }
        }
    }
}

/// Everything observed from one child process.
#[derive(Debug, Clone)]
pub struct LaunchOutcome {
    pub disposition: ExitDisposition,
    pub stdout: String,
    pub stderr: String,
}

/// Trait for process launchers.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    /// Runs `spec` in `work_dir` and waits for it to finish.
    ///
    /// With a timeout, a child still running when it elapses is killed and
    /// reaped before this returns. `Err` means the child could not be
    /// started or waited on.
    async fn launch(
        &self,
        spec: &CommandSpec,
        work_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<LaunchOutcome>;

    /// Returns the name of this launcher.
    fn name(&self) -> &str;
}
