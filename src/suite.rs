//! Suite driver: runs a fixed list of sub-harnesses once each.

use std::time::{Duration, Instant};

use crate::command::{target_path, CommandSpec};
use crate::config::SuiteConfig;
use crate::error::Result;
use crate::executor::{RunExecutor, RunResult, Verdict};
use crate::runner::ProcessLauncher;
use crate::session::HarnessSession;

/// Flag forwarded to sub-harnesses for a short run.
pub const SHORT_RUN_FLAG: &str = "-s";

/// Outcome of one suite entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub name: String,
    pub verdict: Verdict,
    pub elapsed: Duration,
}

/// Outcome of the whole suite.
#[derive(Debug, Clone)]
pub struct SuiteReport {
    pub entries: Vec<EntryReport>,
    pub elapsed: Duration,
}

/// Drives a suite of sub-harness programs.
pub struct SuiteDriver {
    config: SuiteConfig,
}

impl SuiteDriver {
    pub fn new(config: SuiteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    /// Builds the invocation for one entry.
    pub fn command_for(&self, entry: &str) -> CommandSpec {
        let spec = CommandSpec::new(target_path(entry));
        if self.config.short_run {
            spec.with_flag(SHORT_RUN_FLAG)
        } else {
            spec
        }
    }

    /// Runs every entry in order, recording each in `session`.
    ///
    /// Missing entries are recorded as errors and skipped.
    pub async fn run<L: ProcessLauncher>(
        &self,
        executor: &RunExecutor<L>,
        session: &mut HarnessSession,
    ) -> Result<SuiteReport> {
        let timeout = self.config.timeout();
        let suite_start = Instant::now();
        let mut entries = Vec::with_capacity(self.config.entries.len());

        for entry in &self.config.entries {
            let spec = self.command_for(entry);

            if !executor.target_exists(spec.target()) {
                session.record(entry, &RunResult::missing())?;
                entries.push(EntryReport {
                    name: entry.clone(),
                    verdict: Verdict::MissingExecutable,
                    elapsed: Duration::ZERO,
                });
                continue;
            }

            tracing::info!(
                entry = %entry,
                short_run = self.config.short_run,
                "running sub-harness"
            );
            session.sink().emit(&format!("Running {}: ", entry))?;

            let result = executor.execute(&spec, timeout).await;
            session.record("", &result)?;
            session.note(&format!(
                "\t{} elapsed time (s): {:.3}",
                entry,
                result.elapsed.as_secs_f64()
            ))?;

            entries.push(EntryReport {
                name: entry.clone(),
                verdict: result.verdict,
                elapsed: result.elapsed,
            });
        }

        let elapsed = suite_start.elapsed();
        session
            .sink()
            .console(&format!("\nElapsed time (s): {:.3}\n", elapsed.as_secs_f64()))?;

        Ok(SuiteReport { entries, elapsed })
    }
}
