//! Parameter-sweep driver.
//!
//! Runs every tuple of a [`SweepPlan`] against each configured target, one
//! child at a time.

use crate::command::{target_path, CommandSpec};
use crate::config::SweepConfig;
use crate::error::Result;
use crate::executor::{RunExecutor, RunResult};
use crate::params::SweepPlan;
use crate::runner::ProcessLauncher;
use crate::session::{HarnessSession, RunCounters};

/// Counts for one target program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramTally {
    pub program: String,
    /// False when the target was missing and never launched.
    pub present: bool,
    pub counters: RunCounters,
}

/// Drives a sweep over all configured targets.
pub struct SweepDriver {
    config: SweepConfig,
    plan: SweepPlan,
}

impl SweepDriver {
    pub fn new(config: SweepConfig, plan: SweepPlan) -> Self {
        Self { config, plan }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn plan(&self) -> &SweepPlan {
        &self.plan
    }

    /// Runs the sweep, recording every run in `session`.
    ///
    /// A missing target is recorded once and skipped; it never stops the
    /// remaining targets. Only session write errors are returned.
    pub async fn run<L: ProcessLauncher>(
        &self,
        executor: &RunExecutor<L>,
        session: &mut HarnessSession,
    ) -> Result<Vec<ProgramTally>> {
        let timeout = self.config.timeout();
        let mut tallies = Vec::with_capacity(self.config.programs.len());

        for program in &self.config.programs {
            let path = target_path(program);
            let mark = session.summary();

            if !executor.target_exists(&path) {
                tracing::warn!(program = %program, "skipping missing target");
                session.record(program, &RunResult::missing())?;
                tallies.push(ProgramTally {
                    program: program.clone(),
                    present: false,
                    counters: session.summary().since(mark),
                });
                continue;
            }

            session.note(&format!("Running {}", program))?;
            tracing::info!(
                program = %program,
                tuples = self.plan.len(),
                launcher = executor.launcher().name(),
                "starting sweep"
            );

            for tuple in self.plan.tuples() {
                let spec = CommandSpec::for_tuple(&path, &tuple, &self.config.launcher);
                let result = executor.execute(&spec, timeout).await;
                session.record(&spec.to_string(), &result)?;
            }

            let counters = session.summary().since(mark);
            session.note(&format!("\n{}", counters))?;
            tallies.push(ProgramTally {
                program: program.clone(),
                present: true,
                counters,
            });
        }

        Ok(tallies)
    }
}
