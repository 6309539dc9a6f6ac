//! MPI test harness - regression sweeps over pre-built MPI FFT executables.
//!
//! This library enumerates problem-size and process-count combinations,
//! launches each target under a parallel launcher with a timeout, and
//! aggregates pass/fail results into a console report and a log file.

pub mod cli;
pub mod command;
pub mod config;
pub mod error;
pub mod executor;
pub mod params;
pub mod runner;
pub mod session;
pub mod suite;
pub mod sweep;

pub use command::{target_path, CommandSpec, LauncherPrefix};
pub use config::{
    AxisConfig, LauncherConfig, RandomRange, SuiteConfig, SweepConfig, Validate,
    ValidationResult, SUITE_LOG_FILE, SWEEP_LOG_FILE,
};
pub use error::Error;
pub use executor::{RunExecutor, RunResult, Verdict};
pub use params::{ParameterTuple, ResolvedAxis, SizeParam, SweepPlan};
pub use runner::{ExitDisposition, LaunchOutcome, LocalLauncher, ProcessLauncher};
pub use session::{HarnessSession, ReportSink, RunCounters};
pub use suite::{EntryReport, SuiteDriver, SuiteReport};
pub use sweep::{ProgramTally, SweepDriver};
