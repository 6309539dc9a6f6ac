//! Harness configuration and validation.
//!
//! Both harness variants start from built-in defaults matching the MPI test
//! directory layout. The sweep harness can also load a TOML file.
//!
//! Environment variables:
//! - `HARNESS_LAUNCHER=<program>` - Parallel launcher to use (default: `mpiexec`)
//! - `HARNESS_LAUNCHER=none` - Run targets directly, without a launcher

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::command::LauncherPrefix;
use crate::error::{Error, Result};

/// Log file written by the sweep harness.
pub const SWEEP_LOG_FILE: &str = "testaccumulate.log";

/// Log file written by the suite harness.
pub const SUITE_LOG_FILE: &str = "testfft.log";

/// Environment variable overriding the launcher program.
pub const LAUNCHER_ENV: &str = "HARNESS_LAUNCHER";

/// Process counts above this are flagged as suspicious.
const MAX_REASONABLE_PROCESSES: u32 = 256;

/// Converts a timeout in seconds to a duration; `0` means no timeout.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Merges another validation result into this one.
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

/// Parallel-process launcher used to fan a target out over workers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LauncherConfig {
    /// Whether targets run under the launcher at all.
    #[serde(default = "default_launcher_enabled")]
    pub enabled: bool,

    /// Launcher executable, looked up on `PATH`.
    #[serde(default = "default_launcher_program")]
    pub program: String,

    /// Flag that precedes the worker count.
    #[serde(default = "default_worker_flag")]
    pub worker_flag: String,
}

fn default_launcher_enabled() -> bool {
    true
}

fn default_launcher_program() -> String {
    "mpiexec".to_string()
}

fn default_worker_flag() -> String {
    "-n".to_string()
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            enabled: default_launcher_enabled(),
            program: default_launcher_program(),
            worker_flag: default_worker_flag(),
        }
    }
}

impl LauncherConfig {
    /// A configuration that runs targets directly.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    /// Applies the `HARNESS_LAUNCHER` environment variable, if set.
    pub fn with_env_override(self) -> Self {
        let value = std::env::var(LAUNCHER_ENV).ok();
        self.with_override(value.as_deref())
    }

    /// Applies a launcher override: `none` disables the launcher, any other
    /// non-empty value replaces the program.
    pub fn with_override(mut self, value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") => {}
            Some(v) if v.eq_ignore_ascii_case("none") => self.enabled = false,
            Some(v) => {
                self.enabled = true;
                self.program = v.to_string();
            }
        }
        self
    }

    /// Returns the command prefix for `workers` processes, or `None` when disabled.
    pub fn prefix(&self, workers: u32) -> Option<LauncherPrefix> {
        self.enabled.then(|| LauncherPrefix {
            program: self.program.clone(),
            worker_flag: self.worker_flag.clone(),
            workers,
        })
    }
}

impl Validate for LauncherConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.enabled && self.program.trim().is_empty() {
            result.add_error("launcher program cannot be empty");
        }

        result
    }
}

/// Inclusive range for a pseudo-random axis value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RandomRange {
    pub min: u32,
    pub max: u32,
}

impl RandomRange {
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }
}

/// One problem-size axis of the sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisConfig {
    /// Option letter passed to the target (`x` becomes `-x<value>`).
    pub flag: char,

    /// Fixed values, swept in order.
    #[serde(default)]
    pub values: Vec<u32>,

    /// Range for one extra value drawn at startup.
    #[serde(default)]
    pub random: Option<RandomRange>,
}

impl AxisConfig {
    /// Creates an axis with fixed values only.
    pub fn new(flag: char, values: impl Into<Vec<u32>>) -> Self {
        Self {
            flag,
            values: values.into(),
            random: None,
        }
    }

    /// Adds a pseudo-random value drawn from `min..=max`.
    pub fn with_random(mut self, min: u32, max: u32) -> Self {
        self.random = Some(RandomRange::new(min, max));
        self
    }
}

impl Validate for AxisConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.values.is_empty() && self.random.is_none() {
            result.add_error(format!("axis '{}' has no values", self.flag));
        }

        if self.values.contains(&0) {
            result.add_error(format!("axis '{}' values must be at least 1", self.flag));
        }

        if let Some(range) = self.random {
            if range.min == 0 {
                result.add_error(format!("axis '{}' random minimum must be at least 1", self.flag));
            }
            if range.min > range.max {
                result.add_error(format!(
                    "axis '{}' random range {}..={} is empty",
                    self.flag, range.min, range.max
                ));
            }
        }

        if !self.flag.is_ascii_alphabetic() {
            result.add_error(format!("axis flag '{}' must be an ASCII letter", self.flag));
        }

        result
    }
}

/// Configuration for the parameter-sweep harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepConfig {
    /// Banner printed at startup.
    #[serde(default = "default_sweep_title")]
    pub title: String,

    /// Target executables, swept in order.
    #[serde(default = "default_sweep_programs")]
    pub programs: Vec<String>,

    /// Process counts, innermost loop.
    #[serde(default = "default_processes")]
    pub processes: Vec<u32>,

    /// Flags appended to every invocation.
    #[serde(default = "default_flags")]
    pub flags: Vec<String>,

    /// Per-run timeout in seconds; `0` disables it.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Log file, relative to the working directory.
    #[serde(default = "default_sweep_log")]
    pub log_file: PathBuf,

    /// Problem-size axes, outermost first.
    #[serde(default = "default_axes")]
    pub axes: Vec<AxisConfig>,

    #[serde(default)]
    pub launcher: LauncherConfig,
}

fn default_sweep_title() -> String {
    "MPI transpose unit test".to_string()
}

fn default_sweep_programs() -> Vec<String> {
    vec!["accumulate".to_string(), "accumulateyz".to_string()]
}

fn default_axes() -> Vec<AxisConfig> {
    vec![
        AxisConfig::new('x', [1, 2, 3, 4, 5]).with_random(10, 64),
        AxisConfig::new('y', [1, 2, 3, 4, 5]).with_random(10, 64),
        AxisConfig::new('z', [1, 2]).with_random(3, 64),
    ]
}

fn default_processes() -> Vec<u32> {
    vec![1, 2, 3, 4, 5]
}

fn default_flags() -> Vec<String> {
    vec!["-q".to_string()]
}

fn default_sweep_log() -> PathBuf {
    PathBuf::from(SWEEP_LOG_FILE)
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            title: default_sweep_title(),
            programs: default_sweep_programs(),
            processes: default_processes(),
            flags: default_flags(),
            timeout_secs: 0,
            log_file: default_sweep_log(),
            axes: default_axes(),
            launcher: LauncherConfig::default(),
        }
    }
}

impl SweepConfig {
    /// Loads a sweep configuration from a TOML file.
    ///
    /// Fields missing from the file keep their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(Error::Io)?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse sweep config: {}", e)))
    }

    /// Renders the effective configuration in the same TOML form `load` reads.
    pub fn to_toml(&self) -> Result<String> {
        to_toml(self)
    }

    /// Sets the target programs.
    pub fn with_programs<S: Into<String>>(mut self, programs: impl IntoIterator<Item = S>) -> Self {
        self.programs = programs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the problem-size axes.
    pub fn with_axes(mut self, axes: Vec<AxisConfig>) -> Self {
        self.axes = axes;
        self
    }

    /// Sets the process counts.
    pub fn with_processes(mut self, processes: impl Into<Vec<u32>>) -> Self {
        self.processes = processes.into();
        self
    }

    /// Sets the extra flags.
    pub fn with_flags<S: Into<String>>(mut self, flags: impl IntoIterator<Item = S>) -> Self {
        self.flags = flags.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the per-run timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Sets the launcher.
    pub fn with_launcher(mut self, launcher: LauncherConfig) -> Self {
        self.launcher = launcher;
        self
    }

    /// Returns the per-run timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }
}

impl Validate for SweepConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.programs.is_empty() {
            result.add_error("programs cannot be empty");
        }

        if self.programs.iter().any(|p| p.trim().is_empty()) {
            result.add_error("program names cannot be blank");
        }

        if self.axes.is_empty() {
            result.add_error("at least one size axis is required");
        }

        if self.axes.len() > 3 {
            result.add_warning(format!(
                "{} size axes configured; targets usually take at most three",
                self.axes.len()
            ));
        }

        for axis in &self.axes {
            result.merge(axis.validate());
        }

        if !self.axes.iter().any(|a| a.random.is_some()) {
            result.add_warning("no axis has a random value; sweep only covers hand-picked sizes");
        }

        if self.processes.is_empty() {
            result.add_error("processes cannot be empty");
        }

        if self.processes.contains(&0) {
            result.add_error("process counts must be at least 1");
        }

        if self.processes.iter().any(|&p| p > MAX_REASONABLE_PROCESSES) {
            result.add_warning(format!(
                "process count above {} may oversubscribe the host",
                MAX_REASONABLE_PROCESSES
            ));
        }

        if self.timeout_secs > 3600 {
            result.add_warning("timeout over 1 hour may indicate a misconfiguration");
        }

        result.merge(self.launcher.validate());

        result
    }
}

/// Configuration for the suite-of-suites harness.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuiteConfig {
    /// Banner printed at startup and written at the top of the log.
    #[serde(default = "default_suite_title")]
    pub title: String,

    /// Sub-harness programs, run in order.
    #[serde(default = "default_suite_entries")]
    pub entries: Vec<String>,

    /// Forward `-s` to every sub-harness.
    #[serde(default)]
    pub short_run: bool,

    /// Per-entry timeout in seconds; `0` disables it.
    #[serde(default)]
    pub timeout_secs: u64,

    /// Log file, relative to the working directory.
    #[serde(default = "default_suite_log")]
    pub log_file: PathBuf,
}

fn default_suite_title() -> String {
    "MPI fft unit test".to_string()
}

fn default_suite_entries() -> Vec<String> {
    vec!["testfft2.py".to_string(), "testfft3.py".to_string()]
}

fn default_suite_log() -> PathBuf {
    PathBuf::from(SUITE_LOG_FILE)
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self {
            title: default_suite_title(),
            entries: default_suite_entries(),
            short_run: false,
            timeout_secs: 0,
            log_file: default_suite_log(),
        }
    }
}

impl SuiteConfig {
    /// Sets the sub-harness entries.
    pub fn with_entries<S: Into<String>>(mut self, entries: impl IntoIterator<Item = S>) -> Self {
        self.entries = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Sets whether `-s` is forwarded.
    pub fn with_short_run(mut self, short_run: bool) -> Self {
        self.short_run = short_run;
        self
    }

    /// Sets the per-entry timeout in seconds.
    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Returns the per-entry timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        timeout_from_secs(self.timeout_secs)
    }

    /// Renders the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String> {
        to_toml(self)
    }
}

fn to_toml<T: Serialize>(config: &T) -> Result<String> {
    toml::to_string(config)
        .map_err(|e| Error::Config(format!("failed to render config: {}", e)))
}

impl Validate for SuiteConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.entries.is_empty() {
            result.add_warning("suite has no entries");
        }

        if self.entries.iter().any(|e| e.trim().is_empty()) {
            result.add_error("suite entry names cannot be blank");
        }

        result
    }
}
