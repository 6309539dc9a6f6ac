//! Typed command lines for target invocations.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::config::LauncherConfig;
use crate::params::ParameterTuple;

/// Parallel launcher prefix, e.g. `mpiexec -n 4`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LauncherPrefix {
    pub program: String,
    pub worker_flag: String,
    pub workers: u32,
}

/// A fully specified invocation of one target program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    launcher: Option<LauncherPrefix>,
    program: PathBuf,
    positional: Vec<String>,
    flags: Vec<String>,
}

impl CommandSpec {
    /// Creates a command that runs `program` directly with no arguments.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            launcher: None,
            program: program.into(),
            positional: Vec::new(),
            flags: Vec::new(),
        }
    }

    /// Builds the invocation of `program` for one sweep tuple.
    pub fn for_tuple(program: &Path, tuple: &ParameterTuple, launcher: &LauncherConfig) -> Self {
        Self {
            launcher: launcher.prefix(tuple.processes()),
            program: program.to_path_buf(),
            positional: tuple.size_args(),
            flags: tuple.flags().to_vec(),
        }
    }

    /// Runs the target under a parallel launcher.
    pub fn with_launcher(mut self, launcher: LauncherPrefix) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Appends a positional argument.
    pub fn with_positional(mut self, arg: impl Into<String>) -> Self {
        self.positional.push(arg.into());
        self
    }

    /// Appends a flag argument.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.flags.push(flag.into());
        self
    }

    pub fn launcher(&self) -> Option<&LauncherPrefix> {
        self.launcher.as_ref()
    }

    /// The target program, as given (relative to the working directory).
    pub fn target(&self) -> &Path {
        &self.program
    }

    pub fn positional(&self) -> &[String] {
        &self.positional
    }

    pub fn flags(&self) -> &[String] {
        &self.flags
    }

    /// The executable actually spawned: the launcher if present, else the target.
    pub fn executable(&self) -> OsString {
        match &self.launcher {
            Some(launcher) => OsString::from(&launcher.program),
            None => self.program.clone().into_os_string(),
        }
    }

    /// Arguments passed to [`CommandSpec::executable`].
    pub fn args(&self) -> Vec<OsString> {
        let mut args = Vec::with_capacity(self.positional.len() + self.flags.len() + 3);
        if let Some(launcher) = &self.launcher {
            args.push(OsString::from(&launcher.worker_flag));
            args.push(OsString::from(launcher.workers.to_string()));
            args.push(self.program.clone().into_os_string());
        }
        args.extend(self.positional.iter().map(OsString::from));
        args.extend(self.flags.iter().map(OsString::from));
        args
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(launcher) = &self.launcher {
            write!(
                f,
                "{} {} {} ",
                launcher.program, launcher.worker_flag, launcher.workers
            )?;
        }
        write!(f, "{}", self.program.display())?;
        for arg in self.positional.iter().chain(&self.flags) {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Path used to invoke a program from the working directory.
///
/// Bare names get a `./` prefix so they are never looked up on `PATH`.
pub fn target_path(name: &str) -> PathBuf {
    let path = Path::new(name);
    if path.is_absolute() || path.components().count() > 1 {
        path.to_path_buf()
    } else {
        Path::new(".").join(path)
    }
}
