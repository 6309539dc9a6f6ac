//! Command-line handling shared by the harness binaries.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

/// Exit code for malformed arguments.
pub const USAGE_EXIT_CODE: i32 = 2;

/// Arguments for `testaccumulate`, the parameter-sweep harness.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "testaccumulate", about = "MPI transpose unit test")]
pub struct SweepArgs {
    /// TOML file overriding the built-in sweep
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Per-run timeout in seconds (0 disables)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Seed for the random problem sizes
    #[arg(long)]
    pub seed: Option<u64>,
}

/// Arguments for `testfft`, the suite harness.
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "testfft", about = "MPI FFT unit test")]
pub struct SuiteArgs {
    /// Specify a short run
    #[arg(short = 's')]
    pub short_run: bool,

    /// Per-entry timeout in seconds (0 disables)
    #[arg(short, long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

/// What `main` should do after argument parsing.
#[derive(Debug)]
pub enum ParseOutcome<T> {
    Run(T),
    /// Usage was printed; exit with this code.
    Exit(i32),
}

/// Parses arguments, printing usage on `-h` (exit 0) or on a malformed
/// command line (exit 2).
pub fn parse_args<T, I, S>(args: I) -> ParseOutcome<T>
where
    T: Parser,
    I: IntoIterator<Item = S>,
    S: Into<OsString> + Clone,
{
    match T::try_parse_from(args) {
        Ok(parsed) => ParseOutcome::Run(parsed),
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => {
            if let Err(io) = e.print() {
                tracing::error!(error = %io, "failed to print usage");
            }
            ParseOutcome::Exit(0)
        }
        Err(e) => {
            tracing::debug!(error = %e, "rejected command line");
            eprintln!("Error in arguments");
            eprintln!("{}", T::command().render_help());
            ParseOutcome::Exit(USAGE_EXIT_CODE)
        }
    }
}

/// Installs the tracing subscriber used by both binaries.
///
/// Diagnostics go to stderr at `warn` unless `RUST_LOG` says otherwise, so
/// they never interleave with the report on stdout.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suite_accepts_short_run() {
        match parse_args::<SuiteArgs, _, _>(["testfft", "-s"]) {
            ParseOutcome::Run(args) => {
                assert!(args.short_run);
                assert_eq!(args.timeout, None);
            }
            other => panic!("Expected Run, got {:?}", other),
        }
    }

    #[test]
    fn suite_without_flags_is_a_full_run() {
        match parse_args::<SuiteArgs, _, _>(["testfft"]) {
            ParseOutcome::Run(args) => assert!(!args.short_run),
            other => panic!("Expected Run, got {:?}", other),
        }
    }

    #[test]
    fn help_exits_zero() {
        assert!(matches!(
            parse_args::<SuiteArgs, _, _>(["testfft", "-h"]),
            ParseOutcome::Exit(0)
        ));
    }

    #[test]
    fn unknown_flag_exits_two() {
        assert!(matches!(
            parse_args::<SuiteArgs, _, _>(["testfft", "-x"]),
            ParseOutcome::Exit(USAGE_EXIT_CODE)
        ));
    }

    #[test]
    fn stray_positional_exits_two() {
        assert!(matches!(
            parse_args::<SuiteArgs, _, _>(["testfft", "extra"]),
            ParseOutcome::Exit(USAGE_EXIT_CODE)
        ));
    }

    #[test]
    fn sweep_takes_no_required_flags() {
        match parse_args::<SweepArgs, _, _>(["testaccumulate"]) {
            ParseOutcome::Run(args) => {
                assert_eq!(args.config, None);
                assert_eq!(args.seed, None);
            }
            other => panic!("Expected Run, got {:?}", other),
        }
    }

    #[test]
    fn sweep_parses_options() {
        match parse_args::<SweepArgs, _, _>([
            "testaccumulate",
            "--config",
            "sweep.toml",
            "-t",
            "60",
            "--seed",
            "9",
        ]) {
            ParseOutcome::Run(args) => {
                assert_eq!(args.config, Some(PathBuf::from("sweep.toml")));
                assert_eq!(args.timeout, Some(60));
                assert_eq!(args.seed, Some(9));
            }
            other => panic!("Expected Run, got {:?}", other),
        }
    }

    #[test]
    fn sweep_rejects_non_numeric_timeout() {
        assert!(matches!(
            parse_args::<SweepArgs, _, _>(["testaccumulate", "-t", "soon"]),
            ParseOutcome::Exit(USAGE_EXIT_CODE)
        ));
    }
}
