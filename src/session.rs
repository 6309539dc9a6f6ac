//! Result aggregation and the human-readable report.
//!
//! A [`HarnessSession`] is created once per harness invocation. It truncates
//! the log file when it starts, then every event is appended with an
//! open-append-close cycle so a crash mid-sweep leaves a readable log.

use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::executor::{RunResult, Verdict};

/// Exit code for harness infrastructure errors (bad config, unwritable log).
///
/// Failure counts saturate one below this so the two never collide.
pub const HARNESS_ERROR_EXIT_CODE: i32 = 255;

/// Largest exit code a failure count maps to.
const MAX_FAILURE_EXIT_CODE: u64 = 254;

/// Tests run and tests failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounters {
    total: u64,
    failed: u64,
}

impl RunCounters {
    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn failed(&self) -> u64 {
        self.failed
    }

    /// Counts one run.
    pub fn record(&mut self, verdict: Verdict) {
        self.total += 1;
        if !verdict.is_pass() {
            self.failed += 1;
        }
    }

    /// Counts accumulated since `earlier` was taken.
    pub fn since(&self, earlier: RunCounters) -> RunCounters {
        RunCounters {
            total: self.total - earlier.total,
            failed: self.failed - earlier.failed,
        }
    }

    /// Process exit code: the failure count, saturated at 254.
    pub fn exit_code(&self) -> i32 {
        self.failed.min(MAX_FAILURE_EXIT_CODE) as i32
    }
}

impl fmt::Display for RunCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failures out of {} tests.", self.failed, self.total)
    }
}

/// Writes report text to the console and the log file.
///
/// Write errors on either destination are returned, never dropped.
#[derive(Debug, Clone)]
pub struct ReportSink {
    log_path: PathBuf,
    echo: bool,
}

impl ReportSink {
    /// A sink that echoes to stdout.
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            echo: true,
        }
    }

    /// A sink that writes the log file only.
    pub fn silent(log_path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: log_path.into(),
            echo: false,
        }
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Recreates the log file, empty except for `header`.
    pub fn truncate(&self, header: Option<&str>) -> Result<()> {
        let contents = header.map(|h| format!("{}\n", h)).unwrap_or_default();
        std::fs::write(&self.log_path, contents).map_err(|source| self.log_error(source))
    }

    /// Appends text to the log file only.
    pub fn append(&self, text: &str) -> Result<()> {
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.log_path)
            .map_err(|source| self.log_error(source))?;
        file.write_all(text.as_bytes())
            .map_err(|source| self.log_error(source))
    }

    /// Writes text to the console only.
    pub fn console(&self, text: &str) -> Result<()> {
        if self.echo {
            let mut stdout = std::io::stdout().lock();
            stdout.write_all(text.as_bytes())?;
            stdout.flush()?;
        }
        Ok(())
    }

    /// Writes text to both the console and the log file.
    pub fn emit(&self, text: &str) -> Result<()> {
        self.console(text)?;
        self.append(text)
    }

    fn log_error(&self, source: std::io::Error) -> Error {
        Error::Log {
            path: self.log_path.clone(),
            source,
        }
    }
}

/// Counters and report sink for one harness invocation.
pub struct HarnessSession {
    sink: ReportSink,
    counters: RunCounters,
}

impl HarnessSession {
    /// Starts a session that reports to stdout and `log_path`.
    pub fn start(
        title: &str,
        log_path: impl Into<PathBuf>,
        log_header: Option<&str>,
    ) -> Result<Self> {
        Self::open(ReportSink::new(log_path), title, log_header)
    }

    /// Starts a session on an existing sink.
    ///
    /// Prints the banner and truncates the log; this is the only truncation.
    pub fn open(sink: ReportSink, title: &str, log_header: Option<&str>) -> Result<Self> {
        sink.console(&format!("{}\n", title))?;
        sink.console(&format!("Log in {}\n\n", sink.log_path().display()))?;
        sink.truncate(log_header)?;

        tracing::info!(log = ?sink.log_path(), "harness session started");

        Ok(Self {
            sink,
            counters: RunCounters::default(),
        })
    }

    pub fn sink(&self) -> &ReportSink {
        &self.sink
    }

    /// Reports an event that is not a run, e.g. "Running accumulate".
    pub fn note(&self, text: &str) -> Result<()> {
        self.sink.emit(&format!("{}\n", text))
    }

    /// Records one run: log entry, captured output on failure, counters.
    pub fn record(&mut self, description: &str, result: &RunResult) -> Result<()> {
        match result.verdict {
            Verdict::MissingExecutable => {
                self.sink
                    .emit(&format!("Error: executable {} not present!\n", description))?;
            }
            Verdict::Pass => {
                self.sink.emit(&format!("{}\tpass\n", description))?;
            }
            Verdict::Fail => {
                let reason = result.failure_reason().unwrap_or_default();
                self.sink
                    .emit(&format!("{}\tFAILED! ({})\n", description, reason))?;
                self.sink.append(&format!(
                    "stdout:\n{}\nstderr:\n{}\n",
                    result.stdout, result.stderr
                ))?;
            }
        }

        self.counters.record(result.verdict);
        Ok(())
    }

    /// Counts so far.
    pub fn summary(&self) -> RunCounters {
        self.counters
    }

    /// Prints the final summary line and returns the counts.
    pub fn finish(self) -> Result<RunCounters> {
        self.sink.emit(&format!("\n{}\n", self.counters))?;
        tracing::info!(
            total = self.counters.total(),
            failed = self.counters.failed(),
            "harness session finished"
        );
        Ok(self.counters)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::ExitDisposition;
    use std::time::Duration;
    use tempfile::TempDir;

    fn result(verdict: Verdict, disposition: Option<ExitDisposition>) -> RunResult {
        RunResult {
            verdict,
            disposition,
            stdout: "partial output".to_string(),
            stderr: "something broke".to_string(),
            elapsed: Duration::from_millis(5),
        }
    }

    fn quiet_session(dir: &TempDir, header: Option<&str>) -> HarnessSession {
        let sink = ReportSink::silent(dir.path().join("test.log"));
        HarnessSession::open(sink, "unit test", header).unwrap()
    }

    #[test]
    fn counters_track_failures() {
        let mut counters = RunCounters::default();
        counters.record(Verdict::Pass);
        counters.record(Verdict::Fail);
        counters.record(Verdict::MissingExecutable);

        assert_eq!(counters.total(), 3);
        assert_eq!(counters.failed(), 2);
        assert_eq!(counters.to_string(), "2 failures out of 3 tests.");
    }

    #[test]
    fn failed_never_exceeds_total() {
        let verdicts = [
            Verdict::Fail,
            Verdict::Pass,
            Verdict::MissingExecutable,
            Verdict::Fail,
            Verdict::Pass,
        ];
        let mut counters = RunCounters::default();
        for verdict in verdicts {
            counters.record(verdict);
            assert!(counters.failed() <= counters.total());
        }
    }

    #[test]
    fn counters_since_gives_difference() {
        let mut counters = RunCounters::default();
        counters.record(Verdict::Fail);
        let mark = counters;
        counters.record(Verdict::Pass);
        counters.record(Verdict::Fail);

        let delta = counters.since(mark);
        assert_eq!(delta.total(), 2);
        assert_eq!(delta.failed(), 1);
    }

    #[test]
    fn exit_code_saturates() {
        let mut counters = RunCounters::default();
        for _ in 0..300 {
            counters.record(Verdict::Fail);
        }
        assert_eq!(counters.exit_code(), 254);
        assert_ne!(counters.exit_code(), HARNESS_ERROR_EXIT_CODE);
        assert_eq!(RunCounters::default().exit_code(), 0);
    }

    #[test]
    fn session_truncates_log_at_start() {
        let dir = TempDir::new().unwrap();
        let log = dir.path().join("test.log");
        std::fs::write(&log, "stale entries\n").unwrap();

        let _session = quiet_session(&dir, Some("MPI fft unit test"));

        assert_eq!(std::fs::read_to_string(&log).unwrap(), "MPI fft unit test\n");
    }

    #[test]
    fn second_session_replaces_first_log() {
        let dir = TempDir::new().unwrap();

        let mut first = quiet_session(&dir, None);
        first
            .record("./a", &result(Verdict::Pass, Some(ExitDisposition::Exited(0))))
            .unwrap();
        first.finish().unwrap();

        let mut second = quiet_session(&dir, None);
        second
            .record("./b", &result(Verdict::Pass, Some(ExitDisposition::Exited(0))))
            .unwrap();
        second.finish().unwrap();

        let log = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(!log.contains("./a"));
        assert!(log.contains("./b\tpass"));
    }

    #[test]
    fn pass_is_logged_without_output() {
        let dir = TempDir::new().unwrap();
        let mut session = quiet_session(&dir, None);

        session
            .record("./b", &result(Verdict::Pass, Some(ExitDisposition::Exited(0))))
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(log, "./b\tpass\n");
        assert_eq!(session.summary().total(), 1);
        assert_eq!(session.summary().failed(), 0);
    }

    #[test]
    fn failure_is_logged_with_captured_output() {
        let dir = TempDir::new().unwrap();
        let mut session = quiet_session(&dir, None);

        session
            .record("./b -x1", &result(Verdict::Fail, Some(ExitDisposition::Exited(1))))
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(log.contains("./b -x1\tFAILED! (exit code 1)"));
        assert!(log.contains("stdout:\npartial output\n"));
        assert!(log.contains("stderr:\nsomething broke\n"));
        assert_eq!(session.summary().failed(), 1);
    }

    #[test]
    fn timeout_is_logged_as_truncated() {
        let dir = TempDir::new().unwrap();
        let mut session = quiet_session(&dir, None);

        session
            .record(
                "./slow",
                &result(
                    Verdict::Fail,
                    Some(ExitDisposition::TimedOut(Duration::from_secs(2))),
                ),
            )
            .unwrap();

        let log = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(log.contains("timed out after 2s, output truncated"));
    }

    #[test]
    fn missing_executable_is_logged_distinctly() {
        let dir = TempDir::new().unwrap();
        let mut session = quiet_session(&dir, None);

        session.record("a", &RunResult::missing()).unwrap();

        let log = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert_eq!(log, "Error: executable a not present!\n");
        assert_eq!(session.summary().failed(), 1);
        assert_eq!(session.summary().total(), 1);
    }

    #[test]
    fn finish_appends_summary_line() {
        let dir = TempDir::new().unwrap();
        let mut session = quiet_session(&dir, None);
        session.record("a", &RunResult::missing()).unwrap();

        let counters = session.finish().unwrap();

        assert_eq!(counters.exit_code(), 1);
        let log = std::fs::read_to_string(dir.path().join("test.log")).unwrap();
        assert!(log.ends_with("\n1 failures out of 1 tests.\n"));
    }

    #[test]
    fn log_write_failure_is_an_error() {
        let dir = TempDir::new().unwrap();
        let sink = ReportSink::silent(dir.path().join("missing-dir").join("test.log"));

        let err = HarnessSession::open(sink, "unit test", None)
            .err()
            .expect("opening a log in a missing directory should fail");

        assert!(matches!(err, Error::Log { .. }));
    }
}
