//! Suite harness for the MPI FFT tests.
//!
//! Runs each FFT sub-harness once and exits with the number of failed or
//! missing sub-harnesses.

use mpi_testharness::cli::{self, ParseOutcome, SuiteArgs};
use mpi_testharness::error::Result;
use mpi_testharness::session::HARNESS_ERROR_EXIT_CODE;
use mpi_testharness::{
    HarnessSession, LocalLauncher, RunExecutor, SuiteConfig, SuiteDriver, Validate,
};

#[tokio::main]
async fn main() {
    cli::init_tracing();

    let args = match cli::parse_args::<SuiteArgs, _, _>(std::env::args_os()) {
        ParseOutcome::Run(args) => args,
        ParseOutcome::Exit(code) => std::process::exit(code),
    };

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("testfft: {}", e);
            std::process::exit(HARNESS_ERROR_EXIT_CODE);
        }
    }
}

async fn run(args: SuiteArgs) -> Result<i32> {
    let mut config = SuiteConfig::default().with_short_run(args.short_run);
    if let Some(secs) = args.timeout {
        config = config.with_timeout_secs(secs);
    }

    for warning in config.validate().into_result()? {
        tracing::warn!(warning = %warning, "suite configuration");
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        let rendered = config.to_toml()?;
        tracing::debug!(config = %rendered, "effective suite configuration");
    }

    let work_dir = std::env::current_dir()?;
    let mut session =
        HarnessSession::start(&config.title, &config.log_file, Some(config.title.as_str()))?;
    let executor = RunExecutor::new(LocalLauncher::new(), work_dir);

    SuiteDriver::new(config).run(&executor, &mut session).await?;

    let counters = session.finish()?;
    Ok(counters.exit_code())
}
