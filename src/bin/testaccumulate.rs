//! Parameter-sweep harness for the MPI accumulate/transpose executables.
//!
//! Runs every target over the full size × process-count matrix and exits
//! with the number of failed runs.

use rand::rngs::StdRng;
use rand::SeedableRng;

use mpi_testharness::cli::{self, ParseOutcome, SweepArgs};
use mpi_testharness::error::Result;
use mpi_testharness::session::HARNESS_ERROR_EXIT_CODE;
use mpi_testharness::{
    HarnessSession, LocalLauncher, RunExecutor, SweepConfig, SweepDriver, SweepPlan, Validate,
};

#[tokio::main]
async fn main() {
    cli::init_tracing();

    let args = match cli::parse_args::<SweepArgs, _, _>(std::env::args_os()) {
        ParseOutcome::Run(args) => args,
        ParseOutcome::Exit(code) => std::process::exit(code),
    };

    match run(args).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("testaccumulate: {}", e);
            std::process::exit(HARNESS_ERROR_EXIT_CODE);
        }
    }
}

async fn run(args: SweepArgs) -> Result<i32> {
    let mut config = match &args.config {
        Some(path) => SweepConfig::load(path)?,
        None => SweepConfig::default(),
    };
    if let Some(secs) = args.timeout {
        config = config.with_timeout_secs(secs);
    }
    config.launcher = config.launcher.with_env_override();

    for warning in config.validate().into_result()? {
        tracing::warn!(warning = %warning, "sweep configuration");
    }
    if tracing::enabled!(tracing::Level::DEBUG) {
        let rendered = config.to_toml()?;
        tracing::debug!(config = %rendered, "effective sweep configuration");
    }

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let plan = SweepPlan::resolve(&config, &mut rng);

    let work_dir = std::env::current_dir()?;
    let mut session = HarnessSession::start(&config.title, &config.log_file, None)?;
    let executor = RunExecutor::new(LocalLauncher::new(), work_dir);

    SweepDriver::new(config, plan)
        .run(&executor, &mut session)
        .await?;

    let counters = session.finish()?;
    Ok(counters.exit_code())
}
