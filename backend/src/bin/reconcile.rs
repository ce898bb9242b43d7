//! Run the reconciliation scheduler over a seeded in-memory store.
//!
//! Cadence, batching and retry limits come from `MUTUELLE_RECONCILE_*`
//! settings; the command line only chooses the seed, the number of cycles
//! and any accounts to resolve first. Every resolution and every cycle
//! report is written to stdout as one JSON line. Logs go to stderr.
#![cfg_attr(not(any(test, doctest)), deny(clippy::unwrap_used))]
#![cfg_attr(not(any(test, doctest)), deny(clippy::expect_used))]

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Context, Result, eyre};
use mockable::DefaultClock;
use mutuelle_sync::ReconciliationSettings;
use mutuelle_sync::domain::{
    AccountId, CancellationFlag, ProfileResolver, ReconciliationScheduler, RetryRuntime,
    TokioSleeper,
};
use mutuelle_sync::outbound::memory::{MemoryStores, SeedDocument};
use ortho_config::OrthoConfig;
use serde_json::json;
use tokio::runtime::Builder;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

/// `reconcile` command arguments.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reconcile",
    about = "Flag lapsed contributions and repair grants and snapshots on a cadence",
    version
)]
struct CliArgs {
    /// JSON seed describing the starting state of the stores.
    #[arg(long = "seed", value_name = "path")]
    seed: PathBuf,
    /// Number of cycles to run; overrides `MUTUELLE_RECONCILE_MAX_CYCLES`.
    #[arg(long = "cycles", value_name = "n", conflicts_with = "once")]
    cycles: Option<u64>,
    /// Run a single cycle.
    #[arg(long = "once")]
    once: bool,
    /// Account to resolve before reconciling; may be repeated.
    #[arg(long = "resolve", value_name = "account-id", value_parser = parse_account)]
    resolve: Vec<AccountId>,
}

impl CliArgs {
    fn max_cycles(&self, configured: Option<u64>) -> Option<u64> {
        if self.once {
            Some(1)
        } else {
            self.cycles.or(configured)
        }
    }
}

fn parse_account(raw: &str) -> Result<AccountId, String> {
    AccountId::new(raw).map_err(|error| error.to_string())
}

fn main() -> Result<()> {
    color_eyre::install()?;
    if let Err(e) = fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .json()
        .try_init()
    {
        warn!(error = %e, "tracing init failed");
    }

    let args = CliArgs::parse();
    let settings = ReconciliationSettings::load_from_iter([OsString::from("reconcile")])
        .map_err(|error| eyre!("failed to load reconciliation settings: {error}"))?;

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .wrap_err("failed to build reconcile runtime")?;
    runtime.block_on(run(args, settings))
}

async fn run(args: CliArgs, settings: ReconciliationSettings) -> Result<()> {
    let seed = SeedDocument::load(&args.seed)?;
    let stores = MemoryStores::new();
    seed.apply(&stores)?;

    let clock = Arc::new(DefaultClock);
    let stdout = io::stdout();

    let resolver = ProfileResolver::with_retry(
        Arc::clone(&stores.roles),
        clock.clone(),
        RetryRuntime::default(),
        settings.retry_policy(),
    );
    for account_id in &args.resolve {
        let line = match resolver.resolve_role_with_retry(account_id).await {
            Ok(resolution) => json!({ "account": account_id, "resolution": resolution }),
            Err(error) => json!({ "account": account_id, "error": error }),
        };
        writeln!(stdout.lock(), "{line}").wrap_err("failed to write resolution")?;
    }

    let mut config = settings.scheduler_config();
    config.max_cycles = args.max_cycles(config.max_cycles);
    let scheduler = ReconciliationScheduler::new(
        Arc::new(
            stores
                .contribution_service(clock.clone(), settings.contribution_grace_days())
                .with_batch_size(settings.batch_size()),
        ),
        Arc::new(
            stores
                .sharing_service(clock.clone())
                .with_batch_size(settings.batch_size()),
        ),
        Arc::new(
            stores
                .verification_service(clock)
                .with_batch_size(settings.batch_size()),
        ),
        Arc::new(TokioSleeper),
        CancellationFlag::new(),
        config,
    );

    let mut write_error = None;
    let mut failed_cycles = 0_u64;
    let cycles = scheduler
        .run(|report| {
            if report.has_errors() {
                failed_cycles += 1;
            }
            if write_error.is_some() {
                return;
            }
            let written = serde_json::to_string(report)
                .map_err(io::Error::other)
                .and_then(|line| writeln!(stdout.lock(), "{line}"));
            if let Err(error) = written {
                write_error = Some(error);
            }
        })
        .await;

    if let Some(error) = write_error {
        return Err(error).wrap_err("failed to write cycle report");
    }
    info!(cycles, failed_cycles, "reconcile finished");
    Ok(())
}
