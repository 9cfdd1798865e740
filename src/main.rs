//! AutoRF - retro funding weights from GitHub activity
//!
//! A CLI tool that scores the projects registered in each funding pool by
//! their recent GitHub activity and keeps every pool's payout split in
//! sync with the resulting weights.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (config, row store, GitHub, split relay, lock held)

mod cli;
mod config;
mod error;
mod github;
mod metrics;
mod models;
mod reconcile;
mod recovery;
mod report;
mod seed;
mod splits;
mod store;
#[cfg(test)]
mod testing;
mod weights;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::{Args, Command, PopulateDbArgs, UpdateWeightsArgs};
use config::{Config, CONFIG_FILE};
use github::GithubClient;
use metrics::{MetricsAggregator, PoolMetricsCollector, RetryPolicy};
use models::DateWindow;
use reconcile::{Reconciler, RunLock, SplitAction};
use report::{RunReport, WeightSource};
use splits::RelayClient;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use store::{RowStore, SupabaseStore};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};
use weights::{PoolWeights, WeightComputer};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle init-config early (no logging needed)
    if let Command::InitConfig = args.command {
        return handle_init_config();
    }

    init_logging(&args);

    info!("AutoRF v{}", env!("CARGO_PKG_VERSION"));
    debug!("Command: {:?}", args.command);

    let result = match args.command {
        Command::PopulateDb(ref populate) => run_populate(&args, populate).await,
        Command::UpdateWeights(ref update) => run_update_weights(&args, update).await,
        Command::InitConfig => Ok(()),
    };

    if let Err(e) = result {
        error!("Run failed: {:#}", e);
        eprintln!("\n❌ Error: {:#}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Handle init-config: generate a default .autorf.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("⚠️  {} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE);
    println!("   Secrets are read from GITHUB_TOKEN, SUPABASE_KEY and SPLITS_API_KEY.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// `RUST_LOG` overrides the level picked from --verbose/--quiet.
fn init_logging(args: &Args) {
    let level = args.log_level();
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level.to_string().to_lowercase()));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults, then apply CLI overrides.
fn load_config(args: &Args) -> Result<Config> {
    let mut config = if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        Config::load(config_path)?
    } else {
        match Config::load_default() {
            Ok(Some(config)) => {
                info!("Loaded default config from {}", CONFIG_FILE);
                config
            }
            Ok(None) => {
                debug!("No config file found, using defaults");
                Config::default()
            }
            Err(e) => {
                warn!("Failed to load config: {}", e);
                Config::default()
            }
        }
    };

    config.merge_with_args(args);
    Ok(config)
}

fn connect_store(config: &Config) -> Result<Arc<dyn RowStore>> {
    config.require_store()?;
    let store = SupabaseStore::new(&config.store).context("Failed to create row store client")?;
    Ok(Arc::new(store))
}

/// Insert the seed pool and its example registrations.
async fn run_populate(args: &Args, populate: &PopulateDbArgs) -> Result<()> {
    let config = load_config(args)?;
    let operator = config.require_operator()?.to_string();
    let store = connect_store(&config)?;

    println!("🌱 Populating row store at {}", config.store.url);
    let pool = seed::populate_db(store.as_ref(), &operator, &populate.user_id)
        .await
        .context("Failed to populate the row store")?;

    println!(
        "\n✅ Created pool {} ({}) with {} registrations.",
        pool.name,
        pool.id,
        seed::EXAMPLE_REPOS.len()
    );
    Ok(())
}

/// Compute (or recover) weights and reconcile every pool's split.
async fn run_update_weights(args: &Args, update: &UpdateWeightsArgs) -> Result<()> {
    let start_time = Instant::now();
    let config = load_config(args)?;
    if update.range.is_none() && update.from_file.is_none() {
        config.require_window()?;
    }
    let store = connect_store(&config)?;

    // Held until the run returns.
    let lock = if update.dry_run {
        None
    } else {
        config.require_splits()?;
        Some(RunLock::acquire(&config.general.lock_file).context("Another run holds the lock")?)
    };
    if let Some(ref lock) = lock {
        debug!("Holding run lock {}", lock.path().display());
    }

    let (pool_weights, window, source) = match (&update.from_file, &update.pool) {
        (Some(path), Some(pool_id)) => {
            println!("📄 Loading weights for pool {} from {}", pool_id, path.display());
            let weights = recovery::load_file(store.as_ref(), pool_id, path)
                .await
                .with_context(|| format!("Failed to load recovery file {}", path.display()))?;
            (
                weights,
                None,
                WeightSource::RecoveryFile(path.display().to_string()),
            )
        }
        _ => {
            let window = match update.range {
                Some(range) => range.to_window(),
                None => DateWindow::last_days(config.general.window_days, Utc::now()),
            };
            let weights = compute(args, &config, store.clone(), &window).await?;
            (weights, Some(window), WeightSource::Github)
        }
    };

    if let Some(ref dir) = update.dump {
        let written = recovery::write_dump(dir, &pool_weights)
            .with_context(|| format!("Failed to write recovery files to {}", dir.display()))?;
        println!("💾 Wrote {} recovery files to {}", written.len(), dir.display());
    }

    let reconciler = if update.dry_run {
        Reconciler::dry_run(store.clone())
    } else {
        let relay = RelayClient::new(&config.splits).context("Failed to create split relay client")?;
        Reconciler::new(
            store.clone(),
            Arc::new(relay),
            config.require_operator()?,
            config.splits.chain_id,
        )
    };

    if reconciler.is_dry_run() {
        println!("\n🔍 Dry run: no splits will be created or updated");
    }
    println!("\n🔗 Reconciling {} pools...", pool_weights.len());
    let outcomes = reconciler
        .reconcile(&pool_weights)
        .await
        .context("Failed to reconcile splits")?;

    let report = RunReport {
        generated_at: Utc::now(),
        window,
        source,
        dry_run: update.dry_run,
        duration_seconds: start_time.elapsed().as_secs_f64(),
        pools: outcomes,
    };

    if let Some(ref path) = update.report {
        report::write_report(&report, update.format, path)?;
        println!("📝 Report saved to: {}", path.display());
    }

    println!("\n📊 Run Summary:");
    println!("   Pools: {}", report.pools.len());
    println!(
        "   - 🆕 Created: {} | 🔄 Updated: {} | ⏭️  Skipped: {} | 🔍 Dry run: {}",
        report.count(SplitAction::Created),
        report.count(SplitAction::Updated),
        report.count(SplitAction::Skipped),
        report.count(SplitAction::DryRun)
    );
    println!("   Duration: {:.1}s", report.duration_seconds);
    println!("\n✅ Weights updated!");

    Ok(())
}

/// Aggregate GitHub metrics for every pool and turn them into weights.
async fn compute(
    args: &Args,
    config: &Config,
    store: Arc<dyn RowStore>,
    window: &DateWindow,
) -> Result<PoolWeights> {
    config.require_github()?;

    println!("📈 Collecting GitHub activity for {}", window);
    let github = GithubClient::new(&config.github).context("Failed to create GitHub client")?;
    let aggregator = MetricsAggregator::new(Arc::new(github), RetryPolicy::from(&config.github));
    let collector = PoolMetricsCollector::new(store.clone(), aggregator, !args.quiet);
    let computer = WeightComputer::new(store, collector);

    let pool_weights = computer
        .compute_weights(window)
        .await
        .context("Failed to compute weights")?;

    for (pool_id, weights) in &pool_weights {
        info!("Pool {}: {} weighted contributors", pool_id, weights.len());
    }

    Ok(pool_weights)
}
