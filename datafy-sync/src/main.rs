//! datafy-sync - listening statistics sync jobs
//!
//! ```text
//! datafy-sync mood                 weighted energy of the last week's plays
//! datafy-sync enrich               store catalog detail for tracks missing it
//! datafy-sync compare <ID1> <ID2>  energy difference of two stored tracks
//! datafy-sync count <ID>           record one play
//! ```

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use datafy_common::config::SyncConfig;
use datafy_common::secrets::provider_for;
use datafy_sync::db::SqlitePlaybackStore;
use datafy_sync::jobs::{
    run_mood_tracker, run_play_counter, run_track_comparer, run_track_enricher,
    HttpCatalogConnector,
};
use datafy_sync::services::EnergyOutcome;
use tokio::signal;
use tracing::{info, warn};

/// Command-line arguments for datafy-sync
#[derive(Parser, Debug)]
#[command(name = "datafy-sync")]
#[command(about = "Sync listening statistics with the music catalog")]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "DATAFY_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite database file
    #[arg(short, long, env = "DATAFY_DATABASE")]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Play-count-weighted mean energy over the recency window
    Mood,
    /// Fetch and store detail for tracks that lack it
    Enrich,
    /// Energy difference between two stored tracks
    Compare { first: String, second: String },
    /// Record one play of a track
    Count { track_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = SyncConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    datafy_common::logging::init_tracing(&config.logging)?;

    info!("Starting datafy-sync {}", env!("CARGO_PKG_VERSION"));

    until_shutdown(run(cli, config), shutdown_signal()).await
}

/// Drive `work` unless `shutdown` fires first; an interrupted run is an error
async fn until_shutdown<W, S>(work: W, shutdown: S) -> Result<()>
where
    W: Future<Output = Result<()>>,
    S: Future<Output = ()>,
{
    tokio::select! {
        result = work => result,
        _ = shutdown => {
            warn!("Interrupted; in-flight work abandoned");
            Err(anyhow!("Interrupted before the run completed"))
        }
    }
}

async fn run(cli: Cli, config: SyncConfig) -> Result<()> {
    let db_path = config.resolve_database_path(cli.database.as_deref());
    info!("Database: {}", db_path.display());

    let pool = datafy_common::db::init_database(&db_path, &config.jobs.playcount_table)
        .await
        .context("Failed to open database")?;
    let store = SqlitePlaybackStore::new(pool.clone(), config.jobs.playcount_table.clone())?;

    let secrets = Arc::from(provider_for(config.jobs.secrets_file.as_deref()));
    let connector = HttpCatalogConnector::new(config.catalog.clone(), secrets);

    match cli.command {
        Command::Mood => {
            let report = run_mood_tracker(&store, &connector, &config.jobs)
                .await
                .context("mood run failed")?;
            match report.energy {
                EnergyOutcome::Computed(weighted) => println!("{:.4}", weighted.mean),
                EnergyOutcome::NoData(reason) => println!("no data ({:?})", reason),
            }
        }
        Command::Enrich => {
            let summary = run_track_enricher(&pool, &store, &connector, &config.jobs)
                .await
                .context("enrich run failed")?;
            println!("stored {} of {} tracks", summary.succeeded, summary.processed);
        }
        Command::Compare { first, second } => {
            let comparison = run_track_comparer(&pool, &first, &second)
                .await
                .context("compare run failed")?;
            println!("{:+.4}", comparison.energy_diff);
        }
        Command::Count { track_id } => {
            let play_count = run_play_counter(&store, &track_id)
                .await
                .context("count run failed")?;
            println!("{}", play_count);
        }
    }

    pool.close().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!("Failed to listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
}
