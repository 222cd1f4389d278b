//! `enrich` job: store catalog detail for tracks that lack it
//!
//! Tracks in the play-count table with no `track` row are fetched from the
//! catalog (metadata and audio features) and written one transaction per
//! track. A failed fetch or write skips that track only.

use super::{check_auth, CatalogConnector, RunContext, RunSummary};
use crate::db::{write_enriched_track, PlaybackStore};
use crate::error::SyncResult;
use crate::services::FanoutCollector;
use datafy_common::config::JobsConfig;
use sqlx::SqlitePool;
use std::time::Duration;
use tracing::Instrument;

pub async fn run_track_enricher(
    pool: &SqlitePool,
    store: &dyn PlaybackStore,
    connector: &dyn CatalogConnector,
    jobs: &JobsConfig,
) -> SyncResult<RunSummary> {
    let ctx = RunContext::new("enrich");
    let span = ctx.span();
    track_enricher(ctx, pool, store, connector, jobs)
        .instrument(span)
        .await
}

async fn track_enricher(
    ctx: RunContext,
    pool: &SqlitePool,
    store: &dyn PlaybackStore,
    connector: &dyn CatalogConnector,
    jobs: &JobsConfig,
) -> SyncResult<RunSummary> {
    let missing = store.missing_detail().await?;
    let mut summary = ctx.summary();

    if missing.is_empty() {
        tracing::info!("Database up to date");
        let summary = summary.finish(&ctx);
        summary.log();
        return Ok(summary);
    }

    tracing::info!(tracks = missing.len(), "Tracks missing detail");

    let _deadline = ctx.arm_deadline(Duration::from_secs(jobs.run_timeout_secs));
    let catalog = connector.connect(&ctx.cancel).await?;

    let collector = FanoutCollector::new(jobs.max_concurrency, ctx.cancel.clone());
    let outcomes = collector
        .collect(missing, |track_id| {
            let catalog = catalog.clone();
            async move { catalog.fetch_enriched(&track_id).await }
        })
        .await;

    // Nothing is written when the token was rejected
    check_auth(&outcomes)?;

    summary.processed = outcomes.len();
    for outcome in outcomes {
        let track = match outcome.result {
            Ok(track) => track,
            Err(e) => {
                summary.record_failure(outcome.track_id, e);
                continue;
            }
        };

        match write_enriched_track(pool, &track).await {
            Ok(()) => summary.succeeded += 1,
            Err(e) => {
                tracing::warn!(track_id = %track.id(), error = %e, "Failed to store track");
                summary.record_failure(outcome.track_id, e);
            }
        }
    }

    let summary = summary.finish(&ctx);
    summary.log();
    Ok(summary)
}
