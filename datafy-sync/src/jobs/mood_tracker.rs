//! `mood` job: play-count-weighted energy of recent listening
//!
//! Reads the plays in the recency window, fetches audio features for each
//! distinct track, and reports the weighted mean energy.

use super::{check_auth, CatalogConnector, RunContext, RunSummary};
use crate::db::{recency_cutoff, PlaybackStore};
use crate::error::SyncResult;
use crate::services::energy::{distinct_track_ids, total_plays};
use crate::services::{weighted_mean_energy, EnergyOutcome, FanoutCollector, NoDataReason};
use chrono::Utc;
use datafy_common::config::JobsConfig;
use std::time::Duration;
use tracing::Instrument;

/// Result of a mood run
#[derive(Debug, Clone)]
pub struct MoodReport {
    pub summary: RunSummary,
    pub energy: EnergyOutcome,
}

pub async fn run_mood_tracker(
    store: &dyn PlaybackStore,
    connector: &dyn CatalogConnector,
    jobs: &JobsConfig,
) -> SyncResult<MoodReport> {
    let ctx = RunContext::new("mood");
    let span = ctx.span();
    mood_tracker(ctx, store, connector, jobs).instrument(span).await
}

async fn mood_tracker(
    ctx: RunContext,
    store: &dyn PlaybackStore,
    connector: &dyn CatalogConnector,
    jobs: &JobsConfig,
) -> SyncResult<MoodReport> {
    let since = recency_cutoff(Utc::now(), jobs.recency_days);
    let records = store.recently_played(since).await?;
    let mut summary = ctx.summary();

    let total = total_plays(&records);
    tracing::info!(
        records = records.len(),
        total_plays = total,
        since = %since,
        "Loaded recent plays"
    );

    if records.is_empty() || total == 0 {
        let reason = if records.is_empty() {
            NoDataReason::NoRecords
        } else {
            NoDataReason::ZeroPlays
        };
        tracing::info!(?reason, "No plays in window");
        let summary = summary.finish(&ctx);
        summary.log();
        return Ok(MoodReport {
            summary,
            energy: EnergyOutcome::NoData(reason),
        });
    }

    let _deadline = ctx.arm_deadline(Duration::from_secs(jobs.run_timeout_secs));
    let catalog = connector.connect(&ctx.cancel).await?;

    let collector = FanoutCollector::new(jobs.max_concurrency, ctx.cancel.clone());
    let outcomes = collector
        .collect(distinct_track_ids(&records), |track_id| {
            let catalog = catalog.clone();
            async move { catalog.fetch_audio_features(&track_id).await }
        })
        .await;

    check_auth(&outcomes)?;

    summary.processed = outcomes.len();
    let mut features = Vec::with_capacity(outcomes.len());
    for outcome in outcomes {
        match outcome.result {
            Ok(fetched) => features.push(fetched),
            Err(e) => summary.record_failure(outcome.track_id, e),
        }
    }
    summary.succeeded = features.len();

    let energy = weighted_mean_energy(&records, &features);
    match &energy {
        EnergyOutcome::Computed(weighted) => tracing::info!(
            mean_energy = weighted.mean,
            total_plays = weighted.total_plays,
            contributing_plays = weighted.contributing_plays,
            contributing_tracks = weighted.contributing_tracks,
            "Weighted mean energy computed"
        ),
        EnergyOutcome::NoData(reason) => {
            tracing::warn!(?reason, "No audio features received; energy not computed")
        }
    }

    let summary = summary.finish(&ctx);
    summary.log();

    Ok(MoodReport { summary, energy })
}
