//! `count` job: record one play of a track

use super::RunContext;
use crate::db::PlaybackStore;
use crate::error::{SyncError, SyncResult};
use crate::services::catalog_client::validate_track_id;
use chrono::Utc;
use tracing::Instrument;

/// Record a play of `track_id` now; returns the new play count
pub async fn run_play_counter(store: &dyn PlaybackStore, track_id: &str) -> SyncResult<u64> {
    let ctx = RunContext::new("count");
    let span = ctx.span();

    async move {
        validate_track_id(track_id).map_err(|e| SyncError::InvalidInput(e.to_string()))?;

        let play_count = store.record_play(track_id, Utc::now()).await?;
        tracing::info!(track_id = %track_id, play_count, "Play recorded");

        Ok(play_count)
    }
    .instrument(span)
    .await
}
