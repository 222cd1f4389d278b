//! `compare` job: energy difference between two stored tracks

use super::RunContext;
use crate::db::load_enriched_track;
use crate::error::SyncResult;
use datafy_common::{EnrichedTrack, Error};
use sqlx::SqlitePool;
use tracing::Instrument;

#[derive(Debug, Clone, PartialEq)]
pub struct EnergyComparison {
    pub first: EnrichedTrack,
    pub second: EnrichedTrack,
    /// `first.energy - second.energy`
    pub energy_diff: f64,
}

pub async fn run_track_comparer(
    pool: &SqlitePool,
    first_id: &str,
    second_id: &str,
) -> SyncResult<EnergyComparison> {
    let ctx = RunContext::new("compare");
    let span = ctx.span();

    async move {
        let first = load_required(pool, first_id).await?;
        let second = load_required(pool, second_id).await?;
        let energy_diff = first.features.energy - second.features.energy;

        tracing::info!(
            first = %first_id,
            second = %second_id,
            first_energy = first.features.energy,
            second_energy = second.features.energy,
            energy_diff,
            "Energy difference"
        );

        Ok(EnergyComparison {
            first,
            second,
            energy_diff,
        })
    }
    .instrument(span)
    .await
}

async fn load_required(pool: &SqlitePool, track_id: &str) -> SyncResult<EnrichedTrack> {
    load_enriched_track(pool, track_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("Track {} has no stored detail", track_id)).into())
}
