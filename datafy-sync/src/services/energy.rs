//! Play-count-weighted mean energy
//!
//! Each track's energy is weighted by its share of plays:
//!
//! ```text
//! mean = Σ(plays_i × energy_i) / Σ(plays_i)
//! ```
//!
//! summed over the tracks whose audio features were received. When every
//! fetch succeeds the denominator is the total play count, so the result is
//! `Σ (plays_i / total_plays) × energy_i`. A failed fetch drops the track
//! from both sums, which keeps the mean within the observed energy range.

use datafy_common::{AudioFeatures, PlaybackRecord};
use std::collections::{HashMap, HashSet};

/// Why no mean could be computed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoDataReason {
    /// No playback records in the window
    NoRecords,
    /// Records exist but all have zero plays
    ZeroPlays,
    /// No features matched a record with plays
    NoFeatures,
}

/// Aggregation result
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEnergy {
    pub mean: f64,
    pub total_plays: u64,
    /// Plays of the tracks that contributed to `mean`
    pub contributing_plays: u64,
    pub contributing_tracks: usize,
    pub record_count: usize,
    /// Feature results with no matching record
    pub unmatched: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnergyOutcome {
    Computed(WeightedEnergy),
    NoData(NoDataReason),
}

impl EnergyOutcome {
    pub fn mean(&self) -> Option<f64> {
        match self {
            EnergyOutcome::Computed(weighted) => Some(weighted.mean),
            EnergyOutcome::NoData(_) => None,
        }
    }
}

/// Sum of play counts, saturating at `u64::MAX`
pub fn total_plays(records: &[PlaybackRecord]) -> u64 {
    records
        .iter()
        .fold(0u64, |total, r| total.saturating_add(r.play_count))
}

/// Distinct track ids in first-seen order
pub fn distinct_track_ids(records: &[PlaybackRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| seen.insert(r.track_id.as_str()))
        .map(|r| r.track_id.clone())
        .collect()
}

/// Compute the weighted mean energy of `records` from fetched `features`
///
/// Duplicate record ids have their plays summed. Features for ids not in
/// `records` are logged and ignored; a second feature result for the same
/// id is ignored.
pub fn weighted_mean_energy(records: &[PlaybackRecord], features: &[AudioFeatures]) -> EnergyOutcome {
    if records.is_empty() {
        return EnergyOutcome::NoData(NoDataReason::NoRecords);
    }

    let total_plays = total_plays(records);
    if total_plays == 0 {
        return EnergyOutcome::NoData(NoDataReason::ZeroPlays);
    }

    let mut plays_by_track: HashMap<&str, u64> = HashMap::new();
    for record in records {
        let plays = plays_by_track.entry(record.track_id.as_str()).or_default();
        *plays = plays.saturating_add(record.play_count);
    }

    let mut counted: HashSet<&str> = HashSet::new();
    let mut weighted_sum = 0.0_f64;
    // Normalizer kept in f64 so a saturated counter cannot skew the mean
    let mut weight_total = 0.0_f64;
    let mut contributing_plays = 0u64;
    let mut unmatched = 0usize;

    for feature in features {
        let Some(&plays) = plays_by_track.get(feature.track_id.as_str()) else {
            tracing::warn!(
                track_id = %feature.track_id,
                "Audio features have no matching playback record; skipping"
            );
            unmatched += 1;
            continue;
        };

        if !counted.insert(feature.track_id.as_str()) {
            continue;
        }

        weighted_sum += plays as f64 * feature.energy;
        weight_total += plays as f64;
        contributing_plays = contributing_plays.saturating_add(plays);
    }

    if contributing_plays == 0 {
        return EnergyOutcome::NoData(NoDataReason::NoFeatures);
    }

    EnergyOutcome::Computed(WeightedEnergy {
        mean: weighted_sum / weight_total,
        total_plays,
        contributing_plays,
        contributing_tracks: counted.len(),
        record_count: records.len(),
        unmatched,
    })
}
