//! Shared data models
//!
//! Catalog payloads are decoded into these types by the sync crate; the
//! database layer reads and writes them directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the play-count table
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRecord {
    pub track_id: String,
    pub play_count: u64,
    pub last_played: DateTime<Utc>,
}

impl PlaybackRecord {
    pub fn new(track_id: impl Into<String>, play_count: u64, last_played: DateTime<Utc>) -> Self {
        Self {
            track_id: track_id.into(),
            play_count,
            last_played,
        }
    }
}

/// Audio features for a single track
///
/// Every field is required. A catalog response missing any of them fails to
/// decode and the track is treated as a fetch failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Catalog track id (`id` in the catalog payload)
    #[serde(rename = "id")]
    pub track_id: String,
    pub acousticness: f64,
    pub danceability: f64,
    pub duration_ms: i64,
    pub energy: f64,
    pub instrumentalness: f64,
    pub loudness: f64,
    pub speechiness: f64,
    pub tempo: f64,
    pub valence: f64,
}

/// Track metadata, flattened to the first credited artist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackMetadata {
    pub id: String,
    pub name: String,
    pub popularity: i64,
    pub album_id: String,
    pub album_name: String,
    pub artist_id: String,
    pub artist_name: String,
}

/// Metadata and audio features for one track, as written to the database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrack {
    pub metadata: TrackMetadata,
    pub features: AudioFeatures,
}

impl EnrichedTrack {
    pub fn new(metadata: TrackMetadata, features: AudioFeatures) -> Self {
        Self { metadata, features }
    }

    pub fn id(&self) -> &str {
        &self.metadata.id
    }
}
