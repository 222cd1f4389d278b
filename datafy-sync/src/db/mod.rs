//! Database access for the sync jobs

pub mod playback;
pub mod tracks;

pub use playback::{recency_cutoff, PlaybackStore, SqlitePlaybackStore};
pub use tracks::{load_enriched_track, load_enriched_tracks, write_enriched_track};
