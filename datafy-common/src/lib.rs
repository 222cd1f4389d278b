//! # Datafy Common Library
//!
//! Shared code for the datafy sync jobs:
//! - Track, playback and audio-feature models
//! - Database initialization and schema
//! - Configuration loading (TOML + environment)
//! - Catalog credential retrieval
//! - Tracing setup

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod secrets;

pub use error::{Error, Result};
pub use models::{AudioFeatures, EnrichedTrack, PlaybackRecord, TrackMetadata};
