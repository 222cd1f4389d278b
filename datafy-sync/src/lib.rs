//! # datafy-sync
//!
//! Batch jobs that sync listening statistics with a music catalog:
//! - `mood`: play-count-weighted mean energy over recent plays
//! - `enrich`: fetch and store detail for tracks that lack it
//! - `compare`: energy difference between two stored tracks
//! - `count`: record a play

pub mod db;
pub mod error;
pub mod jobs;
pub mod services;

pub use error::{SyncError, SyncResult};
