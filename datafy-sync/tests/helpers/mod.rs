//! Test Helper Utilities
//!
//! Shared utilities for testing datafy-sync

// Each test binary uses a different subset
#![allow(dead_code, unused_imports)]

pub mod db_utils;
pub mod fake_catalog;

pub use db_utils::{count_rows, create_test_store, seed_play};
pub use fake_catalog::{
    features_json, solo_track_json, spawn_fake_catalog, test_catalog_config, track_json, FakeCatalog,
    StaticSecrets, TEST_CLIENT_ID, TEST_CLIENT_SECRET, TEST_TOKEN,
};
