//! Database Test Utilities

use chrono::{DateTime, Utc};
use datafy_sync::db::SqlitePlaybackStore;
use sqlx::SqlitePool;

/// In-memory database with the full schema and a store over `playcount`
pub async fn create_test_store() -> (SqlitePool, SqlitePlaybackStore) {
    let pool = datafy_common::db::init_memory_database("playcount")
        .await
        .unwrap();
    let store = SqlitePlaybackStore::new(pool.clone(), "playcount").unwrap();
    (pool, store)
}

/// Insert a play-count row directly
pub async fn seed_play(pool: &SqlitePool, track_id: &str, plays: i64, last_played: DateTime<Utc>) {
    sqlx::query(
        "INSERT INTO playcount (track_id, play_count, last_played_timestamp) VALUES (?, ?, ?)",
    )
    .bind(track_id)
    .bind(plays)
    .bind(last_played.timestamp())
    .execute(pool)
    .await
    .unwrap();
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> i64 {
    sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {}", table))
        .fetch_one(pool)
        .await
        .unwrap()
}
