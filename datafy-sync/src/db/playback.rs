//! Playback store reader
//!
//! The play-count table holds one row per track: total plays and the unix
//! timestamp of the most recent play. Its name is configurable, so it is
//! validated once at construction and interpolated into every query.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use datafy_common::db::validate_identifier;
use datafy_common::{Error, PlaybackRecord, Result};
use sqlx::SqlitePool;

/// Queries against the playback-count store
#[async_trait]
pub trait PlaybackStore: Send + Sync {
    /// Rows whose last play is at or after `since`
    async fn recently_played(&self, since: DateTime<Utc>) -> Result<Vec<PlaybackRecord>>;

    /// Track ids with plays recorded but no row in `track`
    async fn missing_detail(&self) -> Result<Vec<String>>;

    /// Increment the play count for `track_id` and return the new count
    async fn record_play(&self, track_id: &str, played_at: DateTime<Utc>) -> Result<u64>;
}

/// Start of the recency window ending at `now`
///
/// A window reaching past the representable range starts at the earliest
/// representable instant, so every row is in it.
pub fn recency_cutoff(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    TimeDelta::try_days(days)
        .and_then(|window| now.checked_sub_signed(window))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// [`PlaybackStore`] over the SQLite play-count table
#[derive(Debug, Clone)]
pub struct SqlitePlaybackStore {
    pool: SqlitePool,
    table: String,
}

impl SqlitePlaybackStore {
    pub fn new(pool: SqlitePool, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        validate_identifier(&table)?;
        Ok(Self { pool, table })
    }

    fn to_record(track_id: String, play_count: i64, last_played: i64) -> Result<PlaybackRecord> {
        let play_count = u64::try_from(play_count).map_err(|_| {
            Error::InvalidInput(format!("Negative play count {} for {}", play_count, track_id))
        })?;
        let last_played = DateTime::from_timestamp(last_played, 0).ok_or_else(|| {
            Error::InvalidInput(format!("Invalid timestamp {} for {}", last_played, track_id))
        })?;

        Ok(PlaybackRecord::new(track_id, play_count, last_played))
    }
}

#[async_trait]
impl PlaybackStore for SqlitePlaybackStore {
    async fn recently_played(&self, since: DateTime<Utc>) -> Result<Vec<PlaybackRecord>> {
        let query = format!(
            r#"
            SELECT track_id, play_count, last_played_timestamp
            FROM {}
            WHERE last_played_timestamp >= ?
            ORDER BY last_played_timestamp DESC
            "#,
            self.table
        );

        let rows: Vec<(String, i64, i64)> = sqlx::query_as(&query)
            .bind(since.timestamp())
            .fetch_all(&self.pool)
            .await?;

        tracing::debug!(
            table = %self.table,
            since = %since,
            rows = rows.len(),
            "Scanned playback store"
        );

        rows.into_iter()
            .map(|(track_id, play_count, last_played)| {
                Self::to_record(track_id, play_count, last_played)
            })
            .collect()
    }

    async fn missing_detail(&self) -> Result<Vec<String>> {
        let query = format!(
            r#"
            SELECT p.track_id
            FROM {} p
            LEFT JOIN track t ON t.id = p.track_id
            WHERE t.id IS NULL
            ORDER BY p.track_id
            "#,
            self.table
        );

        let ids: Vec<String> = sqlx::query_scalar(&query).fetch_all(&self.pool).await?;

        tracing::debug!(table = %self.table, missing = ids.len(), "Queried tracks missing detail");

        Ok(ids)
    }

    async fn record_play(&self, track_id: &str, played_at: DateTime<Utc>) -> Result<u64> {
        if track_id.trim().is_empty() {
            return Err(Error::InvalidInput("Track id is empty".to_string()));
        }

        let query = format!(
            r#"
            INSERT INTO {table} (track_id, play_count, last_played_timestamp)
            VALUES (?, 1, ?)
            ON CONFLICT(track_id) DO UPDATE SET
                play_count = {table}.play_count + 1,
                last_played_timestamp = MAX({table}.last_played_timestamp, excluded.last_played_timestamp)
            RETURNING play_count
            "#,
            table = self.table
        );

        let play_count: i64 = sqlx::query_scalar(&query)
            .bind(track_id)
            .bind(played_at.timestamp())
            .fetch_one(&self.pool)
            .await?;

        tracing::debug!(track_id = %track_id, play_count, "Recorded play");

        u64::try_from(play_count)
            .map_err(|_| Error::InvalidInput(format!("Negative play count for {}", track_id)))
    }
}
