//! Database initialization
//!
//! Opens (or creates) the SQLite database and creates the artist, album,
//! track and play-count tables if they are missing. Every statement is
//! idempotent, so running a job against an existing database is safe.

use super::validate_identifier;
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the database file and create tables if needed
pub async fn init_database(db_path: &Path, playcount_table: &str) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas go on the connect options so every pooled connection gets them.
    // WAL lets the reader queries run alongside the per-track write transactions.
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool, playcount_table).await?;

    Ok(pool)
}

/// Single-connection in-memory database with the full schema
///
/// Every pooled connection to `sqlite::memory:` would see its own empty
/// database, so the pool is capped at one connection.
pub async fn init_memory_database(playcount_table: &str) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool, playcount_table).await?;

    Ok(pool)
}

/// Create every table used by the jobs
pub async fn create_schema(pool: &SqlitePool, playcount_table: &str) -> Result<()> {
    create_artist_table(pool).await?;
    create_album_table(pool).await?;
    create_track_table(pool).await?;
    create_playcount_table(pool, playcount_table).await?;
    Ok(())
}

pub async fn create_artist_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS artist (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_album_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS album (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn create_track_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS track (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            album_id TEXT NOT NULL REFERENCES album(id),
            artist_id TEXT NOT NULL REFERENCES artist(id),
            acousticness REAL NOT NULL,
            danceability REAL NOT NULL,
            duration_ms INTEGER NOT NULL,
            energy REAL NOT NULL,
            instrumentalness REAL NOT NULL,
            loudness REAL NOT NULL,
            popularity INTEGER NOT NULL,
            speechiness REAL NOT NULL,
            tempo REAL NOT NULL,
            valence REAL NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Play-count table; `last_played_timestamp` is unix seconds
pub async fn create_playcount_table(pool: &SqlitePool, table: &str) -> Result<()> {
    validate_identifier(table)?;

    let create = format!(
        r#"
        CREATE TABLE IF NOT EXISTS {table} (
            track_id TEXT PRIMARY KEY,
            play_count INTEGER NOT NULL DEFAULT 0 CHECK (play_count >= 0),
            last_played_timestamp INTEGER NOT NULL
        )
        "#
    );
    sqlx::query(&create).execute(pool).await?;

    let index = format!(
        "CREATE INDEX IF NOT EXISTS idx_{table}_last_played ON {table}(last_played_timestamp)"
    );
    sqlx::query(&index).execute(pool).await?;

    Ok(())
}
