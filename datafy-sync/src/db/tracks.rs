//! Persistence writer for enriched tracks
//!
//! Artist, album and track rows for one track are written in a single
//! transaction. Artists and albums are shared by many tracks, so their
//! inserts are no-ops when the row already exists; a second insert of the
//! same track id fails and rolls the whole write back.

use datafy_common::{AudioFeatures, EnrichedTrack, Result, TrackMetadata};
use sqlx::{Row, SqlitePool};

/// Write artist, album and track for `track` in one transaction
pub async fn write_enriched_track(pool: &SqlitePool, track: &EnrichedTrack) -> Result<()> {
    let metadata = &track.metadata;
    let features = &track.features;

    let mut tx = pool.begin().await?;

    sqlx::query("INSERT INTO artist (id, name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(&metadata.artist_id)
        .bind(&metadata.artist_name)
        .execute(&mut *tx)
        .await?;

    sqlx::query("INSERT INTO album (id, name) VALUES (?, ?) ON CONFLICT(id) DO NOTHING")
        .bind(&metadata.album_id)
        .bind(&metadata.album_name)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO track (
            id, name, album_id, artist_id, acousticness, danceability, duration_ms,
            energy, instrumentalness, loudness, popularity, speechiness, tempo, valence
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&metadata.id)
    .bind(&metadata.name)
    .bind(&metadata.album_id)
    .bind(&metadata.artist_id)
    .bind(features.acousticness)
    .bind(features.danceability)
    .bind(features.duration_ms)
    .bind(features.energy)
    .bind(features.instrumentalness)
    .bind(features.loudness)
    .bind(metadata.popularity)
    .bind(features.speechiness)
    .bind(features.tempo)
    .bind(features.valence)
    .execute(&mut *tx)
    .await?;

    // Dropping an uncommitted transaction rolls it back
    tx.commit().await?;

    tracing::debug!(
        track_id = %metadata.id,
        artist_id = %metadata.artist_id,
        album_id = %metadata.album_id,
        "Stored enriched track"
    );

    Ok(())
}

/// Load a stored track joined with its artist and album names
pub async fn load_enriched_track(pool: &SqlitePool, track_id: &str) -> Result<Option<EnrichedTrack>> {
    let row = sqlx::query(
        r#"
        SELECT t.id, t.name, t.popularity, t.album_id, al.name AS album_name,
               t.artist_id, ar.name AS artist_name,
               t.acousticness, t.danceability, t.duration_ms, t.energy,
               t.instrumentalness, t.loudness, t.speechiness, t.tempo, t.valence
        FROM track t
        JOIN album al ON al.id = t.album_id
        JOIN artist ar ON ar.id = t.artist_id
        WHERE t.id = ?
        "#,
    )
    .bind(track_id)
    .fetch_optional(pool)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };

    let id: String = row.get("id");
    let metadata = TrackMetadata {
        id: id.clone(),
        name: row.get("name"),
        popularity: row.get("popularity"),
        album_id: row.get("album_id"),
        album_name: row.get("album_name"),
        artist_id: row.get("artist_id"),
        artist_name: row.get("artist_name"),
    };
    let features = AudioFeatures {
        track_id: id,
        acousticness: row.get("acousticness"),
        danceability: row.get("danceability"),
        duration_ms: row.get("duration_ms"),
        energy: row.get("energy"),
        instrumentalness: row.get("instrumentalness"),
        loudness: row.get("loudness"),
        speechiness: row.get("speechiness"),
        tempo: row.get("tempo"),
        valence: row.get("valence"),
    };

    Ok(Some(EnrichedTrack::new(metadata, features)))
}

/// Load several stored tracks; ids with no row are left out
pub async fn load_enriched_tracks(pool: &SqlitePool, track_ids: &[String]) -> Result<Vec<EnrichedTrack>> {
    let mut tracks = Vec::with_capacity(track_ids.len());
    for track_id in track_ids {
        if let Some(track) = load_enriched_track(pool, track_id).await? {
            tracks.push(track);
        }
    }
    Ok(tracks)
}
