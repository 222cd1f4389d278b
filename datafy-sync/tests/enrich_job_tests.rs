//! `enrich` job end to end: SQLite store, fake catalog over HTTP

mod helpers;

use chrono::Utc;
use datafy_common::config::JobsConfig;
use datafy_sync::db::{load_enriched_track, PlaybackStore, SqlitePlaybackStore};
use datafy_sync::jobs::{run_track_enricher, HttpCatalogConnector};
use datafy_sync::SyncError;
use helpers::*;
use tempfile::TempDir;

fn jobs_config() -> JobsConfig {
    JobsConfig {
        max_concurrency: 4,
        run_timeout_secs: 30,
        ..JobsConfig::default()
    }
}

#[tokio::test]
async fn test_enrich_fills_missing_tracks() {
    let fake = FakeCatalog::new();
    fake.add_track("one", 0.4);
    fake.add_track("two", 0.9);
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let (pool, store) = create_test_store().await;
    let now = Utc::now();
    seed_play(&pool, "one", 3, now).await;
    seed_play(&pool, "two", 1, now).await;
    seed_play(&pool, "gone", 2, now).await; // 404 in the catalog

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    let summary = run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].track_id, "gone");

    assert_eq!(count_rows(&pool, "track").await, 2);
    // Both tracks credit the same first artist and album
    assert_eq!(count_rows(&pool, "artist").await, 1);
    assert_eq!(count_rows(&pool, "album").await, 1);

    let stored = load_enriched_track(&pool, "two").await.unwrap().unwrap();
    assert_eq!(stored.features.energy, 0.9);
    assert_eq!(stored.metadata.artist_name, "Shared Artist");
}

#[tokio::test]
async fn test_enrich_up_to_date_skips_catalog() {
    let fake = FakeCatalog::new();
    fake.add_track("one", 0.4);
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let (pool, store) = create_test_store().await;
    seed_play(&pool, "one", 1, Utc::now()).await;

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();
    assert_eq!(fake.token_requests(), 1);

    // Second run finds nothing to do and never authorizes
    let summary = run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();

    assert_eq!(summary.processed, 0);
    assert!(summary.failed.is_empty());
    assert_eq!(fake.token_requests(), 1);
}

#[tokio::test]
async fn test_enrich_rejected_credentials_abort() {
    let fake = FakeCatalog::new();
    fake.add_track("one", 0.4);
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let (pool, store) = create_test_store().await;
    seed_play(&pool, "one", 1, Utc::now()).await;

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::wrong());
    let result = run_track_enricher(&pool, &store, &connector, &jobs_config()).await;

    assert!(matches!(result, Err(SyncError::Auth(_))));
    assert_eq!(fake.api_requests(), 0);
}

#[tokio::test]
async fn test_enrich_revoked_token_writes_nothing() {
    let fake = FakeCatalog::new();
    fake.add_track("one", 0.4);
    fake.add_track("two", 0.6);
    let base_url = spawn_fake_catalog(fake.clone()).await;
    fake.revoke_token();

    let (pool, store) = create_test_store().await;
    seed_play(&pool, "one", 1, Utc::now()).await;
    seed_play(&pool, "two", 1, Utc::now()).await;

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    let result = run_track_enricher(&pool, &store, &connector, &jobs_config()).await;

    assert!(matches!(result, Err(SyncError::Auth(_))));
    assert_eq!(count_rows(&pool, "track").await, 0);
}

#[tokio::test]
async fn test_enrich_retries_flaky_track() {
    let fake = FakeCatalog::new();
    fake.add_track("flaky", 0.4);
    fake.fail_next("flaky", &[503]);
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let (pool, store) = create_test_store().await;
    seed_play(&pool, "flaky", 1, Utc::now()).await;

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    let summary = run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(count_rows(&pool, "track").await, 1);
}

#[tokio::test]
async fn test_enrich_rejects_relinked_track() {
    let fake = FakeCatalog::new();
    fake.relink("asked", "other", 0.5);
    fake.add_track("plain", 0.3);
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let (pool, store) = create_test_store().await;
    seed_play(&pool, "asked", 2, Utc::now()).await;
    seed_play(&pool, "plain", 1, Utc::now()).await;

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    let summary = run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].track_id, "asked");
    assert!(load_enriched_track(&pool, "other").await.unwrap().is_none());

    // Skipped again on the next run; never a duplicate insert
    let summary = run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();
    assert_eq!(summary.failed.len(), 1);
    assert!(!summary.failed[0].reason.contains("UNIQUE"));
    assert_eq!(count_rows(&pool, "track").await, 1);
}

#[tokio::test]
async fn test_enrich_write_failure_skips_only_that_track() {
    let fake = FakeCatalog::new();
    fake.add_track("good1", 0.2);
    fake.add_track("good2", 0.7);
    fake.set_track("bad", solo_track_json("bad", "lonely_artist", "lonely_album"));
    fake.set_features("bad", features_json("bad", 0.5));
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let (pool, store) = create_test_store().await;
    for id in ["good1", "good2", "bad"] {
        seed_play(&pool, id, 1, Utc::now()).await;
    }
    // Fails the track insert after artist and album were written in the same transaction
    sqlx::query(
        r#"
        CREATE TRIGGER reject_bad_track BEFORE INSERT ON track
        WHEN NEW.id = 'bad'
        BEGIN SELECT RAISE(ABORT, 'track rejected'); END
        "#,
    )
    .execute(&pool)
    .await
    .unwrap();

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    let summary = run_track_enricher(&pool, &store, &connector, &jobs_config())
        .await
        .unwrap();

    assert_eq!(summary.processed, 3);
    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.failed.len(), 1);
    assert_eq!(summary.failed[0].track_id, "bad");

    assert!(load_enriched_track(&pool, "good1").await.unwrap().is_some());
    assert!(load_enriched_track(&pool, "good2").await.unwrap().is_some());
    assert_eq!(count_rows(&pool, "track").await, 2);

    let lonely_artists: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM artist WHERE id = 'lonely_artist'")
        .fetch_one(&pool)
        .await
        .unwrap();
    let lonely_albums: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM album WHERE id = 'lonely_album'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(lonely_artists, 0);
    assert_eq!(lonely_albums, 0);
    assert_eq!(store.missing_detail().await.unwrap(), vec!["bad".to_string()]);
}

#[tokio::test]
async fn test_enrich_on_disk_database() {
    let fake = FakeCatalog::new();
    let ids: Vec<String> = (0..20).map(|i| format!("disk{:02}", i)).collect();
    for (i, id) in ids.iter().enumerate() {
        fake.add_track(id, i as f64 / 20.0);
    }
    let base_url = spawn_fake_catalog(fake.clone()).await;

    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("datafy.db");
    let pool = datafy_common::db::init_database(&db_path, "history").await.unwrap();
    let store = SqlitePlaybackStore::new(pool.clone(), "history").unwrap();
    for id in &ids {
        store.record_play(id, Utc::now()).await.unwrap();
    }

    let connector = HttpCatalogConnector::new(test_catalog_config(&base_url), StaticSecrets::valid());
    let jobs = JobsConfig {
        playcount_table: "history".to_string(),
        ..jobs_config()
    };
    let summary = run_track_enricher(&pool, &store, &connector, &jobs).await.unwrap();

    assert_eq!(summary.succeeded, 20);
    pool.close().await;

    // Everything survives a reopen
    let reopened = datafy_common::db::init_database(&db_path, "history").await.unwrap();
    assert_eq!(count_rows(&reopened, "track").await, 20);
    let store = SqlitePlaybackStore::new(reopened, "history").unwrap();
    assert!(store.missing_detail().await.unwrap().is_empty());
}
