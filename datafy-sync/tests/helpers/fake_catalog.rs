//! In-process stand-in for the catalog API
//!
//! Serves `/api/token`, `/v1/tracks/:id` and `/v1/audio-features/:id` from
//! an axum router bound to 127.0.0.1 on an ephemeral port.

use async_trait::async_trait;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use datafy_common::config::CatalogConfig;
use datafy_common::secrets::{CatalogCredentials, SecretsProvider};
use serde_json::{json, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const TEST_CLIENT_ID: &str = "test-client";
pub const TEST_CLIENT_SECRET: &str = "test-secret";
pub const TEST_TOKEN: &str = "test-token";

/// Fake catalog state
#[derive(Default)]
pub struct FakeCatalog {
    tracks: Mutex<HashMap<String, Value>>,
    features: Mutex<HashMap<String, Value>>,
    /// Statuses returned for an id before it is served normally
    failures: Mutex<HashMap<String, VecDeque<u16>>>,
    revoked: AtomicBool,
    token_requests: AtomicUsize,
    api_requests: AtomicUsize,
}

impl FakeCatalog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Track with metadata and features
    pub fn add_track(&self, id: &str, energy: f64) {
        self.tracks.lock().unwrap().insert(id.to_string(), track_json(id));
        self.features
            .lock()
            .unwrap()
            .insert(id.to_string(), features_json(id, energy));
    }

    pub fn set_track(&self, id: &str, track: Value) {
        self.tracks.lock().unwrap().insert(id.to_string(), track);
    }

    /// Serve `served` (a relinked track) when `requested` is asked for
    pub fn relink(&self, requested: &str, served: &str, energy: f64) {
        self.set_track(requested, track_json(served));
        self.set_features(requested, features_json(served, energy));
    }

    pub fn set_features(&self, id: &str, features: Value) {
        self.features.lock().unwrap().insert(id.to_string(), features);
    }

    /// Answer the next requests for `id` with `statuses`, in order
    pub fn fail_next(&self, id: &str, statuses: &[u16]) {
        self.failures
            .lock()
            .unwrap()
            .entry(id.to_string())
            .or_default()
            .extend(statuses.iter().copied());
    }

    /// Reject the bearer token on every GET from now on
    pub fn revoke_token(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn token_requests(&self) -> usize {
        self.token_requests.load(Ordering::SeqCst)
    }

    pub fn api_requests(&self) -> usize {
        self.api_requests.load(Ordering::SeqCst)
    }

    fn next_failure(&self, id: &str) -> Option<u16> {
        self.failures
            .lock()
            .unwrap()
            .get_mut(id)
            .and_then(VecDeque::pop_front)
    }
}

pub fn track_json(id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Song {}", id),
        "popularity": 42,
        "album": {"id": "album1", "name": "Shared Album", "album_type": "album"},
        "artists": [
            {"id": "artist1", "name": "Shared Artist"},
            {"id": "artist2", "name": "Featured Artist"}
        ],
        "duration_ms": 201000,
        "explicit": false
    })
}

/// Track credited to its own artist and album
pub fn solo_track_json(id: &str, artist_id: &str, album_id: &str) -> Value {
    json!({
        "id": id,
        "name": format!("Song {}", id),
        "popularity": 7,
        "album": {"id": album_id, "name": format!("Album {}", album_id), "album_type": "single"},
        "artists": [{"id": artist_id, "name": format!("Artist {}", artist_id)}],
        "duration_ms": 150000,
        "explicit": false
    })
}

pub fn features_json(id: &str, energy: f64) -> Value {
    json!({
        "id": id,
        "acousticness": 0.11,
        "danceability": 0.62,
        "duration_ms": 201000,
        "energy": energy,
        "instrumentalness": 0.0,
        "key": 5,
        "liveness": 0.1,
        "loudness": -5.5,
        "mode": 1,
        "speechiness": 0.04,
        "tempo": 121.0,
        "valence": 0.47,
        "type": "audio_features"
    })
}

/// Start the fake catalog; returns its base URL
pub async fn spawn_fake_catalog(state: Arc<FakeCatalog>) -> String {
    let app = Router::new()
        .route("/api/token", post(token))
        .route("/v1/tracks/:id", get(get_track))
        .route("/v1/audio-features/:id", get(get_features))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    format!("http://{}", addr)
}

/// Config pointing both base URLs at the fake, with fast retries
pub fn test_catalog_config(base_url: &str) -> CatalogConfig {
    CatalogConfig {
        accounts_base_url: base_url.to_string(),
        api_base_url: base_url.to_string(),
        request_timeout_secs: 5,
        max_retries: 3,
        initial_backoff_ms: 1,
        max_backoff_ms: 10,
        max_retry_after_secs: 1,
    }
}

async fn token(
    State(state): State<Arc<FakeCatalog>>,
    headers: HeaderMap,
    body: String,
) -> Response {
    state.token_requests.fetch_add(1, Ordering::SeqCst);

    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{}:{}", TEST_CLIENT_ID, TEST_CLIENT_SECRET))
    );
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str());

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }
    if body != "grant_type=client_credentials" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "unsupported_grant_type"})),
        )
            .into_response();
    }

    Json(json!({
        "access_token": TEST_TOKEN,
        "token_type": "Bearer",
        "expires_in": 3600
    }))
    .into_response()
}

async fn get_track(
    State(state): State<Arc<FakeCatalog>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let body = state.tracks.lock().unwrap().get(&id).cloned();
    serve(&state, &headers, &id, body)
}

async fn get_features(
    State(state): State<Arc<FakeCatalog>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let body = state.features.lock().unwrap().get(&id).cloned();
    serve(&state, &headers, &id, body)
}

fn serve(state: &FakeCatalog, headers: &HeaderMap, id: &str, body: Option<Value>) -> Response {
    state.api_requests.fetch_add(1, Ordering::SeqCst);

    let bearer = format!("Bearer {}", TEST_TOKEN);
    let authorized = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(bearer.as_str());

    if !authorized || state.revoked.load(Ordering::SeqCst) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": {"status": 401, "message": "The access token expired"}})),
        )
            .into_response();
    }

    if let Some(status) = state.next_failure(id) {
        let status = StatusCode::from_u16(status).unwrap();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return (status, [(header::RETRY_AFTER, "0")]).into_response();
        }
        return status.into_response();
    }

    match body {
        Some(body) => Json(body).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": {"status": 404, "message": "Not found."}})),
        )
            .into_response(),
    }
}

/// Fixed credentials
pub struct StaticSecrets(pub CatalogCredentials);

impl StaticSecrets {
    pub fn valid() -> Arc<Self> {
        Arc::new(Self(CatalogCredentials::new(TEST_CLIENT_ID, TEST_CLIENT_SECRET)))
    }

    pub fn wrong() -> Arc<Self> {
        Arc::new(Self(CatalogCredentials::new(TEST_CLIENT_ID, "not-the-secret")))
    }
}

#[async_trait]
impl SecretsProvider for StaticSecrets {
    fn describe(&self) -> String {
        "static test credentials".to_string()
    }

    async fn catalog_credentials(&self) -> datafy_common::Result<CatalogCredentials> {
        Ok(self.0.clone())
    }
}
