//! Music catalog API client
//!
//! Authenticated GETs against the catalog's Web API:
//! - `GET {api_base_url}/v1/tracks/{id}` → [`TrackMetadata`]
//! - `GET {api_base_url}/v1/audio-features/{id}` → [`AudioFeatures`]
//!
//! Every failure is a [`CatalogError`] whose [`ErrorKind`] tells the caller
//! what to do with it: retry (Transient), skip the track (NotFound,
//! Permanent), abort the run (Auth), or record it as cut short (Cancelled).

use super::retry_policy::RetryPolicy;
use super::token_exchanger::AccessToken;
use async_trait::async_trait;
use datafy_common::config::CatalogConfig;
use datafy_common::{AudioFeatures, EnrichedTrack, TrackMetadata};
use reqwest::header::{HeaderMap, AUTHORIZATION, RETRY_AFTER};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

pub const USER_AGENT: &str = "datafy-sync/0.1.0";

/// Catalog client errors
#[derive(Debug, Clone, Error)]
pub enum CatalogError {
    /// Connect, timeout or body read failure
    #[error("Network error: {0}")]
    Network(String),

    /// Catalog has no such resource
    #[error("Not found in catalog: {0}")]
    NotFound(String),

    /// 401/403, or credentials rejected at the token endpoint
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// 429
    #[error("Rate limited (retry after {retry_after:?})")]
    RateLimited { retry_after: Option<Duration> },

    /// Any other non-success status
    #[error("API error {0}: {1}")]
    Api(u16, String),

    /// Response body did not decode into the expected shape
    #[error("Parse error: {0}")]
    Parse(String),

    /// Track id is not a catalog identifier; no request was sent
    #[error("Invalid track id: {0:?}")]
    InvalidTrackId(String),

    /// Run deadline passed or the run was cancelled
    #[error("Cancelled")]
    Cancelled,
}

/// What a caller should do with a [`CatalogError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry with backoff
    Transient,
    /// Skip the track
    NotFound,
    /// Abort the run
    Auth,
    /// Skip the track
    Permanent,
    /// Record and stop
    Cancelled,
}

impl CatalogError {
    /// Classify a non-success HTTP status
    pub fn from_status(
        status: u16,
        body: String,
        retry_after: Option<Duration>,
        resource: &str,
    ) -> Self {
        match status {
            404 => CatalogError::NotFound(resource.to_string()),
            401 | 403 => CatalogError::Unauthorized(format!("{} {}", status, body)),
            429 => CatalogError::RateLimited { retry_after },
            _ => CatalogError::Api(status, body),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CatalogError::Network(_) | CatalogError::RateLimited { .. } => ErrorKind::Transient,
            CatalogError::Api(status, _) if *status >= 500 => ErrorKind::Transient,
            CatalogError::Api(..) | CatalogError::Parse(_) | CatalogError::InvalidTrackId(_) => {
                ErrorKind::Permanent
            }
            CatalogError::NotFound(_) => ErrorKind::NotFound,
            CatalogError::Unauthorized(_) => ErrorKind::Auth,
            CatalogError::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Server-requested delay, if any
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            CatalogError::RateLimited { retry_after } => *retry_after,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CatalogError {
    fn from(e: reqwest::Error) -> Self {
        CatalogError::Network(e.to_string())
    }
}

/// `Retry-After` in delta-seconds; HTTP-date values are ignored
pub(crate) fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

/// Decode a success body, or classify the failure status
///
/// Decoding happens after the body is read so that a malformed payload is a
/// `Parse` error rather than a network one.
pub(crate) async fn decode_response<T: DeserializeOwned>(
    response: reqwest::Response,
    resource: &str,
) -> Result<T, CatalogError> {
    let status = response.status();
    if !status.is_success() {
        let retry_after = parse_retry_after(response.headers());
        let error_text = response.text().await.unwrap_or_default();
        return Err(CatalogError::from_status(
            status.as_u16(),
            error_text,
            retry_after,
            resource,
        ));
    }

    let body = response.bytes().await?;
    serde_json::from_slice(&body).map_err(|e| CatalogError::Parse(e.to_string()))
}

/// Catalog lookups used by the jobs
///
/// Implemented over HTTP by [`CatalogClient`]; tests substitute in-process
/// fakes.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn fetch_metadata(&self, track_id: &str) -> Result<TrackMetadata, CatalogError>;

    async fn fetch_audio_features(&self, track_id: &str) -> Result<AudioFeatures, CatalogError>;

    /// Metadata and features fetched concurrently
    ///
    /// Both must describe `track_id`; a relinked answer for another id is a
    /// `Parse` error, since storing it would leave `track_id` without detail.
    async fn fetch_enriched(&self, track_id: &str) -> Result<EnrichedTrack, CatalogError> {
        let (metadata, features) = tokio::try_join!(
            self.fetch_metadata(track_id),
            self.fetch_audio_features(track_id)
        )?;

        if metadata.id != track_id {
            return Err(CatalogError::Parse(format!(
                "Requested track {} but the catalog returned {}",
                track_id, metadata.id
            )));
        }
        if metadata.id != features.track_id {
            return Err(CatalogError::Parse(format!(
                "Audio features for {} returned for a different track ({})",
                metadata.id, features.track_id
            )));
        }

        Ok(EnrichedTrack::new(metadata, features))
    }
}

/// Track object as returned by `/v1/tracks/{id}` (fields we keep)
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogTrack {
    pub id: String,
    pub name: String,
    pub popularity: i64,
    pub album: CatalogRef,
    pub artists: Vec<CatalogRef>,
}

/// Album or artist reference inside a track object
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogRef {
    pub id: String,
    pub name: String,
}

impl TryFrom<CatalogTrack> for TrackMetadata {
    type Error = CatalogError;

    /// Only the first credited artist is kept
    fn try_from(track: CatalogTrack) -> Result<Self, Self::Error> {
        let artist = track
            .artists
            .into_iter()
            .next()
            .ok_or_else(|| CatalogError::Parse(format!("Track {} has no artists", track.id)))?;

        Ok(TrackMetadata {
            id: track.id,
            name: track.name,
            popularity: track.popularity,
            album_id: track.album.id,
            album_name: track.album.name,
            artist_id: artist.id,
            artist_name: artist.name,
        })
    }
}

/// Catalog ids are base62; anything else would end up in the URL path
pub fn validate_track_id(track_id: &str) -> Result<(), CatalogError> {
    if track_id.is_empty()
        || track_id.len() > 64
        || !track_id.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return Err(CatalogError::InvalidTrackId(track_id.to_string()));
    }
    Ok(())
}

/// HTTP client shared by the token exchanger and the catalog client
pub fn build_http_client(config: &CatalogConfig) -> Result<reqwest::Client, CatalogError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(config.request_timeout_secs))
        .build()
        .map_err(|e| CatalogError::Network(e.to_string()))
}

/// Catalog API client bound to one access token
pub struct CatalogClient {
    http_client: reqwest::Client,
    api_base_url: String,
    token: AccessToken,
    retry: RetryPolicy,
    cancel: CancellationToken,
}

impl CatalogClient {
    pub fn new(http_client: reqwest::Client, config: &CatalogConfig, token: AccessToken) -> Self {
        Self {
            http_client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
            token,
            retry: RetryPolicy::from_config(config),
            cancel: CancellationToken::new(),
        }
    }

    /// Abort retries and backoff sleeps when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    fn endpoint(&self, resource: &str, track_id: &str) -> String {
        format!("{}/v1/{}/{}", self.api_base_url, resource, track_id)
    }

    /// One authenticated GET, no retry
    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        resource: &str,
    ) -> Result<T, CatalogError> {
        tracing::debug!(url = %url, "Querying catalog API");

        let response = self
            .http_client
            .get(url)
            .header(AUTHORIZATION, self.token.authorization_header())
            .send()
            .await?;

        decode_response(response, resource).await
    }

    async fn get_with_retry<T: DeserializeOwned>(
        &self,
        operation: &str,
        resource: &str,
        track_id: &str,
    ) -> Result<T, CatalogError> {
        validate_track_id(track_id)?;

        if self.token.is_expired() {
            tracing::warn!(
                track_id = %track_id,
                "Access token has expired; catalog may reject the request"
            );
        }

        let url = self.endpoint(resource, track_id);
        let url = url.as_str();
        let not_found = format!("{} {}", resource, track_id);
        let not_found = not_found.as_str();

        self.retry
            .run(operation, &self.cancel, || self.get_json::<T>(url, not_found))
            .await
    }
}

#[async_trait]
impl Catalog for CatalogClient {
    async fn fetch_metadata(&self, track_id: &str) -> Result<TrackMetadata, CatalogError> {
        let track: CatalogTrack = self
            .get_with_retry("fetch track metadata", "tracks", track_id)
            .await?;
        let metadata = TrackMetadata::try_from(track)?;

        tracing::debug!(
            track_id = %track_id,
            artist_id = %metadata.artist_id,
            album_id = %metadata.album_id,
            "Track metadata fetched"
        );

        Ok(metadata)
    }

    async fn fetch_audio_features(&self, track_id: &str) -> Result<AudioFeatures, CatalogError> {
        let features: AudioFeatures = self
            .get_with_retry("fetch audio features", "audio-features", track_id)
            .await?;

        tracing::debug!(track_id = %track_id, energy = features.energy, "Audio features fetched");

        Ok(features)
    }
}
