//! Job orchestrators
//!
//! Each job runs inside a `run` span carrying the job name and a fresh run
//! id. Catalog access goes through a [`CatalogConnector`], which resolves
//! credentials and exchanges them for a token only once a job knows it has
//! work to do.

pub mod mood_tracker;
pub mod play_counter;
pub mod track_comparer;
pub mod track_enricher;

pub use mood_tracker::{run_mood_tracker, MoodReport};
pub use play_counter::run_play_counter;
pub use track_comparer::{run_track_comparer, EnergyComparison};
pub use track_enricher::run_track_enricher;

use crate::error::{SyncError, SyncResult};
use crate::services::{
    build_http_client, Catalog, CatalogClient, CatalogError, ErrorKind, FetchOutcome,
    TokenExchanger,
};
use async_trait::async_trait;
use datafy_common::config::CatalogConfig;
use datafy_common::secrets::SecretsProvider;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identity and cancellation scope of one job run
#[derive(Debug, Clone)]
pub struct RunContext {
    pub job: &'static str,
    pub run_id: Uuid,
    pub cancel: CancellationToken,
    started: Instant,
}

impl RunContext {
    pub fn new(job: &'static str) -> Self {
        Self {
            job,
            run_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            started: Instant::now(),
        }
    }

    pub fn span(&self) -> tracing::Span {
        tracing::info_span!("run", job = self.job, run_id = %self.run_id)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Cancel the run once `timeout` elapses
    ///
    /// The timer stops when the returned guard is dropped.
    pub fn arm_deadline(&self, timeout: Duration) -> DeadlineGuard {
        let cancel = self.cancel.clone();
        let handle = tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = tokio::time::sleep(timeout) => {
                    tracing::warn!(timeout_secs = timeout.as_secs(), "Run deadline reached, cancelling");
                    cancel.cancel();
                }
            }
        });
        DeadlineGuard { handle }
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            job: self.job,
            run_id: self.run_id,
            processed: 0,
            succeeded: 0,
            failed: Vec::new(),
            duration: Duration::ZERO,
        }
    }
}

/// Aborts the deadline timer on drop
#[derive(Debug)]
pub struct DeadlineGuard {
    handle: JoinHandle<()>,
}

impl Drop for DeadlineGuard {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// A track the run could not process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedTrack {
    pub track_id: String,
    pub reason: String,
}

impl FailedTrack {
    pub fn new(track_id: impl Into<String>, reason: impl fmt::Display) -> Self {
        Self {
            track_id: track_id.into(),
            reason: reason.to_string(),
        }
    }
}

/// End-of-run summary
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub job: &'static str,
    pub run_id: Uuid,
    pub processed: usize,
    pub succeeded: usize,
    pub failed: Vec<FailedTrack>,
    pub duration: Duration,
}

impl RunSummary {
    pub fn record_failure(&mut self, track_id: impl Into<String>, reason: impl fmt::Display) {
        self.failed.push(FailedTrack::new(track_id, reason));
    }

    pub fn finish(mut self, ctx: &RunContext) -> Self {
        self.duration = ctx.elapsed();
        self
    }

    /// Log at INFO, or WARN listing each failed track
    pub fn log(&self) {
        if self.failed.is_empty() {
            tracing::info!(
                job = self.job,
                run_id = %self.run_id,
                processed = self.processed,
                succeeded = self.succeeded,
                duration_ms = self.duration.as_millis() as u64,
                "Run complete"
            );
            return;
        }

        for failure in &self.failed {
            tracing::warn!(track_id = %failure.track_id, reason = %failure.reason, "Track failed");
        }
        tracing::warn!(
            job = self.job,
            run_id = %self.run_id,
            processed = self.processed,
            succeeded = self.succeeded,
            failed = self.failed.len(),
            duration_ms = self.duration.as_millis() as u64,
            "Run complete with failures"
        );
    }
}

/// Abort on the first `Auth` outcome; a rejected token fails every other
/// request too
pub(crate) fn check_auth<T>(outcomes: &[FetchOutcome<T>]) -> SyncResult<()> {
    let rejected = outcomes
        .iter()
        .filter_map(|o| o.result.as_ref().err())
        .find(|e| e.kind() == ErrorKind::Auth);

    match rejected {
        Some(err) => Err(SyncError::Auth(err.clone())),
        None => Ok(()),
    }
}

/// Produces an authorized [`Catalog`] for one run
#[async_trait]
pub trait CatalogConnector: Send + Sync {
    async fn connect(&self, cancel: &CancellationToken) -> SyncResult<Arc<dyn Catalog>>;
}

/// Secrets → token exchange → HTTP [`CatalogClient`]
pub struct HttpCatalogConnector {
    config: CatalogConfig,
    secrets: Arc<dyn SecretsProvider>,
}

impl HttpCatalogConnector {
    pub fn new(config: CatalogConfig, secrets: Arc<dyn SecretsProvider>) -> Self {
        Self { config, secrets }
    }
}

#[async_trait]
impl CatalogConnector for HttpCatalogConnector {
    async fn connect(&self, cancel: &CancellationToken) -> SyncResult<Arc<dyn Catalog>> {
        tracing::info!(source = %self.secrets.describe(), "Authorizing catalog access");

        let credentials = self
            .secrets
            .catalog_credentials()
            .await
            .map_err(SyncError::Secrets)?;

        let http_client =
            build_http_client(&self.config).map_err(|e| SyncError::Client(e.to_string()))?;

        let token = TokenExchanger::new(http_client.clone(), &self.config)
            .exchange(&credentials, cancel)
            .await
            .map_err(|e| match e {
                CatalogError::Cancelled => SyncError::Cancelled,
                other => SyncError::Auth(other),
            })?;

        let client = CatalogClient::new(http_client, &self.config, token)
            .with_cancellation(cancel.clone());

        Ok(Arc::new(client))
    }
}
