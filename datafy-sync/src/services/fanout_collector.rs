//! Bounded concurrent per-track fetch
//!
//! Every dispatched track id yields exactly one [`FetchOutcome`]. Outcomes
//! are gathered by awaiting each fetch future through
//! `buffer_unordered(max_concurrency)`, so none can be dropped; fetches cut
//! short by the run's cancellation token resolve to `CatalogError::Cancelled`.

use super::catalog_client::{CatalogError, ErrorKind};
use futures::stream::{self, StreamExt};
use std::future::Future;
use tokio_util::sync::CancellationToken;

/// Result of one per-track fetch
#[derive(Debug)]
pub struct FetchOutcome<T> {
    pub track_id: String,
    pub result: Result<T, CatalogError>,
}

impl<T> FetchOutcome<T> {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }

    pub fn error_kind(&self) -> Option<ErrorKind> {
        self.result.as_ref().err().map(CatalogError::kind)
    }
}

/// Outcome tally for logging and summaries
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutcomeCounts {
    pub succeeded: usize,
    pub not_found: usize,
    pub permanent: usize,
    pub transient: usize,
    pub auth: usize,
    pub cancelled: usize,
}

impl OutcomeCounts {
    pub fn tally<T>(outcomes: &[FetchOutcome<T>]) -> Self {
        let mut counts = Self::default();
        for outcome in outcomes {
            match outcome.error_kind() {
                None => counts.succeeded += 1,
                Some(ErrorKind::NotFound) => counts.not_found += 1,
                Some(ErrorKind::Permanent) => counts.permanent += 1,
                // Retries exhausted
                Some(ErrorKind::Transient) => counts.transient += 1,
                Some(ErrorKind::Auth) => counts.auth += 1,
                Some(ErrorKind::Cancelled) => counts.cancelled += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.succeeded + self.not_found + self.permanent + self.transient + self.auth + self.cancelled
    }
}

/// Fans a fetch out over track ids with bounded concurrency
#[derive(Debug, Clone)]
pub struct FanoutCollector {
    max_concurrency: usize,
    cancel: CancellationToken,
}

impl FanoutCollector {
    pub fn new(max_concurrency: usize, cancel: CancellationToken) -> Self {
        Self {
            max_concurrency: max_concurrency.max(1),
            cancel,
        }
    }

    /// Run `fetch` once per id and return one outcome per id, in completion order
    pub async fn collect<T, F, Fut>(&self, track_ids: Vec<String>, fetch: F) -> Vec<FetchOutcome<T>>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let dispatched = track_ids.len();
        let fetch = &fetch;
        let cancel = &self.cancel;

        tracing::debug!(
            dispatched,
            max_concurrency = self.max_concurrency,
            "Dispatching catalog fetches"
        );

        let outcomes: Vec<FetchOutcome<T>> = stream::iter(track_ids)
            .map(|track_id| async move {
                // Checked first so queued fetches do not start after cancellation
                let result = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Err(CatalogError::Cancelled),
                    result = fetch(track_id.clone()) => result,
                };

                if let Err(e) = &result {
                    tracing::debug!(track_id = %track_id, error = %e, "Catalog fetch failed");
                }

                FetchOutcome { track_id, result }
            })
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        if outcomes.len() != dispatched {
            tracing::error!(
                dispatched,
                collected = outcomes.len(),
                "Fan-out outcome count does not match dispatched fetches"
            );
        }

        let counts = OutcomeCounts::tally(&outcomes);
        tracing::info!(
            dispatched,
            succeeded = counts.succeeded,
            not_found = counts.not_found,
            failed = counts.permanent + counts.transient + counts.auth,
            cancelled = counts.cancelled,
            "Catalog fan-out complete"
        );

        outcomes
    }
}
