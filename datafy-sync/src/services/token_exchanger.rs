//! Client-credentials token exchange
//!
//! POSTs `grant_type=client_credentials` to `{accounts_base_url}/api/token`
//! with the client id and secret as HTTP Basic credentials. The returned
//! bearer token is used for every catalog request of one run; it is never
//! refreshed.

use super::catalog_client::{decode_response, CatalogError};
use super::retry_policy::RetryPolicy;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use datafy_common::config::CatalogConfig;
use datafy_common::secrets::CatalogCredentials;
use reqwest::header::AUTHORIZATION;
use serde::Deserialize;
use std::fmt;
use tokio_util::sync::CancellationToken;

/// Bearer token with expiry metadata
#[derive(Clone)]
pub struct AccessToken {
    pub value: String,
    pub token_type: String,
    /// Lifetime in seconds, as reported by the token endpoint
    pub expires_in: i64,
    pub obtained_at: DateTime<Utc>,
}

impl AccessToken {
    pub fn new(value: impl Into<String>, token_type: impl Into<String>, expires_in: i64) -> Self {
        Self {
            value: value.into(),
            token_type: token_type.into(),
            expires_in,
            obtained_at: Utc::now(),
        }
    }

    /// `None` when the lifetime reaches past the representable range
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        ChronoDuration::try_seconds(self.expires_in)
            .and_then(|lifetime| self.obtained_at.checked_add_signed(lifetime))
    }

    pub fn is_expired(&self) -> bool {
        match self.expires_at() {
            Some(expires_at) => Utc::now() >= expires_at,
            None => self.expires_in < 0,
        }
    }

    /// `Authorization` header value; the catalog only accepts the `Bearer` scheme
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.value)
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("value", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("obtained_at", &self.obtained_at)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    token_type: String,
    expires_in: i64,
}

/// `Basic base64(id:secret)`
pub fn basic_credentials(credentials: &CatalogCredentials) -> String {
    let raw = format!("{}:{}", credentials.client_id, credentials.client_secret);
    format!("Basic {}", STANDARD.encode(raw))
}

/// Exchanges client credentials for an [`AccessToken`]
pub struct TokenExchanger {
    http_client: reqwest::Client,
    token_url: String,
    retry: RetryPolicy,
}

impl TokenExchanger {
    pub fn new(http_client: reqwest::Client, config: &CatalogConfig) -> Self {
        Self {
            http_client,
            token_url: format!("{}/api/token", config.accounts_base_url.trim_end_matches('/')),
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Exchange credentials for a token
    ///
    /// Network errors and 5xx are retried; a rejected credential pair comes
    /// back as `Unauthorized` (or `Api(400)` for `invalid_client`) and is
    /// not retried.
    pub async fn exchange(
        &self,
        credentials: &CatalogCredentials,
        cancel: &CancellationToken,
    ) -> Result<AccessToken, CatalogError> {
        if credentials.client_id.trim().is_empty() || credentials.client_secret.trim().is_empty()
        {
            return Err(CatalogError::Unauthorized(
                "Client id or secret is empty".to_string(),
            ));
        }

        let authorization = basic_credentials(credentials);
        let authorization = authorization.as_str();

        tracing::debug!(url = %self.token_url, "Requesting catalog access token");

        let response: TokenResponse = self
            .retry
            .run("exchange client credentials", cancel, || async move {
                let response = self
                    .http_client
                    .post(&self.token_url)
                    .header(AUTHORIZATION, authorization)
                    .form(&[("grant_type", "client_credentials")])
                    .send()
                    .await?;
                decode_response(response, "token endpoint").await
            })
            .await?;

        let token = AccessToken::new(
            response.access_token,
            response.token_type,
            response.expires_in,
        );

        tracing::info!(
            token_type = %token.token_type,
            expires_in = token.expires_in,
            "Catalog access token obtained"
        );

        Ok(token)
    }
}
