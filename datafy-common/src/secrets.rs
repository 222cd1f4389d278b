//! Catalog credential retrieval
//!
//! Credentials come either from a JSON secret blob (the shape the managed
//! secret store returns) or from a pair of environment variables.

use crate::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

pub const CLIENT_ID_ENV: &str = "SPOTIFY_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "SPOTIFY_CLIENT_SECRET";

/// Client-credential pair for the catalog token endpoint
#[derive(Clone, Deserialize)]
pub struct CatalogCredentials {
    #[serde(rename = "spotify_client_id")]
    pub client_id: String,
    #[serde(rename = "spotify_secret")]
    pub client_secret: String,
}

impl CatalogCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    fn validated(self, source: &str) -> Result<Self> {
        if self.client_id.trim().is_empty() || self.client_secret.trim().is_empty() {
            return Err(Error::Secrets(format!(
                "Catalog credentials from {} are empty",
                source
            )));
        }
        Ok(self)
    }
}

// Never print the secret
impl fmt::Debug for CatalogCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

/// Source of catalog credentials
#[async_trait]
pub trait SecretsProvider: Send + Sync {
    /// Short description for logs
    fn describe(&self) -> String;

    async fn catalog_credentials(&self) -> Result<CatalogCredentials>;
}

/// Reads `{"spotify_client_id": ..., "spotify_secret": ...}` from a file
#[derive(Debug, Clone)]
pub struct FileSecretsProvider {
    path: PathBuf,
}

impl FileSecretsProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SecretsProvider for FileSecretsProvider {
    fn describe(&self) -> String {
        format!("secret file {}", self.path.display())
    }

    async fn catalog_credentials(&self) -> Result<CatalogCredentials> {
        info!(path = %self.path.display(), "Retrieving catalog secrets");

        let blob = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            Error::Secrets(format!("Read {} failed: {}", self.path.display(), e))
        })?;

        let credentials: CatalogCredentials = serde_json::from_str(&blob).map_err(|e| {
            Error::Secrets(format!("Parse {} failed: {}", self.path.display(), e))
        })?;

        credentials.validated(&self.describe())
    }
}

/// Reads the credential pair from environment variables
#[derive(Debug, Clone)]
pub struct EnvSecretsProvider {
    id_var: String,
    secret_var: String,
}

impl EnvSecretsProvider {
    pub fn new(id_var: impl Into<String>, secret_var: impl Into<String>) -> Self {
        Self {
            id_var: id_var.into(),
            secret_var: secret_var.into(),
        }
    }
}

impl Default for EnvSecretsProvider {
    fn default() -> Self {
        Self::new(CLIENT_ID_ENV, CLIENT_SECRET_ENV)
    }
}

#[async_trait]
impl SecretsProvider for EnvSecretsProvider {
    fn describe(&self) -> String {
        format!("environment ({}, {})", self.id_var, self.secret_var)
    }

    async fn catalog_credentials(&self) -> Result<CatalogCredentials> {
        info!("Retrieving catalog secrets from environment");

        let read = |name: &str| {
            std::env::var(name)
                .map_err(|_| Error::Secrets(format!("Environment variable {} is not set", name)))
        };

        CatalogCredentials::new(read(self.id_var.as_str())?, read(self.secret_var.as_str())?)
            .validated(&self.describe())
    }
}

/// Pick the provider: secret file when configured, environment otherwise
pub fn provider_for(secrets_file: Option<&Path>) -> Box<dyn SecretsProvider> {
    match secrets_file {
        Some(path) => Box::new(FileSecretsProvider::new(path)),
        None => Box::new(EnvSecretsProvider::default()),
    }
}
