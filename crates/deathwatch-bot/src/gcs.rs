//! Google Cloud Storage watermark store over the JSON API.

use crate::watermark::WatermarkStore;
use async_trait::async_trait;
use deathwatch_common::{truncate_string, DeathwatchError, Result};
use deathwatch_config::StorageConfig;
use reqwest::{header, Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// Token endpoint of the GCE / Cloud Functions metadata server.
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Where access tokens come from.
#[derive(Clone)]
pub enum TokenSource {
    /// A fixed token, e.g. from `gcloud auth print-access-token`.
    Static(String),
    /// The instance metadata server.
    MetadataServer(String),
    /// No authentication, for local emulators.
    Anonymous,
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Static(_) => f.write_str("Static(<redacted>)"),
            Self::MetadataServer(url) => f.debug_tuple("MetadataServer").field(url).finish(),
            Self::Anonymous => f.write_str("Anonymous"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
}

/// Stores each key as an object in one bucket.
#[derive(Debug, Clone)]
pub struct GcsWatermarkStore {
    client: Client,
    endpoint: Url,
    bucket: String,
    tokens: TokenSource,
}

impl GcsWatermarkStore {
    /// Creates a store from the storage configuration. Uses the configured
    /// access token when present, otherwise the metadata server.
    pub fn new(config: &StorageConfig, timeout: Duration) -> Result<Self> {
        let tokens = config.access_token.as_ref().map_or_else(
            || TokenSource::MetadataServer(METADATA_TOKEN_URL.to_string()),
            |token| TokenSource::Static(token.clone()),
        );
        Self::with_token_source(config, timeout, tokens)
    }

    /// Creates a store with an explicit token source.
    pub fn with_token_source(
        config: &StorageConfig,
        timeout: Duration,
        tokens: TokenSource,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeathwatchError::network_with_source("Failed to create HTTP client", e))?;
        let endpoint = Url::parse(&config.endpoint).map_err(|e| {
            DeathwatchError::storage_with_source(
                format!("invalid endpoint '{}'", config.endpoint),
                e,
            )
        })?;

        Ok(Self {
            client,
            endpoint,
            bucket: config.bucket.clone(),
            tokens,
        })
    }

    /// `GET .../storage/v1/b/{bucket}/o/{object}?alt=media`
    pub fn object_url(&self, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| DeathwatchError::storage("storage endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(["storage", "v1", "b", self.bucket.as_str(), "o", key]);
        url.query_pairs_mut().append_pair("alt", "media");
        Ok(url)
    }

    /// `POST .../upload/storage/v1/b/{bucket}/o?uploadType=media&name={object}`
    pub fn upload_url(&self, key: &str) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| DeathwatchError::storage("storage endpoint cannot be a base URL"))?
            .pop_if_empty()
            .extend(["upload", "storage", "v1", "b", self.bucket.as_str(), "o"]);
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", key);
        Ok(url)
    }

    async fn access_token(&self) -> Result<Option<String>> {
        match &self.tokens {
            TokenSource::Static(token) => Ok(Some(token.clone())),
            TokenSource::Anonymous => Ok(None),
            TokenSource::MetadataServer(url) => {
                let response = self
                    .client
                    .get(url)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| {
                        DeathwatchError::storage_with_source("Metadata server unreachable", e)
                    })?;
                let body = check_status(response, "access token request")
            .await?
            .text()
            .await?;
                let token: MetadataToken = serde_json::from_str(&body)?;
                Ok(Some(token.access_token))
            }
        }
    }

    async fn authorized(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::RequestBuilder> {
        Ok(match self.access_token().await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }
}

async fn check_status(response: Response, what: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let detail = if status == StatusCode::NOT_FOUND {
        "object not found".to_string()
    } else {
        truncate_string(body.trim(), 200)
    };
    Err(DeathwatchError::storage(format!("{what} returned {status}: {detail}")))
}

#[async_trait]
impl WatermarkStore for GcsWatermarkStore {
    #[instrument(skip(self))]
    async fn read(&self, key: &str) -> Result<String> {
        let request = self.client.get(self.object_url(key)?);
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| DeathwatchError::storage_with_source("Watermark download failed", e))?;
        let value = check_status(response, "watermark download")
            .await?
            .text()
            .await?;
        debug!(bucket = %self.bucket, "Read watermark");
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let request = self
            .client
            .post(self.upload_url(key)?)
            .header(header::CONTENT_TYPE, "text/plain")
            .body(value.to_string());
        let response = self
            .authorized(request)
            .await?
            .send()
            .await
            .map_err(|e| DeathwatchError::storage_with_source("Watermark upload failed", e))?;
        check_status(response, "watermark upload").await?;
        debug!(bucket = %self.bucket, "Wrote watermark");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "gcs"
    }
}
