//! Mastodon publisher.
//!
//! Uploads through `/api/v2/media`, which may answer `202 Accepted` while
//! the image is still being processed; the attachment is polled until it
//! has a URL before the status referencing it is created.

use crate::message::{format_message, media_description};
use crate::publisher::{ensure_success, PublishOutcome, PublishStage, Publisher};
use async_trait::async_trait;
use deathwatch_common::{DeathwatchError, PublishPayload, Result};
use deathwatch_config::MastodonConfig;
use reqwest::{multipart, Client, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, instrument};

const PLATFORM: &str = "mastodon";

/// Polls of an attachment still being processed.
const MEDIA_POLL_ATTEMPTS: u32 = 10;
const MEDIA_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    id: String,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Status {
    id: String,
}

fn parse_attachment(body: &str) -> Result<MediaAttachment> {
    Ok(serde_json::from_str(body)?)
}

fn parse_status_id(body: &str) -> Result<String> {
    let status: Status = serde_json::from_str(body)?;
    Ok(status.id)
}

/// Posts to a Mastodon instance with a bearer token.
#[derive(Clone)]
pub struct MastodonPublisher {
    client: Client,
    instance_url: String,
    access_token: String,
}

impl std::fmt::Debug for MastodonPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonPublisher")
            .field("instance_url", &self.instance_url)
            .finish_non_exhaustive()
    }
}

impl MastodonPublisher {
    /// Creates a publisher from the Mastodon configuration.
    pub fn new(config: &MastodonConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeathwatchError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            instance_url: config.instance_url.trim_end_matches('/').to_string(),
            access_token: config.access_token.clone(),
        })
    }

    /// Uploads the chart with alt text and returns the attachment id once
    /// the instance has finished processing it.
    #[instrument(skip(self, description))]
    pub async fn upload_media(&self, path: &Path, description: &str) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "chart.png".to_string(), |n| n.to_string_lossy().into_owned());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")?;
        let form = multipart::Form::new()
            .part("file", part)
            .text("description", description.to_string());

        let response = self
            .client
            .post(format!("{}/api/v2/media", self.instance_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await?;
        let processing = response.status() == StatusCode::ACCEPTED;
        let body = ensure_success(PLATFORM, response).await?.text().await?;
        let attachment = parse_attachment(&body)?;

        if processing && attachment.url.is_none() {
            self.wait_for_media(&attachment.id).await?;
        }
        Ok(attachment.id)
    }

    async fn wait_for_media(&self, media_id: &str) -> Result<()> {
        let url = format!("{}/api/v1/media/{}", self.instance_url, media_id);

        for attempt in 1..=MEDIA_POLL_ATTEMPTS {
            tokio::time::sleep(MEDIA_POLL_INTERVAL).await;
            let response = self
                .client
                .get(&url)
                .bearer_auth(&self.access_token)
                .send()
                .await?;
            if response.status() == StatusCode::PARTIAL_CONTENT {
                debug!("Media {} still processing (poll {})", media_id, attempt);
                continue;
            }
            let body = ensure_success(PLATFORM, response).await?.text().await?;
            if parse_attachment(&body)?.url.is_some() {
                return Ok(());
            }
        }

        Err(DeathwatchError::publish(
            PLATFORM,
            format!("media {media_id} still processing after {MEDIA_POLL_ATTEMPTS} polls"),
        ))
    }

    /// Creates a public status with the attachment and returns its id.
    #[instrument(skip(self, text))]
    pub async fn post_status(&self, text: &str, media_id: &str) -> Result<String> {
        let response = self
            .client
            .post(format!("{}/api/v1/statuses", self.instance_url))
            .bearer_auth(&self.access_token)
            .header("Idempotency-Key", uuid::Uuid::new_v4().to_string())
            .form(&[("status", text), ("media_ids[]", media_id)])
            .send()
            .await?;
        let body = ensure_success(PLATFORM, response).await?.text().await?;
        parse_status_id(&body)
    }
}

#[async_trait]
impl Publisher for MastodonPublisher {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn publish(&self, payload: &PublishPayload) -> PublishOutcome {
        let text = format_message(payload);

        let media_id = match self
            .upload_media(&payload.chart_image, &media_description(&text))
            .await
        {
            Ok(id) => id,
            Err(e) => {
                let stage = PublishStage::MediaUpload.for_error(&e);
                return PublishOutcome::failed(PLATFORM, stage, e);
            }
        };

        match self.post_status(&text, &media_id).await {
            Ok(status_id) => PublishOutcome::posted(PLATFORM, media_id, status_id),
            Err(e) => PublishOutcome::failed(PLATFORM, PublishStage::Post.for_error(&e), e),
        }
    }
}
