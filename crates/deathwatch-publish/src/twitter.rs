//! Twitter publisher: v1.1 media upload, v2 tweet creation.

use crate::message::format_message;
use crate::oauth::OAuth1Signer;
use crate::publisher::{ensure_success, PublishOutcome, PublishStage, Publisher};
use async_trait::async_trait;
use deathwatch_common::{DeathwatchError, PublishPayload, Result};
use deathwatch_config::TwitterConfig;
use reqwest::{header, multipart, Client};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

const PLATFORM: &str = "twitter";

#[derive(Debug, Deserialize)]
struct MediaUploadResponse {
    media_id_string: String,
}

#[derive(Debug, Deserialize)]
struct CreateTweetResponse {
    data: CreatedTweet,
}

#[derive(Debug, Deserialize)]
struct CreatedTweet {
    id: String,
}

#[derive(Debug, Deserialize)]
struct VerifiedUser {
    screen_name: String,
}

fn parse_media_id(body: &str) -> Result<String> {
    let response: MediaUploadResponse = serde_json::from_str(body)?;
    Ok(response.media_id_string)
}

fn parse_tweet_id(body: &str) -> Result<String> {
    let response: CreateTweetResponse = serde_json::from_str(body)?;
    Ok(response.data.id)
}

/// JSON body for `POST /2/tweets` with one attached image.
fn tweet_body(text: &str, media_id: &str) -> serde_json::Value {
    serde_json::json!({
        "text": text,
        "media": { "media_ids": [media_id] },
    })
}

/// Posts to Twitter with OAuth 1.0a user credentials.
#[derive(Debug, Clone)]
pub struct TwitterPublisher {
    client: Client,
    signer: OAuth1Signer,
    api_url: String,
    upload_url: String,
    verify_credentials: bool,
}

impl TwitterPublisher {
    /// Creates a publisher from the Twitter configuration.
    pub fn new(config: &TwitterConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DeathwatchError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            signer: OAuth1Signer::from_config(config),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            upload_url: config.upload_url.trim_end_matches('/').to_string(),
            verify_credentials: config.verify_credentials,
        })
    }

    /// Checks the credentials and returns the account's screen name.
    #[instrument(skip(self))]
    pub async fn verify(&self) -> Result<String> {
        let url = format!("{}/1.1/account/verify_credentials.json", self.api_url);
        let auth = self.signer.authorization_header("GET", &url, &[])?;
        let response = self
            .client
            .get(&url)
            .header(header::AUTHORIZATION, auth)
            .send()
            .await?;
        let body = ensure_success(PLATFORM, response).await?.text().await?;
        let user: VerifiedUser = serde_json::from_str(&body)?;
        Ok(user.screen_name)
    }

    /// Uploads the chart and returns its media id.
    #[instrument(skip(self))]
    pub async fn upload_media(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map_or_else(|| "chart.png".to_string(), |n| n.to_string_lossy().into_owned());
        debug!("Uploading {} bytes", bytes.len());

        let part = multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("image/png")?;
        let form = multipart::Form::new().part("media", part);

        let url = format!("{}/1.1/media/upload.json", self.upload_url);
        let auth = self.signer.authorization_header("POST", &url, &[])?;
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .multipart(form)
            .send()
            .await?;
        let body = ensure_success(PLATFORM, response).await?.text().await?;
        parse_media_id(&body)
    }

    /// Posts `text` with the uploaded image and returns the tweet id.
    #[instrument(skip(self, text))]
    pub async fn create_tweet(&self, text: &str, media_id: &str) -> Result<String> {
        let url = format!("{}/2/tweets", self.api_url);
        let auth = self.signer.authorization_header("POST", &url, &[])?;
        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, auth)
            .json(&tweet_body(text, media_id))
            .send()
            .await?;
        let body = ensure_success(PLATFORM, response).await?.text().await?;
        parse_tweet_id(&body)
    }
}

#[async_trait]
impl Publisher for TwitterPublisher {
    fn name(&self) -> &'static str {
        PLATFORM
    }

    async fn publish(&self, payload: &PublishPayload) -> PublishOutcome {
        if self.verify_credentials {
            match self.verify().await {
                Ok(screen_name) => info!("Authenticated as @{}", screen_name),
                Err(e) => warn!("Credential check failed, posting anyway: {}", e),
            }
        }

        let media_id = match self.upload_media(&payload.chart_image).await {
            Ok(id) => id,
            Err(e) => {
                let stage = PublishStage::MediaUpload.for_error(&e);
                return PublishOutcome::failed(PLATFORM, stage, e);
            }
        };

        let text = format_message(payload);
        match self.create_tweet(&text, &media_id).await {
            Ok(tweet_id) => PublishOutcome::posted(PLATFORM, media_id, tweet_id),
            Err(e) => PublishOutcome::failed(PLATFORM, PublishStage::Post.for_error(&e), e),
        }
    }
}
