//! Configuration schema definitions.

use deathwatch_common::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Main configuration structure for Deathwatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Statistics API configuration.
    pub source: SourceConfig,
    /// Watermark storage configuration.
    pub storage: StorageConfig,
    /// Chart configuration.
    pub graph: GraphConfig,
    /// Twitter credentials and endpoints.
    pub twitter: TwitterConfig,
    /// Mastodon credentials and instance.
    pub mastodon: MastodonConfig,
    /// Pipeline behaviour.
    pub pipeline: PipelineConfig,
    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Statistics API configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Data endpoint of the coronavirus dashboard API.
    pub api_url: String,
    /// Timeout applied to every HTTP request, in seconds.
    pub timeout_seconds: u64,
}

/// Where the watermark lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WatermarkBackend {
    /// Google Cloud Storage bucket.
    #[default]
    Gcs,
    /// Local directory, one file per key.
    File,
}

impl FromStr for WatermarkBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcs" => Ok(Self::Gcs),
            "file" => Ok(Self::File),
            other => Err(format!("unknown watermark backend '{other}' (expected gcs or file)")),
        }
    }
}

/// Watermark storage configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage backend.
    pub backend: WatermarkBackend,
    /// Bucket name (GCS backend).
    pub bucket: String,
    /// GCS JSON API endpoint; override for emulators.
    pub endpoint: String,
    /// Static OAuth access token; the metadata server is used when absent.
    pub access_token: Option<String>,
    /// Object name / file name of the watermark.
    pub key: String,
    /// Directory holding watermark files (file backend).
    pub directory: PathBuf,
}

/// Chart configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Output PNG path, overwritten each run.
    pub output_path: PathBuf,
    /// Canvas width in pixels.
    pub width: u32,
    /// Canvas height in pixels.
    pub height: u32,
    /// Line colour as `#rrggbb`.
    pub line_color: String,
    /// Background colour as `#rrggbb`.
    pub background_color: String,
}

/// Twitter credentials and endpoints.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TwitterConfig {
    /// OAuth consumer (API) key.
    pub consumer_key: String,
    /// OAuth consumer (API) secret.
    pub consumer_secret: String,
    /// OAuth access token.
    pub access_token: String,
    /// OAuth access token secret.
    pub access_secret: String,
    /// REST API base URL.
    pub api_url: String,
    /// Media upload base URL.
    pub upload_url: String,
    /// Whether to call `verify_credentials` before publishing.
    pub verify_credentials: bool,
}

/// Mastodon credentials and instance.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MastodonConfig {
    /// Instance base URL.
    pub instance_url: String,
    /// Bearer token.
    pub access_token: String,
}

fn redact(value: &str) -> &'static str {
    if value.is_empty() {
        "<unset>"
    } else {
        "<redacted>"
    }
}

impl fmt::Debug for TwitterConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwitterConfig")
            .field("consumer_key", &redact(&self.consumer_key))
            .field("consumer_secret", &redact(&self.consumer_secret))
            .field("access_token", &redact(&self.access_token))
            .field("access_secret", &redact(&self.access_secret))
            .field("api_url", &self.api_url)
            .field("upload_url", &self.upload_url)
            .field("verify_credentials", &self.verify_credentials)
            .finish()
    }
}

impl fmt::Debug for MastodonConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MastodonConfig")
            .field("instance_url", &self.instance_url)
            .field("access_token", &redact(&self.access_token))
            .finish()
    }
}

/// When the watermark advances after the publish step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WatermarkPolicy {
    /// Advance regardless of publish results.
    #[default]
    Always,
    /// Advance when at least one publisher posted.
    AnySucceeded,
    /// Advance only when every publisher posted.
    AllSucceeded,
}

impl WatermarkPolicy {
    /// Whether the watermark may advance given `succeeded` of `attempted` posts.
    pub const fn allows(self, succeeded: usize, attempted: usize) -> bool {
        match self {
            Self::Always => true,
            Self::AnySucceeded => succeeded > 0,
            Self::AllSucceeded => succeeded == attempted,
        }
    }
}

impl FromStr for WatermarkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "always" => Ok(Self::Always),
            "any-succeeded" => Ok(Self::AnySucceeded),
            "all-succeeded" => Ok(Self::AllSucceeded),
            other => Err(format!(
                "unknown watermark policy '{other}' (expected always, any-succeeded or all-succeeded)"
            )),
        }
    }
}

impl fmt::Display for WatermarkPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Always => "always",
            Self::AnySucceeded => "any-succeeded",
            Self::AllSucceeded => "all-succeeded",
        };
        f.write_str(name)
    }
}

/// Pipeline behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Watermark advance rule.
    pub watermark_policy: WatermarkPolicy,
}
