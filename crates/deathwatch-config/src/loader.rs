//! Configuration loading from environment variables.

use crate::schema::Config;
use deathwatch_common::LogFormat;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// One or more required variables are absent or empty.
    #[error("Missing required configuration: {}", .0.join(", "))]
    Missing(Vec<String>),

    /// Environment variable parsing error
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParse {
        /// Offending variable.
        var: String,
        /// Why the value was rejected.
        message: String,
    },

    /// A value was present but unusable.
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for deathwatch_common::DeathwatchError {
    fn from(err: ConfigError) -> Self {
        Self::config_with_source("configuration rejected", err)
    }
}

/// Environment variable names.
pub mod vars {
    /// OAuth consumer key.
    pub const TWITTER_CONSUMER_KEY: &str = "TWITTER_CONSUMER_KEY";
    /// OAuth consumer secret.
    pub const TWITTER_CONSUMER_SECRET: &str = "TWITTER_CONSUMER_SECRET";
    /// OAuth access token.
    pub const TWITTER_ACCESS_TOKEN: &str = "TWITTER_ACCESS_TOKEN";
    /// OAuth access token secret.
    pub const TWITTER_ACCESS_SECRET: &str = "TWITTER_ACCESS_SECRET";
    /// Skip the credential check when `false`.
    pub const TWITTER_VERIFY_CREDENTIALS: &str = "TWITTER_VERIFY_CREDENTIALS";
    /// Mastodon bearer token.
    pub const MASTODON_ACCESS_TOKEN: &str = "MASTODON_ACCESS_TOKEN";
    /// Mastodon instance URL.
    pub const MASTODON_INSTANCE_URL: &str = "MASTODON_INSTANCE_URL";
    /// Chart output path.
    pub const GRAPH_FILE: &str = "GRAPH_FILE";
    /// Chart width.
    pub const GRAPH_WIDTH: &str = "GRAPH_WIDTH";
    /// Chart height.
    pub const GRAPH_HEIGHT: &str = "GRAPH_HEIGHT";
    /// Watermark bucket.
    pub const STORAGE_BUCKET: &str = "STORAGE_BUCKET";
    /// GCS endpoint override.
    pub const STORAGE_ENDPOINT: &str = "STORAGE_ENDPOINT";
    /// Static GCS access token.
    pub const GOOGLE_OAUTH_ACCESS_TOKEN: &str = "GOOGLE_OAUTH_ACCESS_TOKEN";
    /// `gcs` or `file`.
    pub const WATERMARK_BACKEND: &str = "WATERMARK_BACKEND";
    /// Directory for the file backend.
    pub const WATERMARK_DIR: &str = "WATERMARK_DIR";
    /// Watermark object name.
    pub const WATERMARK_KEY: &str = "WATERMARK_KEY";
    /// Watermark advance rule.
    pub const WATERMARK_POLICY: &str = "WATERMARK_POLICY";
    /// Statistics endpoint override.
    pub const COVID_API_URL: &str = "COVID_API_URL";
    /// HTTP timeout in seconds.
    pub const HTTP_TIMEOUT_SECONDS: &str = "HTTP_TIMEOUT_SECONDS";
    /// Log level filter.
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    /// `pretty`, `compact` or `json`.
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

/// Configuration loader for the application
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from the process environment and validate it.
    pub fn from_env() -> Result<Config, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through `lookup` and validate it.
    ///
    /// Empty values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Result<Config, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut config = Config::default();

        if let Some(value) = get(vars::TWITTER_CONSUMER_KEY) {
            config.twitter.consumer_key = value;
        }
        if let Some(value) = get(vars::TWITTER_CONSUMER_SECRET) {
            config.twitter.consumer_secret = value;
        }
        if let Some(value) = get(vars::TWITTER_ACCESS_TOKEN) {
            config.twitter.access_token = value;
        }
        if let Some(value) = get(vars::TWITTER_ACCESS_SECRET) {
            config.twitter.access_secret = value;
        }
        if let Some(value) = get(vars::TWITTER_VERIFY_CREDENTIALS) {
            config.twitter.verify_credentials = parse(vars::TWITTER_VERIFY_CREDENTIALS, &value)?;
        }

        if let Some(value) = get(vars::MASTODON_ACCESS_TOKEN) {
            config.mastodon.access_token = value;
        }
        if let Some(value) = get(vars::MASTODON_INSTANCE_URL) {
            config.mastodon.instance_url = value;
        }

        if let Some(value) = get(vars::GRAPH_FILE) {
            config.graph.output_path = PathBuf::from(value);
        }
        if let Some(value) = get(vars::GRAPH_WIDTH) {
            config.graph.width = parse(vars::GRAPH_WIDTH, &value)?;
        }
        if let Some(value) = get(vars::GRAPH_HEIGHT) {
            config.graph.height = parse(vars::GRAPH_HEIGHT, &value)?;
        }

        if let Some(value) = get(vars::WATERMARK_BACKEND) {
            config.storage.backend = parse(vars::WATERMARK_BACKEND, &value)?;
        }
        if let Some(value) = get(vars::STORAGE_BUCKET) {
            config.storage.bucket = value;
        }
        if let Some(value) = get(vars::STORAGE_ENDPOINT) {
            config.storage.endpoint = value;
        }
        config.storage.access_token = get(vars::GOOGLE_OAUTH_ACCESS_TOKEN);
        if let Some(value) = get(vars::WATERMARK_DIR) {
            config.storage.directory = PathBuf::from(value);
        }
        if let Some(value) = get(vars::WATERMARK_KEY) {
            config.storage.key = value;
        }
        if let Some(value) = get(vars::WATERMARK_POLICY) {
            config.pipeline.watermark_policy = parse(vars::WATERMARK_POLICY, &value)?;
        }

        if let Some(value) = get(vars::COVID_API_URL) {
            config.source.api_url = value;
        }
        if let Some(value) = get(vars::HTTP_TIMEOUT_SECONDS) {
            config.source.timeout_seconds = parse(vars::HTTP_TIMEOUT_SECONDS, &value)?;
        }

        if let Some(value) = get(vars::LOG_LEVEL) {
            config.logging.level = value;
        }
        if let Some(value) = get(vars::LOG_FORMAT) {
            config.logging.format = LogFormat::from_str(&value).map_err(|e| {
                ConfigError::EnvParse {
                    var: vars::LOG_FORMAT.to_string(),
                    message: e.to_string(),
                }
            })?;
        }

        config.validate()?;
        debug!(
            backend = ?config.storage.backend,
            policy = %config.pipeline.watermark_policy,
            "Configuration loaded"
        );
        Ok(config)
    }
}

fn parse<T>(var: &str, value: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| ConfigError::EnvParse {
        var: var.to_string(),
        message: e.to_string(),
    })
}
