//! Default values for every configuration section.

use crate::schema::*;
use deathwatch_common::LoggingConfig;
use std::path::PathBuf;

/// Dashboard data endpoint.
pub const DEFAULT_API_URL: &str = "https://api.coronavirus.data.gov.uk/v1/data";
/// GCS JSON API endpoint.
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";
/// Object name of the watermark blob.
pub const DEFAULT_WATERMARK_KEY: &str = "local_deaths_modified";
/// Mastodon instance the bot posts to.
pub const DEFAULT_MASTODON_INSTANCE: &str = "https://mastodon.social";

impl Default for Config {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            storage: StorageConfig::default(),
            graph: GraphConfig::default(),
            twitter: TwitterConfig::default(),
            mastodon: MastodonConfig::default(),
            pipeline: PipelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: WatermarkBackend::Gcs,
            bucket: String::new(),
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            access_token: None,
            key: DEFAULT_WATERMARK_KEY.to_string(),
            directory: PathBuf::from("."),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::new(),
            width: 640,
            height: 480,
            line_color: "#1f77b4".to_string(),
            background_color: "#ffffff".to_string(),
        }
    }
}

impl Default for TwitterConfig {
    fn default() -> Self {
        Self {
            consumer_key: String::new(),
            consumer_secret: String::new(),
            access_token: String::new(),
            access_secret: String::new(),
            api_url: "https://api.twitter.com".to_string(),
            upload_url: "https://upload.twitter.com".to_string(),
            verify_credentials: true,
        }
    }
}

impl Default for MastodonConfig {
    fn default() -> Self {
        Self {
            instance_url: DEFAULT_MASTODON_INSTANCE.to_string(),
            access_token: String::new(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            watermark_policy: WatermarkPolicy::Always,
        }
    }
}
