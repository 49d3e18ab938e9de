//! Startup validation of a loaded configuration.

use crate::loader::{vars, ConfigError};
use crate::schema::{Config, WatermarkBackend};

/// Configuration validator.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates a configuration, reporting every missing field at once.
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let required = [
            (vars::TWITTER_CONSUMER_KEY, config.twitter.consumer_key.as_str()),
            (vars::TWITTER_CONSUMER_SECRET, config.twitter.consumer_secret.as_str()),
            (vars::TWITTER_ACCESS_TOKEN, config.twitter.access_token.as_str()),
            (vars::TWITTER_ACCESS_SECRET, config.twitter.access_secret.as_str()),
            (vars::MASTODON_ACCESS_TOKEN, config.mastodon.access_token.as_str()),
        ];

        let mut missing: Vec<String> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| (*name).to_string())
            .collect();

        if config.graph.output_path.as_os_str().is_empty() {
            missing.push(vars::GRAPH_FILE.to_string());
        }
        if config.storage.backend == WatermarkBackend::Gcs
            && config.storage.bucket.trim().is_empty()
        {
            missing.push(vars::STORAGE_BUCKET.to_string());
        }

        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        for (name, value) in [
            (vars::COVID_API_URL, &config.source.api_url),
            (vars::STORAGE_ENDPOINT, &config.storage.endpoint),
            (vars::MASTODON_INSTANCE_URL, &config.mastodon.instance_url),
            ("twitter.api_url", &config.twitter.api_url),
            ("twitter.upload_url", &config.twitter.upload_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| ConfigError::Invalid(format!("{name} is not a valid URL: {e}")))?;
        }

        if config.graph.width == 0 || config.graph.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "chart dimensions must be non-zero, got {}x{}",
                config.graph.width, config.graph.height
            )));
        }

        for (name, colour) in [
            ("graph.line_color", &config.graph.line_color),
            ("graph.background_color", &config.graph.background_color),
        ] {
            if !is_hex_colour(colour) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a #rrggbb colour, got '{colour}'"
                )));
            }
        }

        if config.source.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "HTTP timeout must be at least one second".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ConfigValidator::validate(self)
    }
}

fn is_hex_colour(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|hex| hex.len() == 6 && hex.chars().all(|c| c.is_ascii_hexdigit()))
}
