//! Integration tests for deathwatch-config crate.

use deathwatch_config::{vars, Config, ConfigError, ConfigLoader, WatermarkPolicy};
use std::collections::HashMap;

fn env_with(pairs: &[(&'static str, &'static str)]) -> HashMap<&'static str, &'static str> {
    pairs.iter().copied().collect()
}

#[test]
fn test_missing_configuration_is_fatal_and_descriptive() {
    let env = env_with(&[(vars::GRAPH_FILE, "/tmp/graph.png")]);
    let err = ConfigLoader::from_lookup(|name| env.get(name).map(|v| (*v).to_string()))
        .unwrap_err();

    assert!(matches!(err, ConfigError::Missing(_)));
    let message = err.to_string();
    assert!(message.starts_with("Missing required configuration"));
    assert!(message.contains(vars::TWITTER_CONSUMER_KEY));
    assert!(message.contains(vars::STORAGE_BUCKET));
    assert!(!message.contains(vars::GRAPH_FILE));
}

#[test]
fn test_loaded_config_round_trips_through_json() {
    let env = env_with(&[
        (vars::TWITTER_CONSUMER_KEY, "ck"),
        (vars::TWITTER_CONSUMER_SECRET, "cs"),
        (vars::TWITTER_ACCESS_TOKEN, "at"),
        (vars::TWITTER_ACCESS_SECRET, "as"),
        (vars::MASTODON_ACCESS_TOKEN, "mt"),
        (vars::GRAPH_FILE, "/tmp/graph.png"),
        (vars::STORAGE_BUCKET, "bucket"),
        (vars::WATERMARK_POLICY, "any-succeeded"),
    ]);
    let config =
        ConfigLoader::from_lookup(|name| env.get(name).map(|v| (*v).to_string())).unwrap();
    assert_eq!(
        config.pipeline.watermark_policy,
        WatermarkPolicy::AnySucceeded
    );

    let json = serde_json::to_string(&config).unwrap();
    assert!(json.contains("\"watermark_policy\":\"any-succeeded\""));
    let parsed: Config = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_error_converts_to_workspace_error() {
    let err: deathwatch_common::DeathwatchError =
        ConfigError::Missing(vec!["GRAPH_FILE".into()]).into();
    assert!(err.to_string().starts_with("Configuration error"));
}
