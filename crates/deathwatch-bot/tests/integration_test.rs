//! Integration tests for deathwatch-bot crate.
//!
//! The pipeline is driven end to end with in-memory components standing in
//! for the dashboard API, the bucket, the chart and the platforms.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use deathwatch_bot::{
    BotError, DeathwatchBot, FileWatermarkStore, RunOutcome, RunSettings, WatermarkStore,
};
use deathwatch_common::test_utils::{
    create_temp_dir, daily_observations, first_week_of_2023, init_test_logging, mock_date,
    mock_timestamp,
};
use deathwatch_common::{DeathwatchError, Observation, PublishPayload, Result, Series};
use deathwatch_config::{vars, ConfigError, WatermarkPolicy};
use deathwatch_graphs::{ChartRenderer, DataSource};
use deathwatch_publish::{PublishOutcome, PublishStage, Publisher};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const KEY: &str = "local_deaths_modified";

fn remote_time() -> NaiveDateTime {
    mock_timestamp(2023, 1, 7, 16, 0, 0)
}

#[derive(Default)]
struct Calls {
    fetch_series: AtomicUsize,
    render: AtomicUsize,
    publish: AtomicUsize,
    write: AtomicUsize,
}

impl Calls {
    fn get(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

struct FakeSource {
    last_modified: NaiveDateTime,
    series: std::result::Result<Vec<Observation>, &'static str>,
    calls: Arc<Calls>,
}

#[async_trait]
impl DataSource for FakeSource {
    async fn fetch_series(&self) -> Result<Vec<Observation>> {
        self.calls.fetch_series.fetch_add(1, Ordering::SeqCst);
        self.series.clone().map_err(DeathwatchError::api)
    }

    async fn fetch_last_modified(&self) -> Result<NaiveDateTime> {
        Ok(self.last_modified)
    }
}

#[derive(Clone, Default)]
struct MemoryStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    fail_reads: bool,
    fail_writes: bool,
    calls: Arc<Calls>,
}

impl MemoryStore {
    fn with_value(value: &str, calls: Arc<Calls>) -> Self {
        let store = Self {
            calls,
            ..Self::default()
        };
        store
            .values
            .lock()
            .unwrap()
            .insert(KEY.to_string(), value.to_string());
        store
    }
}

#[async_trait]
impl WatermarkStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<String> {
        if self.fail_reads {
            return Err(DeathwatchError::storage("permission denied"));
        }
        self.values
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| DeathwatchError::storage("object not found"))
    }

    async fn write(&self, key: &str, value: &str) -> Result<()> {
        self.calls.write.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes {
            return Err(DeathwatchError::storage("bucket is read-only"));
        }
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

struct FakeRenderer {
    calls: Arc<Calls>,
    titles: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChartRenderer for FakeRenderer {
    async fn render_to_file(
        &self,
        _series: &Series,
        average_label: &str,
        _path: &Path,
    ) -> Result<()> {
        self.calls.render.fetch_add(1, Ordering::SeqCst);
        self.titles.lock().unwrap().push(average_label.to_string());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

struct FakePublisher {
    name: &'static str,
    succeed: bool,
    calls: Arc<Calls>,
    payloads: Arc<Mutex<Vec<PublishPayload>>>,
}

#[async_trait]
impl Publisher for FakePublisher {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn publish(&self, payload: &PublishPayload) -> PublishOutcome {
        self.calls.publish.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(payload.clone());
        if self.succeed {
            PublishOutcome::posted(self.name, "media-1", "post-1")
        } else {
            PublishOutcome::failed(self.name, PublishStage::MediaUpload, "HTTP 503")
        }
    }
}

struct Harness {
    calls: Arc<Calls>,
    store: MemoryStore,
    titles: Arc<Mutex<Vec<String>>>,
    payloads: Arc<Mutex<Vec<PublishPayload>>>,
    bot: DeathwatchBot,
}

fn harness(
    store: MemoryStore,
    series: std::result::Result<Vec<Observation>, &'static str>,
    publishers_succeed: [bool; 2],
    policy: WatermarkPolicy,
) -> Harness {
    init_test_logging();
    let calls = Arc::clone(&store.calls);
    let titles = Arc::new(Mutex::new(Vec::new()));
    let payloads = Arc::new(Mutex::new(Vec::new()));

    let publishers: Vec<Box<dyn Publisher>> = ["twitter", "mastodon"]
        .into_iter()
        .zip(publishers_succeed)
        .map(|(name, succeed)| {
            Box::new(FakePublisher {
                name,
                succeed,
                calls: Arc::clone(&calls),
                payloads: Arc::clone(&payloads),
            }) as Box<dyn Publisher>
        })
        .collect();

    let bot = DeathwatchBot::new(
        Box::new(FakeSource {
            last_modified: remote_time(),
            series,
            calls: Arc::clone(&calls),
        }),
        Box::new(store.clone()),
        Box::new(FakeRenderer {
            calls: Arc::clone(&calls),
            titles: Arc::clone(&titles),
        }),
        publishers,
        RunSettings {
            watermark_key: KEY.to_string(),
            chart_path: PathBuf::from("/tmp/deathwatch/graph.png"),
            watermark_policy: policy,
        },
    );

    Harness {
        calls,
        store,
        titles,
        payloads,
        bot,
    }
}

fn stored_watermark(store: &MemoryStore) -> Option<String> {
    store.values.lock().unwrap().get(KEY).cloned()
}

#[tokio::test]
async fn test_unchanged_remote_does_nothing() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-07 16:00:00", calls),
        Ok(first_week_of_2023()),
        [true, true],
        WatermarkPolicy::Always,
    );

    let outcome = h.bot.run_once().await.unwrap();

    assert_eq!(
        outcome,
        RunOutcome::UpToDate {
            remote: remote_time(),
            local: remote_time(),
        }
    );
    assert_eq!(Calls::get(&h.calls.fetch_series), 0);
    assert_eq!(Calls::get(&h.calls.render), 0);
    assert_eq!(Calls::get(&h.calls.publish), 0);
    assert_eq!(Calls::get(&h.calls.write), 0);
}

#[tokio::test]
async fn test_new_data_is_published_and_watermarked() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-06 16:00:00", calls),
        Ok(first_week_of_2023()),
        [true, true],
        WatermarkPolicy::Always,
    );

    let outcome = h.bot.run_once().await.unwrap();

    let RunOutcome::Published {
        latest,
        report,
        watermark_advanced,
    } = outcome
    else {
        panic!("expected a publish run");
    };
    assert_eq!(latest.average, 40);
    assert_eq!(latest.date, mock_date(2023, 1, 7));
    assert!(report.all_succeeded());
    assert!(watermark_advanced);

    assert_eq!(*h.titles.lock().unwrap(), vec!["40".to_string()]);
    let payloads = h.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 2);
    assert_eq!(payloads[0].weekly_deaths, "70");
    assert_eq!(payloads[0].last_update_date, "2023-01-07");
    assert_eq!(stored_watermark(&h.store).as_deref(), Some("2023-01-07 16:00:00"));
}

#[tokio::test]
async fn test_unreadable_watermark_counts_as_stale() {
    let calls = Arc::new(Calls::default());
    let store = MemoryStore {
        fail_reads: true,
        calls,
        ..MemoryStore::default()
    };
    let h = harness(store, Ok(first_week_of_2023()), [true, true], WatermarkPolicy::Always);

    let outcome = h.bot.run_once().await.unwrap();

    assert!(matches!(outcome, RunOutcome::Published { .. }));
    assert_eq!(Calls::get(&h.calls.fetch_series), 1);
    assert_eq!(Calls::get(&h.calls.write), 1);
}

#[tokio::test]
async fn test_one_publisher_failing_does_not_block_the_other_or_the_watermark() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-01 00:00:00", calls),
        Ok(first_week_of_2023()),
        [false, true],
        WatermarkPolicy::Always,
    );

    let outcome = h.bot.run_once().await.unwrap();

    let RunOutcome::Published {
        report,
        watermark_advanced,
        ..
    } = outcome
    else {
        panic!("expected a publish run");
    };
    assert_eq!(Calls::get(&h.calls.publish), 2);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(report.failures().next().unwrap().platform, "twitter");
    assert!(watermark_advanced);
    assert_eq!(stored_watermark(&h.store).as_deref(), Some("2023-01-07 16:00:00"));
}

#[tokio::test]
async fn test_all_succeeded_policy_holds_the_watermark_back() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-01 00:00:00", calls),
        Ok(first_week_of_2023()),
        [true, false],
        WatermarkPolicy::AllSucceeded,
    );

    let outcome = h.bot.run_once().await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Published {
            watermark_advanced: false,
            ..
        }
    ));
    assert_eq!(Calls::get(&h.calls.write), 0);
    assert_eq!(stored_watermark(&h.store).as_deref(), Some("2023-01-01 00:00:00"));
}

#[tokio::test]
async fn test_any_succeeded_policy_needs_one_post() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-01 00:00:00", calls),
        Ok(first_week_of_2023()),
        [false, false],
        WatermarkPolicy::AnySucceeded,
    );

    let outcome = h.bot.run_once().await.unwrap();

    assert!(matches!(
        outcome,
        RunOutcome::Published {
            watermark_advanced: false,
            ..
        }
    ));
    assert_eq!(Calls::get(&h.calls.write), 0);
}

#[tokio::test]
async fn test_fetch_failure_aborts_before_publishing() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-01 00:00:00", calls),
        Err("HTTP 500"),
        [true, true],
        WatermarkPolicy::Always,
    );

    let err = h.bot.run_once().await.unwrap_err();

    assert!(matches!(err, BotError::Pipeline(DeathwatchError::Api { .. })));
    assert_eq!(Calls::get(&h.calls.render), 0);
    assert_eq!(Calls::get(&h.calls.publish), 0);
    assert_eq!(Calls::get(&h.calls.write), 0);
}

#[tokio::test]
async fn test_short_series_aborts_before_rendering() {
    let calls = Arc::new(Calls::default());
    let h = harness(
        MemoryStore::with_value("2023-01-01 00:00:00", calls),
        Ok(daily_observations(mock_date(2023, 1, 1), &[1, 2, 3])),
        [true, true],
        WatermarkPolicy::Always,
    );

    let err = h.bot.run_once().await.unwrap_err();

    assert!(matches!(err, BotError::Pipeline(DeathwatchError::Data { .. })));
    assert_eq!(Calls::get(&h.calls.render), 0);
    assert_eq!(Calls::get(&h.calls.publish), 0);
}

#[tokio::test]
async fn test_watermark_write_failure_fails_the_run_after_publishing() {
    let calls = Arc::new(Calls::default());
    let store = MemoryStore {
        fail_writes: true,
        calls,
        ..MemoryStore::default()
    };
    let h = harness(store, Ok(first_week_of_2023()), [true, true], WatermarkPolicy::Always);

    let err = h.bot.run_once().await.unwrap_err();

    assert!(matches!(err, BotError::Pipeline(DeathwatchError::Storage { .. })));
    assert_eq!(Calls::get(&h.calls.publish), 2);
    assert_eq!(Calls::get(&h.calls.write), 1);
}

#[tokio::test]
async fn test_file_store_round_trip_through_the_pipeline() {
    let dir = create_temp_dir();
    let store = FileWatermarkStore::new(dir.path());
    store.write(KEY, "2023-01-07 16:00:00").await.unwrap();

    let value = store.read(KEY).await.unwrap();
    assert_eq!(
        deathwatch_common::parse_watermark(&value),
        Some(remote_time())
    );
}

#[test]
fn test_missing_configuration_is_a_config_error() {
    let err = deathwatch_bot::load_config_with(|_| None).unwrap_err();

    match err {
        BotError::Config(ConfigError::Missing(missing)) => {
            assert!(missing.contains(&vars::TWITTER_CONSUMER_KEY.to_string()));
        }
        other => panic!("expected a configuration error, got {other:?}"),
    }
}

#[test]
fn test_complete_configuration_loads() {
    let env = HashMap::from([
        (vars::TWITTER_CONSUMER_KEY, "ck"),
        (vars::TWITTER_CONSUMER_SECRET, "cs"),
        (vars::TWITTER_ACCESS_TOKEN, "at"),
        (vars::TWITTER_ACCESS_SECRET, "as"),
        (vars::MASTODON_ACCESS_TOKEN, "mt"),
        (vars::GRAPH_FILE, "/tmp/graph.png"),
        (vars::STORAGE_BUCKET, "deaths-bucket"),
        (vars::WATERMARK_POLICY, "all-succeeded"),
    ]);

    let config =
        deathwatch_bot::load_config_with(|name| env.get(name).map(|v| (*v).to_string())).unwrap();

    let settings = RunSettings::from_config(&config);
    assert_eq!(settings.watermark_key, KEY);
    assert_eq!(settings.chart_path, PathBuf::from("/tmp/graph.png"));
    assert_eq!(settings.watermark_policy, WatermarkPolicy::AllSucceeded);
}
