//! The once-per-invocation pipeline.

use crate::error::BotResult;
use crate::freshness::check_freshness;
use crate::watermark::{build_store, WatermarkStore};
use chrono::{NaiveDateTime, Utc};
use deathwatch_common::{format_watermark, LatestFigures, PublishPayload};
use deathwatch_config::{Config, ConfigLoader, WatermarkPolicy};
use deathwatch_graphs::{
    compute_average, is_current, AverageLineChart, ChartRenderer, CovidApiClient, DataSource,
};
use deathwatch_publish::{
    publish_all, MastodonPublisher, PublishReport, Publisher, TwitterPublisher,
};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Loads and validates the configuration from the process environment.
pub fn load_config() -> BotResult<Config> {
    Ok(ConfigLoader::from_env()?)
}

/// Loads and validates the configuration through `lookup`.
pub fn load_config_with<F>(lookup: F) -> BotResult<Config>
where
    F: Fn(&str) -> Option<String>,
{
    Ok(ConfigLoader::from_lookup(lookup)?)
}

/// Per-run settings taken from the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSettings {
    /// Key the watermark is stored under.
    pub watermark_key: String,
    /// Where the chart is written.
    pub chart_path: PathBuf,
    /// When the watermark advances.
    pub watermark_policy: WatermarkPolicy,
}

impl RunSettings {
    /// Extracts the run settings from the configuration.
    pub fn from_config(config: &Config) -> Self {
        Self {
            watermark_key: config.storage.key.clone(),
            chart_path: config.graph.output_path.clone(),
            watermark_policy: config.pipeline.watermark_policy,
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The remote data has not changed since the stored watermark.
    UpToDate {
        /// Remote last-modified time.
        remote: NaiveDateTime,
        /// Stored watermark.
        local: NaiveDateTime,
    },
    /// New data was charted and published.
    Published {
        /// Figures that were posted.
        latest: LatestFigures,
        /// Per-platform results.
        report: PublishReport,
        /// Whether the watermark was moved to the remote time.
        watermark_advanced: bool,
    },
}

/// The pipeline and the components it drives.
pub struct DeathwatchBot {
    source: Box<dyn DataSource>,
    store: Box<dyn WatermarkStore>,
    renderer: Box<dyn ChartRenderer>,
    publishers: Vec<Box<dyn Publisher>>,
    settings: RunSettings,
}

impl DeathwatchBot {
    /// Wires the pipeline from explicit components.
    pub fn new(
        source: Box<dyn DataSource>,
        store: Box<dyn WatermarkStore>,
        renderer: Box<dyn ChartRenderer>,
        publishers: Vec<Box<dyn Publisher>>,
        settings: RunSettings,
    ) -> Self {
        Self {
            source,
            store,
            renderer,
            publishers,
            settings,
        }
    }

    /// Builds the production components: dashboard API, configured
    /// watermark backend, plotters chart, Twitter then Mastodon.
    pub fn from_config(config: &Config) -> BotResult<Self> {
        let timeout = Duration::from_secs(config.source.timeout_seconds);
        let publishers: Vec<Box<dyn Publisher>> = vec![
            Box::new(TwitterPublisher::new(&config.twitter, timeout)?),
            Box::new(MastodonPublisher::new(&config.mastodon, timeout)?),
        ];

        Ok(Self::new(
            Box::new(CovidApiClient::new(&config.source)?),
            build_store(&config.storage, timeout)?,
            Box::new(AverageLineChart::new(&config.graph)?),
            publishers,
            RunSettings::from_config(config),
        ))
    }

    /// Runs the pipeline once.
    ///
    /// Callers must not run two invocations concurrently: the chart file and
    /// the watermark are shared without locking.
    #[instrument(skip(self), fields(store = self.store.name(), renderer = self.renderer.name()))]
    pub async fn run_once(&self) -> BotResult<RunOutcome> {
        let check = check_freshness(
            self.source.as_ref(),
            self.store.as_ref(),
            &self.settings.watermark_key,
        )
        .await?;
        if !check.is_stale() {
            info!("No new data since {}, nothing to do", check.local);
            return Ok(RunOutcome::UpToDate {
                remote: check.remote,
                local: check.local,
            });
        }

        let observations = self.source.fetch_series().await?;
        let averaged = compute_average(observations)?;
        let latest = averaged.latest;
        if !is_current(&averaged.series, Utc::now().date_naive()) {
            warn!("Latest observation is dated {}, not today", latest.date);
        }

        self.renderer
            .render_to_file(
                &averaged.series,
                &latest.average_label(),
                &self.settings.chart_path,
            )
            .await?;

        let payload = PublishPayload::new(&latest, self.settings.chart_path.clone());
        info!(%payload, "Publishing");
        let report = publish_all(&self.publishers, &payload).await;
        info!("Publish step finished: {}", report);

        let policy = self.settings.watermark_policy;
        let advance = policy.allows(report.succeeded(), report.attempted());
        if advance {
            for failure in report.failures() {
                warn!(%policy, "Advancing watermark despite failure ({})", failure);
            }
            self.store
                .write(&self.settings.watermark_key, &format_watermark(check.remote))
                .await?;
            info!("Watermark advanced to {}", check.remote);
        } else {
            warn!(%policy, "Watermark left at {}: {}", check.local, report);
        }

        Ok(RunOutcome::Published {
            latest,
            report,
            watermark_advanced: advance,
        })
    }
}
