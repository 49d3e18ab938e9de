//! Main entry point for Deathwatch.
//!
//! Runs the pipeline once and exits. The scheduler invoking this binary must
//! not start a new run while the previous one is still going.

use anyhow::Context;
use deathwatch_bot::{load_config, DeathwatchBot, RunOutcome};
use deathwatch_common::init_logging;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("Failed to load configuration")?;
    init_logging(&config.logging).context("Failed to initialise logging")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        policy = %config.pipeline.watermark_policy,
        "Starting Deathwatch"
    );

    let bot = DeathwatchBot::from_config(&config).context("Failed to build pipeline")?;

    match bot.run_once().await {
        Ok(RunOutcome::UpToDate { remote, .. }) => {
            info!("Data unchanged since {}", remote);
            Ok(())
        }
        Ok(RunOutcome::Published {
            latest,
            report,
            watermark_advanced,
        }) => {
            info!(
                average = latest.average,
                date = %latest.date,
                watermark_advanced,
                "Run complete: {}",
                report
            );
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {}", e);
            Err(e).context("Deathwatch run failed")
        }
    }
}
