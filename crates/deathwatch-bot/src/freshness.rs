//! Freshness gate: has the remote data changed since the last run?

use crate::watermark::WatermarkStore;
use chrono::NaiveDateTime;
use deathwatch_common::{epoch, parse_watermark, Result};
use deathwatch_graphs::DataSource;
use tracing::{info, instrument, warn};

/// True iff `remote` is strictly newer than `local`.
pub fn is_stale(remote: NaiveDateTime, local: NaiveDateTime) -> bool {
    remote > local
}

/// Both sides of one freshness comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FreshnessCheck {
    /// When the remote data last changed.
    pub remote: NaiveDateTime,
    /// The stored watermark, or the epoch when none could be read.
    pub local: NaiveDateTime,
}

impl FreshnessCheck {
    /// Whether the run should proceed.
    pub fn is_stale(&self) -> bool {
        is_stale(self.remote, self.local)
    }
}

/// Reads the stored watermark. Anything that prevents reading a valid
/// timestamp is logged and yields the epoch, so the data counts as stale.
#[instrument(skip(store))]
pub async fn read_watermark(store: &dyn WatermarkStore, key: &str) -> NaiveDateTime {
    match store.read(key).await {
        Ok(raw) => parse_watermark(&raw).unwrap_or_else(|| {
            warn!(
                backend = store.name(),
                "Stored watermark '{}' is not a timestamp, treating data as stale",
                raw.trim()
            );
            epoch()
        }),
        Err(e) => {
            warn!(
                backend = store.name(),
                "Could not read watermark, treating data as stale: {}", e
            );
            epoch()
        }
    }
}

/// Compares the remote update time with the stored watermark. Failing to
/// reach the data source is an error; failing to read the watermark is not.
pub async fn check_freshness(
    source: &dyn DataSource,
    store: &dyn WatermarkStore,
    key: &str,
) -> Result<FreshnessCheck> {
    let local = read_watermark(store, key).await;
    let remote = source.fetch_last_modified().await?;
    let check = FreshnessCheck { remote, local };

    info!(
        %remote,
        %local,
        stale = check.is_stale(),
        "Freshness check"
    );
    Ok(check)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use deathwatch_common::test_utils::mock_timestamp;
    use deathwatch_common::{DeathwatchError, Observation};
    use proptest::prelude::*;

    struct FixedStore(Option<&'static str>);

    #[async_trait]
    impl WatermarkStore for FixedStore {
        async fn read(&self, _key: &str) -> Result<String> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| DeathwatchError::storage("bucket unavailable"))
        }

        async fn write(&self, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "fixed"
        }
    }

    struct FixedSource(NaiveDateTime);

    #[async_trait]
    impl DataSource for FixedSource {
        async fn fetch_series(&self) -> Result<Vec<Observation>> {
            Ok(Vec::new())
        }

        async fn fetch_last_modified(&self) -> Result<NaiveDateTime> {
            Ok(self.0)
        }
    }

    fn timestamp(seconds: i64) -> NaiveDateTime {
        epoch() + Duration::seconds(seconds)
    }

    proptest! {
        #[test]
        fn newer_remote_is_stale(local in 0i64..4_000_000_000, gap in 1i64..1_000_000) {
            let local = timestamp(local);
            let remote = local + Duration::seconds(gap);
            prop_assert!(is_stale(remote, local));
            prop_assert!(!is_stale(local, remote));
        }

        #[test]
        fn equal_timestamps_are_fresh(seconds in 0i64..4_000_000_000) {
            let t = timestamp(seconds);
            prop_assert!(!is_stale(t, t));
        }
    }

    #[tokio::test]
    async fn test_stored_watermark_is_parsed() {
        let store = FixedStore(Some("2023-01-07 16:00:00\n"));
        assert_eq!(
            read_watermark(&store, "k").await,
            mock_timestamp(2023, 1, 7, 16, 0, 0)
        );
    }

    #[tokio::test]
    async fn test_read_failure_falls_back_to_epoch() {
        let store = FixedStore(None);
        assert_eq!(read_watermark(&store, "k").await, epoch());
    }

    #[tokio::test]
    async fn test_garbage_watermark_falls_back_to_epoch() {
        let store = FixedStore(Some("yesterday"));
        assert_eq!(read_watermark(&store, "k").await, epoch());
    }

    #[tokio::test]
    async fn test_unreadable_store_means_stale() {
        let source = FixedSource(mock_timestamp(2023, 1, 7, 16, 0, 0));
        let check = check_freshness(&source, &FixedStore(None), "k")
            .await
            .unwrap();
        assert_eq!(check.local, epoch());
        assert!(check.is_stale());
    }

    #[tokio::test]
    async fn test_unchanged_remote_is_fresh() {
        let source = FixedSource(mock_timestamp(2023, 1, 7, 16, 0, 0));
        let store = FixedStore(Some("2023-01-07 16:00:00"));
        let check = check_freshness(&source, &store, "k").await.unwrap();
        assert!(!check.is_stale());
    }
}
