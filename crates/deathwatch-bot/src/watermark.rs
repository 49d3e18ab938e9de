//! Watermark persistence.
//!
//! A watermark is a single text value per key. Stores neither version nor
//! lock it; concurrent runs race on the last write.

use crate::gcs::GcsWatermarkStore;
use async_trait::async_trait;
use deathwatch_common::{DeathwatchError, Result};
use deathwatch_config::{StorageConfig, WatermarkBackend};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};

/// Key-value storage for the freshness watermark.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Reads the value stored under `key`.
    async fn read(&self, key: &str) -> Result<String>;

    /// Replaces the value stored under `key`.
    async fn write(&self, key: &str, value: &str) -> Result<()>;

    /// Backend name for logs.
    fn name(&self) -> &'static str;
}

/// Builds the store selected by the storage configuration.
pub fn build_store(config: &StorageConfig, timeout: Duration) -> Result<Box<dyn WatermarkStore>> {
    Ok(match config.backend {
        WatermarkBackend::Gcs => Box::new(GcsWatermarkStore::new(config, timeout)?),
        WatermarkBackend::File => Box::new(FileWatermarkStore::new(&config.directory)),
    })
}

/// One file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    directory: PathBuf,
}

impl FileWatermarkStore {
    /// Creates a store rooted at `directory`. The directory is created on
    /// first write.
    pub fn new(directory: impl AsRef<Path>) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key != "."
            && key != ".."
            && !key.contains(&['/', '\\'][..]);
        if !valid {
            return Err(DeathwatchError::storage(format!("invalid watermark key '{key}'")));
        }
        Ok(self.directory.join(key))
    }
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    #[instrument(skip(self))]
    async fn read(&self, key: &str) -> Result<String> {
        let path = self.path_for(key)?;
        tokio::fs::read_to_string(&path).await.map_err(|e| {
            DeathwatchError::storage_with_source(format!("Failed to read {}", path.display()), e)
        })
    }

    #[instrument(skip(self))]
    async fn write(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::create_dir_all(&self.directory).await.map_err(|e| {
            DeathwatchError::storage_with_source(
                format!("Failed to create {}", self.directory.display()),
                e,
            )
        })?;

        // Write beside the target and rename so readers never see a partial value.
        let staging = path.with_extension("tmp");
        tokio::fs::write(&staging, value).await.map_err(|e| {
            DeathwatchError::storage_with_source(
                format!("Failed to write {}", staging.display()),
                e,
            )
        })?;
        tokio::fs::rename(&staging, &path).await.map_err(|e| {
            DeathwatchError::storage_with_source(format!("Failed to replace {}", path.display()), e)
        })?;

        debug!("Stored watermark at {}", path.display());
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}
