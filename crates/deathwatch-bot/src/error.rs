//! Application-wide error types using thiserror.

use deathwatch_common::DeathwatchError;
use deathwatch_config::ConfigError;

/// Main application error type.
#[derive(thiserror::Error, Debug)]
pub enum BotError {
    /// Configuration could not be loaded or is incomplete.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A pipeline stage failed.
    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] DeathwatchError),
}

/// Result type for the bot application.
pub type BotResult<T> = Result<T, BotError>;
