//! Error types and constructors shared across the workspace.

use thiserror::Error;

/// Boxed source error carried by the richer variants.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Result type alias for Deathwatch operations.
pub type Result<T> = std::result::Result<T, DeathwatchError>;

/// Main error type for Deathwatch operations.
#[derive(Error, Debug)]
pub enum DeathwatchError {
    /// Missing or invalid configuration.
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// Transport-level failures (connect, timeout, unreadable body).
    #[error("Network error: {message}")]
    Network {
        /// What went wrong.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The statistics API answered with something we cannot use.
    #[error("Statistics API error: {message}")]
    Api {
        /// What went wrong.
        message: String,
        /// HTTP status, when the failure came from a response.
        status_code: Option<u16>,
    },

    /// Object storage (watermark) failures.
    #[error("Storage error: {message}")]
    Storage {
        /// What went wrong.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// The fetched series cannot be transformed.
    #[error("Data error: {message}")]
    Data {
        /// What went wrong.
        message: String,
    },

    /// Chart rendering failures.
    #[error("Graph error: {message}")]
    Graph {
        /// What went wrong.
        message: String,
        /// Underlying cause, if any.
        #[source]
        source: Option<BoxError>,
    },

    /// A social platform rejected a request.
    #[error("{platform} error: {message}")]
    Publish {
        /// Platform name, e.g. `twitter`.
        platform: String,
        /// What went wrong.
        message: String,
        /// HTTP status, when the failure came from a response.
        status_code: Option<u16>,
    },

    /// I/O related errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl DeathwatchError {
    /// Create a new configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new configuration error with source.
    pub fn config_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Config {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new network error with source.
    pub fn network_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new statistics API error.
    pub fn api(msg: impl Into<String>) -> Self {
        Self::Api {
            message: msg.into(),
            status_code: None,
        }
    }

    /// Create a new statistics API error with the HTTP status.
    pub fn api_with_status(msg: impl Into<String>, status: u16) -> Self {
        Self::Api {
            message: msg.into(),
            status_code: Some(status),
        }
    }

    /// Create a new storage error.
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new storage error with source.
    pub fn storage_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Storage {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new data error.
    pub fn data(msg: impl Into<String>) -> Self {
        Self::Data {
            message: msg.into(),
        }
    }

    /// Create a new graph error.
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph {
            message: msg.into(),
            source: None,
        }
    }

    /// Create a new graph error with source.
    pub fn graph_with_source(
        msg: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Graph {
            message: msg.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new publish error for `platform`.
    pub fn publish(platform: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Publish {
            platform: platform.into(),
            message: msg.into(),
            status_code: None,
        }
    }

    /// Create a new publish error carrying the HTTP status.
    pub fn publish_with_status(
        platform: impl Into<String>,
        msg: impl Into<String>,
        status: u16,
    ) -> Self {
        Self::Publish {
            platform: platform.into(),
            message: msg.into(),
            status_code: Some(status),
        }
    }

    /// HTTP status code attached to the error, if any.
    pub const fn status_code(&self) -> Option<u16> {
        match self {
            Self::Api { status_code, .. } | Self::Publish { status_code, .. } => *status_code,
            _ => None,
        }
    }
}

/// Convert from reqwest::Error to DeathwatchError
impl From<reqwest::Error> for DeathwatchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::network_with_source("Request timeout", err)
        } else if err.is_connect() {
            Self::network_with_source("Connection failed", err)
        } else if err.is_status() {
            let status_code = err.status().map_or(0, |s| s.as_u16());
            Self::network_with_source(format!("HTTP error: {status_code}"), err)
        } else {
            Self::network_with_source("Network request failed", err)
        }
    }
}
