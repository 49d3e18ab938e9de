//! Publisher trait and per-run publish report.

use async_trait::async_trait;
use deathwatch_common::{truncate_string, DeathwatchError, PublishPayload, Result};
use reqwest::Response;
use std::fmt;
use tracing::{info, warn};

/// Longest error body kept in a failure reason.
const MAX_ERROR_BODY: usize = 200;

/// Step of a publish attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PublishStage {
    /// The platform rejected the credentials.
    Authenticate,
    /// Uploading the chart image.
    MediaUpload,
    /// Creating the post.
    Post,
}

impl PublishStage {
    /// Stage to blame for `err`, given the step that was running.
    /// Credential rejections are reported as [`PublishStage::Authenticate`].
    pub fn for_error(self, err: &DeathwatchError) -> Self {
        match err.status_code() {
            Some(401 | 403) => Self::Authenticate,
            _ => self,
        }
    }
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticate => write!(f, "authenticate"),
            Self::MediaUpload => write!(f, "media upload"),
            Self::Post => write!(f, "post"),
        }
    }
}

/// How a publish attempt ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishStatus {
    /// The post is live.
    Posted {
        /// Platform id of the uploaded chart.
        media_id: String,
        /// Platform id of the post.
        post_id: String,
    },
    /// The attempt stopped at `stage`.
    Failed {
        /// Step that failed.
        stage: PublishStage,
        /// Error description.
        reason: String,
    },
}

/// Result of publishing to one platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Platform name.
    pub platform: String,
    /// What happened.
    pub status: PublishStatus,
}

impl PublishOutcome {
    /// A successful post.
    pub fn posted(
        platform: impl Into<String>,
        media_id: impl Into<String>,
        post_id: impl Into<String>,
    ) -> Self {
        Self {
            platform: platform.into(),
            status: PublishStatus::Posted {
                media_id: media_id.into(),
                post_id: post_id.into(),
            },
        }
    }

    /// A failed attempt.
    pub fn failed(
        platform: impl Into<String>,
        stage: PublishStage,
        reason: impl fmt::Display,
    ) -> Self {
        Self {
            platform: platform.into(),
            status: PublishStatus::Failed {
                stage,
                reason: reason.to_string(),
            },
        }
    }

    /// Whether the post went out.
    pub const fn is_posted(&self) -> bool {
        matches!(self.status, PublishStatus::Posted { .. })
    }
}

impl fmt::Display for PublishOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.status {
            PublishStatus::Posted { post_id, .. } => {
                write!(f, "{}: posted {}", self.platform, post_id)
            }
            PublishStatus::Failed { stage, reason } => {
                write!(f, "{}: {} failed: {}", self.platform, stage, reason)
            }
        }
    }
}

/// Outcomes of one publish step, in publisher order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// One entry per publisher.
    pub outcomes: Vec<PublishOutcome>,
}

impl PublishReport {
    /// Number of publishers attempted.
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// Number of publishers that posted.
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_posted()).count()
    }

    /// Whether every publisher posted.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(PublishOutcome::is_posted)
    }

    /// Whether at least one publisher posted.
    pub fn any_succeeded(&self) -> bool {
        self.outcomes.iter().any(PublishOutcome::is_posted)
    }

    /// The failed attempts.
    pub fn failures(&self) -> impl Iterator<Item = &PublishOutcome> {
        self.outcomes.iter().filter(|o| !o.is_posted())
    }
}

impl fmt::Display for PublishReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{} published", self.succeeded(), self.attempted())
    }
}

/// A social platform the chart is posted to.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Platform name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Uploads the chart and posts the message. Failures are reported in
    /// the outcome, never raised.
    async fn publish(&self, payload: &PublishPayload) -> PublishOutcome;
}

/// Runs every publisher in order. A failure on one platform does not stop
/// the next.
pub async fn publish_all(
    publishers: &[Box<dyn Publisher>],
    payload: &PublishPayload,
) -> PublishReport {
    let mut report = PublishReport::default();

    for publisher in publishers {
        let outcome = publisher.publish(payload).await;
        match &outcome.status {
            PublishStatus::Posted { post_id, .. } => {
                info!(platform = publisher.name(), post_id = %post_id, "Published update");
            }
            PublishStatus::Failed { stage, reason } => {
                warn!(platform = publisher.name(), %stage, "Publish failed: {}", reason);
            }
        }
        report.outcomes.push(outcome);
    }

    report
}

/// Passes successful responses through; otherwise reads the body into a
/// publish error carrying the status code.
pub(crate) async fn ensure_success(platform: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(DeathwatchError::publish_with_status(
        platform,
        format!("HTTP {}: {}", status, truncate_string(body.trim(), MAX_ERROR_BODY)),
        status.as_u16(),
    ))
}
