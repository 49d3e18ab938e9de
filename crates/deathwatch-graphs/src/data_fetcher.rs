//! Coronavirus dashboard API client.
//!
//! Queries the v1 data endpoint for a single area and metric. The series is
//! read page by page until the server runs out of data; the update time
//! comes from the `Last-Modified` header of a `HEAD` request.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use deathwatch_common::{parse_remote_timestamp, DeathwatchError, Observation, Result};
use deathwatch_config::SourceConfig;
use reqwest::{header, Client, StatusCode};
use serde::Deserialize;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Area filters, joined with `;` on the wire.
pub const AREA_FILTERS: [&str; 2] = ["areaType=nation", "areaName=England"];

/// Metric requested from the API.
pub const DEATHS_METRIC: &str = "newDeaths28DaysByPublishDate";

/// Upper bound on pages walked for one series.
const MAX_PAGES: u32 = 50;

/// Source of the raw series and its update time.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Fetches every observation for the configured area.
    async fn fetch_series(&self) -> Result<Vec<Observation>>;

    /// Fetches the time the remote data last changed (naive UTC).
    async fn fetch_last_modified(&self) -> Result<NaiveDateTime>;
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    #[serde(default)]
    data: Vec<Observation>,
    #[serde(default)]
    pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    next: Option<String>,
}

/// `filters` query parameter.
pub fn filters_param() -> String {
    AREA_FILTERS.join(";")
}

/// `structure` query parameter: output field name to metric name.
pub fn structure_param() -> String {
    serde_json::json!({
        "date": "date",
        DEATHS_METRIC: DEATHS_METRIC,
    })
    .to_string()
}

/// Parses one page of the data endpoint. Returns the observations and
/// whether another page follows.
fn parse_page(body: &str) -> Result<(Vec<Observation>, bool)> {
    let page: ApiPage = serde_json::from_str(body)?;
    let has_next = !page.data.is_empty()
        && page
            .pagination
            .as_ref()
            .and_then(|p| p.next.as_deref())
            .is_some();
    Ok((page.data, has_next))
}

/// Client for the coronavirus dashboard API.
#[derive(Debug, Clone)]
pub struct CovidApiClient {
    client: Client,
    api_url: String,
}

impl CovidApiClient {
    /// Creates a new client from the source configuration.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .user_agent(concat!("deathwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| DeathwatchError::network_with_source("Failed to create HTTP client", e))?;

        Ok(Self {
            client,
            api_url: config.api_url.clone(),
        })
    }

    fn base_query(&self) -> [(&'static str, String); 3] {
        [
            ("filters", filters_param()),
            ("structure", structure_param()),
            ("format", "json".to_string()),
        ]
    }

    #[instrument(skip(self))]
    async fn fetch_page(&self, page: u32) -> Result<Option<String>> {
        let response = self
            .client
            .get(&self.api_url)
            .query(&self.base_query())
            .query(&[("page", page.to_string())])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            debug!("No content for page {}", page);
            return Ok(None);
        }
        if !status.is_success() {
            return Err(DeathwatchError::api_with_status(
                format!("data request for page {page} returned {status}"),
                status.as_u16(),
            ));
        }

        let body = response
            .text()
            .await
            .map_err(|e| DeathwatchError::network_with_source("Failed to read response body", e))?;
        Ok(Some(body))
    }
}

/// Walks pages `1..=MAX_PAGES` through `fetch_page` and collects every
/// observation.
///
/// Paging stops at a `None` page (HTTP 204), an empty `data` array or a
/// null `pagination.next`. Running past `MAX_PAGES` or collecting nothing
/// is an error.
pub(crate) async fn collect_pages<F, Fut>(mut fetch_page: F) -> Result<Vec<Observation>>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<String>>>,
{
    let mut observations = Vec::new();

    for page in 1..=MAX_PAGES {
        let Some(body) = fetch_page(page).await? else {
            break;
        };
        let (data, has_next) = parse_page(&body)?;
        debug!("Page {} carried {} observations", page, data.len());
        observations.extend(data);
        if !has_next {
            break;
        }
        if page == MAX_PAGES {
            return Err(DeathwatchError::api(format!(
                "series still paginating after {MAX_PAGES} pages"
            )));
        }
    }

    if observations.is_empty() {
        return Err(DeathwatchError::api("statistics API returned no observations"));
    }
    Ok(observations)
}

#[async_trait]
impl DataSource for CovidApiClient {
    #[instrument(skip(self))]
    async fn fetch_series(&self) -> Result<Vec<Observation>> {
        let observations = collect_pages(|page| self.fetch_page(page)).await?;
        info!("Fetched {} observations", observations.len());
        Ok(observations)
    }

    #[instrument(skip(self))]
    async fn fetch_last_modified(&self) -> Result<NaiveDateTime> {
        let response = self
            .client
            .head(&self.api_url)
            .query(&self.base_query())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(DeathwatchError::api_with_status(
                format!("last-modified request returned {status}"),
                status.as_u16(),
            ));
        }

        let raw = response
            .headers()
            .get(header::LAST_MODIFIED)
            .ok_or_else(|| DeathwatchError::api("response carried no Last-Modified header"))?
            .to_str()
            .map_err(|_| DeathwatchError::api("Last-Modified header is not valid text"))?;

        let timestamp = parse_remote_timestamp(raw).ok_or_else(|| {
            DeathwatchError::api(format!("unrecognised Last-Modified value '{raw}'"))
        })?;
        debug!(%timestamp, "Remote data last modified");
        Ok(timestamp)
    }
}
