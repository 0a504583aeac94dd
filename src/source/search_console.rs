//! Search analytics API client.
//!
//! Fetches (query, page) performance rows for a property over a date
//! range, paging until the source runs dry or the row cap is reached.
//! Authentication is a caller-supplied OAuth access token.

use crate::error::EngineError;
use crate::models::Observation;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Days, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default API root.
pub const API_BASE: &str = "https://www.googleapis.com/webmasters/v3";

/// Largest page the API will return for one request.
pub const MAX_PAGE_SIZE: usize = 25_000;

/// Per-request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 60;

/// Inclusive reporting window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Create a range, rejecting an inverted window.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            bail!("Start date {} is after end date {}", start, end);
        }
        Ok(Self { start, end })
    }

    /// Fill in missing bounds: `end` defaults to `today`, `start` to the
    /// `days`-long window ending at `end`.
    pub fn resolve(
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
        days: u32,
        today: NaiveDate,
    ) -> Result<Self> {
        let end = end.unwrap_or(today);
        let start = match start {
            Some(start) => start,
            None => end
                .checked_sub_days(Days::new(u64::from(days.max(1)) - 1))
                .ok_or_else(|| {
                    anyhow!(
                        "A {}-day window ending {} starts before the earliest supported date",
                        days,
                        end
                    )
                })?,
        };
        Self::new(start, end)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchAnalyticsRequest {
    start_date: String,
    end_date: String,
    dimensions: [&'static str; 2],
    row_limit: usize,
    start_row: usize,
}

#[derive(Debug, Deserialize)]
struct SearchAnalyticsResponse {
    #[serde(default)]
    rows: Vec<ApiRow>,
}

#[derive(Debug, Deserialize)]
struct ApiRow {
    #[serde(default)]
    keys: Vec<String>,
    #[serde(default)]
    clicks: f64,
    #[serde(default)]
    impressions: f64,
    #[serde(default)]
    position: f64,
}

#[derive(Debug, Deserialize)]
struct SitesResponse {
    #[serde(default, rename = "siteEntry")]
    site_entry: Vec<SiteEntry>,
}

/// A property the token has access to.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteEntry {
    pub site_url: String,
    #[serde(default)]
    pub permission_level: String,
}

/// Reshape one API row into an observation. `row` is the 1-based index
/// across all fetched pages.
fn reshape(row: usize, api_row: ApiRow) -> Result<Observation, EngineError> {
    let mut keys = api_row.keys.into_iter();
    let query = keys
        .next()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| EngineError::schema(row, "query", "response row has no query key"))?;
    let page = keys
        .next()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| EngineError::schema(row, "page", "response row has no page key"))?;

    if !api_row.position.is_finite() || api_row.position <= 0.0 {
        return Err(EngineError::schema(
            row,
            "position",
            format!("`{}` is not a positive number", api_row.position),
        ));
    }

    Ok(Observation {
        query,
        page,
        impressions: to_count(api_row.impressions),
        clicks: to_count(api_row.clicks),
        position: api_row.position,
    })
}

/// Counters arrive as JSON numbers; round to the nearest whole count.
fn to_count(value: f64) -> u64 {
    if value.is_finite() && value > 0.0 {
        value.round() as u64
    } else {
        0
    }
}

/// Rows to request next, given how many are already fetched.
fn next_page_size(row_limit: usize, fetched: usize) -> usize {
    row_limit.saturating_sub(fetched).min(MAX_PAGE_SIZE)
}

fn spinner(show_progress: bool) -> Option<ProgressBar> {
    if !show_progress {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) =
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")
    {
        pb.set_style(style);
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    Some(pb)
}

/// Client for the search analytics API.
pub struct SearchConsoleClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl SearchConsoleClient {
    /// Create a client against the default API root.
    pub fn new(access_token: impl Into<String>) -> Result<Self> {
        Self::with_base_url(API_BASE, access_token)
    }

    /// Create a client against a custom API root.
    pub fn with_base_url(
        base_url: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            access_token: access_token.into(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("API base URL cannot hold a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn query_url(&self, site_url: &str) -> Result<Url> {
        self.endpoint(&["sites", site_url, "searchAnalytics", "query"])
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        bail!("Search console API returned {}: {}", status, body.trim())
    }

    /// List the properties this token can read.
    pub async fn list_sites(&self) -> Result<Vec<SiteEntry>> {
        let url = self.endpoint(&["sites"])?;
        debug!("GET {}", url);

        let response = self
            .http
            .get(url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .context("Failed to reach search console API")?;

        let sites: SitesResponse = Self::check(response)
            .await?
            .json()
            .await
            .context("Failed to decode site list")?;

        Ok(sites.site_entry)
    }

    /// Fetch up to `row_limit` (query, page) rows for `site_url`.
    pub async fn fetch_observations(
        &self,
        site_url: &str,
        range: DateRange,
        row_limit: usize,
        show_progress: bool,
    ) -> Result<Vec<Observation>> {
        let url = self.query_url(site_url)?;
        info!(
            "Fetching search analytics for {} ({} to {}, up to {} rows)",
            site_url, range.start, range.end, row_limit
        );

        let progress = spinner(show_progress);
        let mut observations = Vec::new();

        loop {
            let page_size = next_page_size(row_limit, observations.len());
            if page_size == 0 {
                break;
            }

            let body = SearchAnalyticsRequest {
                start_date: range.start.format("%Y-%m-%d").to_string(),
                end_date: range.end.format("%Y-%m-%d").to_string(),
                dimensions: ["query", "page"],
                row_limit: page_size,
                start_row: observations.len(),
            };
            debug!("POST {} startRow={} rowLimit={}", url, body.start_row, page_size);

            let response = self
                .http
                .post(url.clone())
                .bearer_auth(&self.access_token)
                .json(&body)
                .send()
                .await
                .context("Failed to reach search console API")?;

            let page: SearchAnalyticsResponse = Self::check(response)
                .await?
                .json()
                .await
                .context("Failed to decode search analytics response")?;

            let received = page.rows.len();
            for api_row in page.rows {
                observations.push(reshape(observations.len() + 1, api_row)?);
            }

            if let Some(ref pb) = progress {
                pb.set_message(format!("{} rows fetched", observations.len()));
            }

            if received < page_size {
                break;
            }
        }

        if let Some(pb) = progress {
            pb.finish_and_clear();
        }

        info!("Fetched {} rows from search console", observations.len());
        Ok(observations)
    }
}
