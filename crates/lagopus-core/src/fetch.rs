//! Stats fetching: the [`StatsSource`] seam and its HTTP implementation.
//!
//! Three endpoint layouts are supported:
//!
//! - `GET <base>/api/jobs/stats?job=<id>` always returns the full history.
//! - `GET <base>/api/jobs/<id>/stats[?since=<instant>]` returns rows at or
//!   after `since` (or strictly after, depending on the server).
//! - `GET <base>/api/jobs/<id>/stats/<column>[?since=<instant>]`, one endpoint
//!   per metric column, for backends that serve each series separately.
//!
//! All return a JSON array of samples ordered by `time`.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::SyncError;
use crate::sample::{FetchResult, decode_samples};
use crate::tracker::format_cursor;

/// One poll of the stats backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub job_id: String,
    /// Series name when fetching per series, `None` for a whole-job fetch.
    pub series: Option<String>,
    /// Metric column of that series.
    pub column: Option<String>,
    /// Only samples from this instant on; `None` requests full history.
    pub since: Option<DateTime<Utc>>,
}

impl FetchRequest {
    pub fn job(job_id: impl Into<String>, since: Option<DateTime<Utc>>) -> Self {
        Self {
            job_id: job_id.into(),
            series: None,
            column: None,
            since,
        }
    }

    pub fn series(
        job_id: impl Into<String>,
        series: impl Into<String>,
        column: impl Into<String>,
        since: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            series: Some(series.into()),
            column: Some(column.into()),
            since,
        }
    }

    pub fn is_full(&self) -> bool {
        self.since.is_none()
    }
}

/// Anything that can answer a [`FetchRequest`].
pub trait StatsSource: Send + Sync {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchResult, SyncError>> + Send;
}

impl<S: StatsSource> StatsSource for Arc<S> {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchResult, SyncError>> + Send {
        (**self).fetch(request)
    }
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// URL layout of the stats endpoint.
///
/// The two job-level layouts ignore [`FetchRequest::column`]: per-series
/// requests against them hit the same URL and differ only in `since`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointStyle {
    /// `api/jobs/stats?job=<id>`, no cursor support.
    #[serde(alias = "query")]
    JobQuery,
    /// `api/jobs/<id>/stats?since=<instant>`.
    #[default]
    #[serde(alias = "path")]
    JobPath,
    /// `api/jobs/<id>/stats/<column>?since=<instant>`; whole-job requests
    /// fall back to [`EndpointStyle::JobPath`].
    #[serde(alias = "series")]
    SeriesPath,
}

impl std::str::FromStr for EndpointStyle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "query" | "job_query" => Ok(Self::JobQuery),
            "path" | "job_path" => Ok(Self::JobPath),
            "series" | "series_path" => Ok(Self::SeriesPath),
            other => Err(format!("unknown endpoint style '{other}'")),
        }
    }
}

/// Stats client over HTTP.
#[derive(Debug, Clone)]
pub struct HttpStatsClient {
    client: reqwest::Client,
    base: Url,
    style: EndpointStyle,
}

impl HttpStatsClient {
    pub fn new(base_url: &str, style: EndpointStyle) -> Result<Self, SyncError> {
        let base = Url::parse(base_url)
            .map_err(|e| SyncError::transport(base_url, format!("invalid base URL: {e}")))?;
        if base.cannot_be_a_base() {
            return Err(SyncError::transport(base_url, "base URL cannot carry a path"));
        }
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| SyncError::transport(base_url, e.to_string()))?;
        Ok(Self {
            client,
            base,
            style,
        })
    }

    pub fn style(&self) -> EndpointStyle {
        self.style
    }

    /// One-shot fetch of a job's samples outside any driver.
    pub async fn fetch_once(
        &self,
        job_id: &str,
        since: Option<DateTime<Utc>>,
    ) -> Result<FetchResult, SyncError> {
        self.fetch(&FetchRequest::job(job_id, since)).await
    }

    /// Resolve the URL polled for `request`.
    pub fn endpoint(&self, request: &FetchRequest) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty();
            match self.style {
                EndpointStyle::JobQuery => {
                    segments.extend(["api", "jobs", "stats"]);
                }
                EndpointStyle::JobPath => {
                    segments.extend(["api", "jobs", request.job_id.as_str(), "stats"]);
                }
                EndpointStyle::SeriesPath => {
                    segments.extend(["api", "jobs", request.job_id.as_str(), "stats"]);
                    if let Some(column) = &request.column {
                        segments.push(column);
                    }
                }
            }
        }
        match self.style {
            EndpointStyle::JobQuery => {
                url.query_pairs_mut().append_pair("job", &request.job_id);
            }
            EndpointStyle::JobPath | EndpointStyle::SeriesPath => {
                if let Some(since) = &request.since {
                    url.query_pairs_mut()
                        .append_pair("since", &format_cursor(since));
                }
            }
        }
        url
    }
}

impl StatsSource for HttpStatsClient {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResult, SyncError> {
        let url = self.endpoint(request);
        let target = url.to_string();
        log::trace!("GET {target}");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| SyncError::transport(&target, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::status(&target, status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::transport(&target, e.to_string()))?;
        decode_samples(&target, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 5).unwrap()
    }

    #[test]
    fn job_query_url() {
        let client = HttpStatsClient::new("http://lagopus:8080", EndpointStyle::JobQuery).unwrap();
        let url = client.endpoint(&FetchRequest::job("fuzz-1", Some(since())));
        assert_eq!(url.as_str(), "http://lagopus:8080/api/jobs/stats?job=fuzz-1");
    }

    #[test]
    fn job_path_url_full_history() {
        let client = HttpStatsClient::new("http://lagopus:8080/", EndpointStyle::JobPath).unwrap();
        let url = client.endpoint(&FetchRequest::job("fuzz-1", None));
        assert_eq!(url.as_str(), "http://lagopus:8080/api/jobs/fuzz-1/stats");
    }

    #[test]
    fn job_path_url_with_since() {
        let client = HttpStatsClient::new("http://lagopus:8080", EndpointStyle::JobPath).unwrap();
        let url = client.endpoint(&FetchRequest::series("fuzz-1", "Memory", "memory", Some(since())));
        assert_eq!(
            url.as_str(),
            "http://lagopus:8080/api/jobs/fuzz-1/stats?since=2024-03-01T12%3A00%3A05Z"
        );
    }

    #[test]
    fn base_path_prefix_is_kept() {
        let client =
            HttpStatsClient::new("http://host/lagopus/", EndpointStyle::JobPath).unwrap();
        let url = client.endpoint(&FetchRequest::job("a b", None));
        assert_eq!(url.as_str(), "http://host/lagopus/api/jobs/a%20b/stats");
    }

    #[test]
    fn invalid_base_rejected() {
        assert!(HttpStatsClient::new("not a url", EndpointStyle::JobPath).is_err());
        assert!(HttpStatsClient::new("mailto:x@y", EndpointStyle::JobPath).is_err());
    }

    #[test]
    fn endpoint_style_parses() {
        assert_eq!("query".parse::<EndpointStyle>(), Ok(EndpointStyle::JobQuery));
        assert_eq!("path".parse::<EndpointStyle>(), Ok(EndpointStyle::JobPath));
        assert_eq!("series".parse::<EndpointStyle>(), Ok(EndpointStyle::SeriesPath));
        assert!("rest".parse::<EndpointStyle>().is_err());
    }

    #[test]
    fn series_path_url_per_column() {
        let client = HttpStatsClient::new("http://lagopus:8080", EndpointStyle::SeriesPath).unwrap();
        let url = client.endpoint(&FetchRequest::series(
            "fuzz-1",
            "Execs/sec",
            "execs_per_sec",
            Some(since()),
        ));
        assert_eq!(
            url.as_str(),
            "http://lagopus:8080/api/jobs/fuzz-1/stats/execs_per_sec?since=2024-03-01T12%3A00%3A05Z"
        );

        let whole = client.endpoint(&FetchRequest::job("fuzz-1", None));
        assert_eq!(whole.as_str(), "http://lagopus:8080/api/jobs/fuzz-1/stats");
    }

    #[test]
    fn request_constructors() {
        assert!(FetchRequest::job("a", None).is_full());
        let r = FetchRequest::series("a", "Memory", "memory", Some(since()));
        assert_eq!(r.series.as_deref(), Some("Memory"));
        assert_eq!(r.column.as_deref(), Some("memory"));
        assert!(!r.is_full());
    }
}
