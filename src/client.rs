use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{FetchError, FetchErrorKind, SessionError};

const BASE_URL: &str = "https://www.exploit-db.com/google-hacking-database";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/137.0.0.0 Safari/537.36";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Columns the endpoint's table is built from, in declaration order.
/// Ordering is fixed on the first column (date), descending.
const COLUMNS: [(&str, &str, &str); 4] = [
    ("date", "true", "true"),
    ("url_title", "true", "false"),
    ("cat_id", "true", "false"),
    ("author_id", "false", "false"),
];

/// One page of the DataTables envelope.
///
/// `records_total` is authoritative for the whole dataset; rows stay as
/// loose JSON because field shapes vary (scalars vs nested objects).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageResponse {
    #[serde(rename = "recordsTotal", default)]
    pub records_total: u64,
    #[serde(default)]
    pub data: Vec<serde_json::Value>,
}

/// Seam between the extraction loop and the network, so the loop can run
/// against scripted pages in tests.
#[async_trait]
pub trait PageSource {
    async fn acquire_session(&self) -> Result<(), SessionError>;
    async fn fetch_page(&self, offset: u64, length: u64) -> Result<PageResponse, FetchError>;
}

/// Session-holding client for the GHDB endpoint.
///
/// Cookies collected during `acquire_session` live in the jar and ride
/// along on every page request; nothing writes the jar after bootstrap.
pub struct GhdbClient {
    http: reqwest::Client,
}

impl GhdbClient {
    pub fn new() -> Result<Self, SessionError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static("application/json, text/javascript, */*; q=0.01"),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("en-GB,en;q=0.6"));
        headers.insert("Referer", HeaderValue::from_static(BASE_URL));
        headers.insert(
            "X-Requested-With",
            HeaderValue::from_static("XMLHttpRequest"),
        );

        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .cookie_store(true)
            .gzip(true)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(SessionError::Client)?;

        Ok(Self { http })
    }
}

#[async_trait]
impl PageSource for GhdbClient {
    /// Visit the table page once so the endpoint issues its session cookies.
    async fn acquire_session(&self) -> Result<(), SessionError> {
        let resp = self.http.get(BASE_URL).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(SessionError::Status { status });
        }
        info!("Session established ({})", status);
        Ok(())
    }

    async fn fetch_page(&self, offset: u64, length: u64) -> Result<PageResponse, FetchError> {
        let nonce = chrono::Utc::now().timestamp_millis();
        let params = page_params(offset, length, nonce);

        let fail = |kind: FetchErrorKind| FetchError { offset, kind };

        let resp = self
            .http
            .get(BASE_URL)
            .query(&params)
            .send()
            .await
            .map_err(|e| fail(e.into()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(fail(FetchErrorKind::Status { status }));
        }

        // Body may arrive gzip-compressed; reqwest inflates it before we
        // see the bytes, so only the JSON decode can fail from here.
        let body = resp.text().await.map_err(|e| fail(e.into()))?;
        let page: PageResponse = serde_json::from_str(&body).map_err(|e| fail(e.into()))?;

        debug!(
            offset,
            rows = page.data.len(),
            total = page.records_total,
            "page decoded"
        );
        Ok(page)
    }
}

/// DataTables server-side query for one page: per-column descriptors, fixed
/// date-descending order, empty search filters, windowing, and a timestamp
/// nonce to defeat intermediate caches.
fn page_params(offset: u64, length: u64, nonce: i64) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = vec![("draw".into(), "1".into())];

    for (i, (name, searchable, orderable)) in COLUMNS.iter().enumerate() {
        params.push((format!("columns[{i}][data]"), (*name).into()));
        params.push((format!("columns[{i}][name]"), (*name).into()));
        params.push((format!("columns[{i}][searchable]"), (*searchable).into()));
        params.push((format!("columns[{i}][orderable]"), (*orderable).into()));
        params.push((format!("columns[{i}][search][value]"), String::new()));
        params.push((format!("columns[{i}][search][regex]"), "false".into()));
    }

    params.push(("order[0][column]".into(), "0".into()));
    params.push(("order[0][dir]".into(), "desc".into()));
    params.push(("search[value]".into(), String::new()));
    params.push(("search[regex]".into(), "false".into()));
    params.push(("author".into(), String::new()));
    params.push(("category".into(), String::new()));
    params.push(("start".into(), offset.to_string()));
    params.push(("length".into(), length.to_string()));
    params.push(("_".into(), nonce.to_string()));

    params
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup<'a>(params: &'a [(String, String)], key: &str) -> Option<&'a str> {
        params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    #[test]
    fn page_params_window_and_nonce() {
        let params = page_params(300, 100, 1724400000000);
        assert_eq!(lookup(&params, "start"), Some("300"));
        assert_eq!(lookup(&params, "length"), Some("100"));
        assert_eq!(lookup(&params, "_"), Some("1724400000000"));
        assert_eq!(lookup(&params, "order[0][column]"), Some("0"));
        assert_eq!(lookup(&params, "order[0][dir]"), Some("desc"));
    }

    #[test]
    fn page_params_describe_all_four_columns() {
        let params = page_params(0, 100, 0);
        for (i, name) in ["date", "url_title", "cat_id", "author_id"]
            .iter()
            .enumerate()
        {
            assert_eq!(lookup(&params, &format!("columns[{i}][data]")), Some(*name));
            assert_eq!(
                lookup(&params, &format!("columns[{i}][search][regex]")),
                Some("false")
            );
        }
    }

    #[test]
    fn envelope_tolerates_missing_fields() {
        let page: PageResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(page.records_total, 0);
        assert!(page.data.is_empty());
    }
}
