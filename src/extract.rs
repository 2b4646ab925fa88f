use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::client::PageSource;
use crate::error::{FetchError, SessionError};

pub const DEFAULT_BATCH_SIZE: u64 = 100;
pub const DEFAULT_DELAY: Duration = Duration::from_secs(1);

/// Everything one run accumulated, in fetch order.
///
/// `extracted_records` always equals `entries.len()`; it is stored
/// separately so exports carry the count even when entries are elided.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub total_records: u64,
    pub extracted_records: u64,
    pub entries: Vec<serde_json::Value>,
    pub extraction_timestamp: String,
}

/// Outcome of a run: the accumulated result, plus the failure that cut it
/// short if one did. `failure: Some` marks a partial result.
pub struct Extraction {
    pub result: ExtractionResult,
    pub failure: Option<FetchError>,
}

impl Extraction {
    pub fn is_partial(&self) -> bool {
        self.failure.is_some()
    }
}

/// Page through the endpoint sequentially until the declared total is
/// reached, a page comes back empty, or a fetch fails.
///
/// `recordsTotal` is read once, from the first successful page, and trusted
/// for the rest of the run; the empty-page stop covers stale counts. A
/// failed page is not retried — the run ends with whatever was accumulated.
pub async fn extract_all<S: PageSource>(
    source: &S,
    batch_size: u64,
    delay: Duration,
) -> Result<Extraction, SessionError> {
    source.acquire_session().await?;

    let mut entries: Vec<serde_json::Value> = Vec::new();
    let mut total: Option<u64> = None;
    let mut offset = 0u64;
    let mut failure: Option<FetchError> = None;
    let mut pb: Option<ProgressBar> = None;

    loop {
        info!("Fetching records {} - {}...", offset, offset + batch_size);

        let page = match source.fetch_page(offset, batch_size).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Stopping extraction: {}", e);
                failure = Some(e);
                break;
            }
        };

        if total.is_none() {
            info!("Total records available: {}", page.records_total);
            total = Some(page.records_total);
            let bar = ProgressBar::new(page.records_total);
            bar.set_style(
                ProgressStyle::default_bar()
                    .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")
                    .unwrap()
                    .progress_chars("=> "),
            );
            pb = Some(bar);
        }

        if page.data.is_empty() {
            info!("No more rows at offset {}; extraction complete", offset);
            break;
        }

        entries.extend(page.data);
        if let Some(bar) = &pb {
            bar.set_position(entries.len() as u64);
        }

        let declared = total.unwrap_or(0);
        if entries.len() as u64 >= declared {
            info!("All {} records fetched", entries.len());
            break;
        }

        offset += batch_size;
        tokio::time::sleep(delay).await;
    }

    if let Some(bar) = pb {
        bar.finish_and_clear();
    }

    let result = ExtractionResult {
        total_records: total.unwrap_or(0),
        extracted_records: entries.len() as u64,
        entries,
        extraction_timestamp: chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    };

    Ok(Extraction { result, failure })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::client::PageResponse;
    use crate::error::FetchErrorKind;

    struct ScriptedSource {
        session_ok: bool,
        pages: Mutex<VecDeque<Result<PageResponse, FetchError>>>,
    }

    impl ScriptedSource {
        fn new(pages: Vec<Result<PageResponse, FetchError>>) -> Self {
            Self {
                session_ok: true,
                pages: Mutex::new(pages.into()),
            }
        }
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        async fn acquire_session(&self) -> Result<(), SessionError> {
            if self.session_ok {
                Ok(())
            } else {
                Err(SessionError::Status {
                    status: StatusCode::FORBIDDEN,
                })
            }
        }

        async fn fetch_page(&self, offset: u64, _length: u64) -> Result<PageResponse, FetchError> {
            self.pages
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| panic!("unexpected fetch at offset {offset}"))
        }
    }

    fn page(total: u64, rows: usize) -> Result<PageResponse, FetchError> {
        Ok(PageResponse {
            records_total: total,
            data: (0..rows).map(|i| json!({ "id": i })).collect(),
        })
    }

    fn fetch_failure(offset: u64) -> Result<PageResponse, FetchError> {
        Err(FetchError {
            offset,
            kind: FetchErrorKind::Status {
                status: StatusCode::BAD_GATEWAY,
            },
        })
    }

    #[tokio::test]
    async fn stops_on_empty_page_and_counts_all_rows() {
        // Declared total never reached exactly; the empty page ends the run.
        let source = ScriptedSource::new(vec![
            page(400, 100),
            page(400, 100),
            page(400, 37),
            page(400, 0),
        ]);

        let out = extract_all(&source, 100, Duration::ZERO).await.unwrap();
        assert!(!out.is_partial());
        assert_eq!(out.result.extracted_records, 237);
        assert_eq!(out.result.entries.len(), 237);
        assert_eq!(out.result.total_records, 400);
    }

    #[tokio::test]
    async fn stops_once_declared_total_is_reached() {
        // Only three pages are scripted; a fourth fetch would panic.
        let source = ScriptedSource::new(vec![page(237, 100), page(237, 100), page(237, 37)]);

        let out = extract_all(&source, 100, Duration::ZERO).await.unwrap();
        assert!(!out.is_partial());
        assert_eq!(out.result.extracted_records, 237);
        assert_eq!(out.result.total_records, 237);
    }

    #[tokio::test]
    async fn never_fetches_past_an_overrun_total() {
        // Server keeps sending full pages past its own declared total; the
        // loop stops within one page of the declared count.
        let source = ScriptedSource::new(vec![page(150, 100), page(150, 100)]);

        let out = extract_all(&source, 100, Duration::ZERO).await.unwrap();
        assert_eq!(out.result.extracted_records, 200);
        assert_eq!(
            out.result.extracted_records,
            out.result.entries.len() as u64
        );
    }

    #[tokio::test]
    async fn mid_run_failure_yields_partial_result() {
        let source = ScriptedSource::new(vec![page(250, 100), fetch_failure(100)]);

        let out = extract_all(&source, 100, Duration::ZERO).await.unwrap();
        assert!(out.is_partial());
        assert_eq!(out.result.extracted_records, 100);
        assert_eq!(out.result.total_records, 250);
        assert_eq!(out.failure.unwrap().offset, 100);
    }

    #[tokio::test]
    async fn first_page_failure_yields_empty_partial() {
        let source = ScriptedSource::new(vec![fetch_failure(0)]);

        let out = extract_all(&source, 100, Duration::ZERO).await.unwrap();
        assert!(out.is_partial());
        assert_eq!(out.result.extracted_records, 0);
        assert_eq!(out.result.total_records, 0);
    }

    #[tokio::test]
    async fn session_failure_aborts_the_run() {
        let source = ScriptedSource {
            session_ok: false,
            pages: Mutex::new(VecDeque::new()),
        };

        let err = extract_all(&source, 100, Duration::ZERO).await;
        assert!(matches!(err, Err(SessionError::Status { .. })));
    }
}
