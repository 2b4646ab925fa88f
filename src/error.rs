use reqwest::StatusCode;

/// Failure to establish a working session with the endpoint.
///
/// Fatal for a run: no page request succeeds without the session cookies,
/// so there is never partial data to salvage here.
#[derive(thiserror::Error, Debug)]
pub enum SessionError {
    #[error("failed to build http client: {0}")]
    Client(reqwest::Error),
    #[error("session bootstrap request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("session bootstrap got status {status}")]
    Status { status: StatusCode },
}

/// A single page request that did not produce a usable envelope.
///
/// Halts the extraction loop but preserves everything fetched so far.
#[derive(thiserror::Error, Debug)]
#[error("page fetch at offset {offset} failed: {kind}")]
pub struct FetchError {
    pub offset: u64,
    #[source]
    pub kind: FetchErrorKind,
}

#[derive(thiserror::Error, Debug)]
pub enum FetchErrorKind {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status}")]
    Status { status: StatusCode },
    #[error("malformed json body: {0}")]
    Json(#[from] serde_json::Error),
}
