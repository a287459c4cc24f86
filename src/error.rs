use thiserror::Error;

/// Why fetching the history of one address failed.
///
/// A `FetchError` never ends a crawl: the crawler logs it and moves on to the
/// next address in the frontier.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status} for {address}")]
    Status {
        address: String,
        status: reqwest::StatusCode,
    },

    #[error("malformed response body: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("seed address must not be empty")]
    EmptySeed,

    #[error("page size must be between 1 and {max}, got {got}")]
    PageSize { got: usize, max: usize },

    #[error("max nodes must be at least 1")]
    ZeroNodeCap,
}
