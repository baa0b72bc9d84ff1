//! The network seam the agent falls back to on a cache miss.

use async_trait::async_trait;
use docscan_core::{Error, Request, Response};

/// Transport-level fetch failure.
///
/// A response with an error status is not a `FetchError`; it comes back as
/// an ordinary [`Response`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Connection refused, DNS failure, offline, etc.
    #[error("network error: {0}")]
    Network(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Cross-origin response the requesting mode is not allowed to see.
    #[error("CORS check failed: {0}")]
    Cors(String),

    /// Response body larger than the configured limit.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: usize, limit: usize },

    /// Request could not be built.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout } else { FetchError::Network(err.to_string()) }
    }
}

impl From<FetchError> for Error {
    fn from(err: FetchError) -> Self {
        Error::Network(err.to_string())
    }
}

/// Something that can answer a request from the network.
#[async_trait]
pub trait Network: Send + Sync {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}
