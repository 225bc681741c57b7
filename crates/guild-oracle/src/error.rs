//! Oracle error types.

use std::time::Duration;

/// Errors from a scoring backend. Recovered by [`crate::ResilientOracle`].
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The LLM API returned a non-2xx status.
    #[error("oracle {endpoint} returned {status}: {body}")]
    Api {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// The reply could not be turned into a verdict.
    #[error("malformed oracle reply: {0}")]
    Malformed(String),
    /// The backend did not answer in time.
    #[error("oracle timed out after {0:?}")]
    Timeout(Duration),
    /// The HTTP client could not be built.
    #[error("oracle client initialisation failed: {0}")]
    Init(String),
}

impl OracleError {
    /// Whether the same call may succeed if made again: connection failures,
    /// request timeouts, rate limiting and server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http { source, .. } => source.is_connect() || source.is_timeout(),
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Malformed(_) | Self::Timeout(_) | Self::Init(_) => false,
        }
    }
}
