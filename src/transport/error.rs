use thiserror::Error;

/// Failure of a single HTTP exchange, before any retry decision is made.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("API key contains characters that are not allowed in an HTTP header")]
    InvalidApiKey,

    #[error("Failed to build HTTP client")]
    ClientBuild(#[source] reqwest::Error),

    #[error("Request to {0} timed out")]
    Timeout(String),

    #[error("Could not connect to {0}")]
    Connect(String),

    #[error("Request to {url} failed")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {url}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Rate limit still in effect for {url} after {attempts} attempts")]
    RateLimitExceeded { url: String, attempts: u32 },

    #[error("Giving up on {url} after {attempts} attempts")]
    Exhausted {
        url: String,
        attempts: u32,
        #[source]
        source: BackendError,
    },

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus { url: String, status: u16 },

    #[error("Response from {url} is not valid JSON")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TransportError {
    /// True when the provider kept throttling us rather than the network failing.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimitExceeded { .. })
    }
}
