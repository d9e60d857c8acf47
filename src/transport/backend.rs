//! The raw HTTP seam underneath the throttled transport.
//!
//! [`HttpBackend`] performs exactly one GET and reports what happened. It never
//! sleeps or retries; that is the job of [`crate::ThrottledTransport`].

use crate::transport::error::BackendError;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

const API_KEY_HEADER: &str = "x-api-key";
const USER_AGENT: &str = concat!("aq-harvest/", env!("CARGO_PKG_VERSION"));

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }
}

/// Something that can perform a single authenticated GET request.
pub trait HttpBackend: Send + Sync {
    fn get(
        &self,
        url: &str,
        query: &[(String, String)],
    ) -> impl Future<Output = Result<HttpReply, BackendError>> + Send;
}

/// [`HttpBackend`] talking to the real API through `reqwest`.
pub struct ReqwestBackend {
    client: Client,
}

impl ReqwestBackend {
    pub fn new(api_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        let mut key = HeaderValue::from_str(api_key)
            .map_err(|_| BackendError::InvalidApiKey)?;
        key.set_sensitive(true);
        headers.insert(API_KEY_HEADER, key);

        let client = Client::builder()
            .default_headers(headers)
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(BackendError::ClientBuild)?;
        Ok(Self { client })
    }
}

impl HttpBackend for ReqwestBackend {
    async fn get(&self, url: &str, query: &[(String, String)]) -> Result<HttpReply, BackendError> {
        debug!("GET {} {:?}", url, query);
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| classify(url, e))?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| BackendError::Body {
            url: url.to_string(),
            source: e,
        })?;
        Ok(HttpReply { status, body })
    }
}

fn classify(url: &str, e: reqwest::Error) -> BackendError {
    if e.is_timeout() {
        BackendError::Timeout(url.to_string())
    } else if e.is_connect() {
        BackendError::Connect(url.to_string())
    } else {
        BackendError::Request {
            url: url.to_string(),
            source: e,
        }
    }
}
