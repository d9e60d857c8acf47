use crate::transport::backend::HttpBackend;
use crate::transport::error::TransportError;
use crate::transport::retry::{ResourceKind, RetryPolicy, ThrottleConfig};
use log::{debug, warn};
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

/// A decoded 2xx response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub payload: Value,
    pub status: u16,
}

/// Paces, authenticates (through its backend) and retries calls to the API.
///
/// All calls go through [`ThrottledTransport::call`], one at a time. Before each
/// attempt the transport waits until the resource's minimum interval has elapsed
/// since the previous attempt. Rate limiting and request failures are retried
/// according to the [`RetryPolicy`]; any other non-2xx status is returned as an
/// error straight away.
pub struct ThrottledTransport<B> {
    backend: B,
    base_url: String,
    retry: RetryPolicy,
    throttle: ThrottleConfig,
    last_call: Mutex<Option<Instant>>,
}

impl<B: HttpBackend> ThrottledTransport<B> {
    pub fn new(backend: B, base_url: &str, retry: RetryPolicy, throttle: ThrottleConfig) -> Self {
        Self {
            backend,
            base_url: base_url.trim_end_matches('/').to_string(),
            retry,
            throttle,
            last_call: Mutex::new(None),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn url_for(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Issues a GET against `endpoint` (relative to the base URL).
    pub async fn call(
        &self,
        kind: ResourceKind,
        endpoint: &str,
        query: &[(String, String)],
    ) -> Result<ApiResponse, TransportError> {
        let url = self.url_for(endpoint);
        let mut rate_limited = 0u32;
        let mut failed = 0u32;

        loop {
            self.wait_turn(kind).await;

            match self.backend.get(&url, query).await {
                Ok(reply) if reply.is_rate_limited() => {
                    rate_limited += 1;
                    if rate_limited >= self.retry.max_rate_limit_attempts {
                        warn!(
                            "Rate limited on {} {} times, giving up on this request",
                            url, rate_limited
                        );
                        return Err(TransportError::RateLimitExceeded {
                            url,
                            attempts: rate_limited,
                        });
                    }
                    let delay = self.retry.rate_limit_delay(rate_limited - 1);
                    warn!(
                        "Rate limited on {} (attempt {}/{}), backing off for {:?}",
                        url, rate_limited, self.retry.max_rate_limit_attempts, delay
                    );
                    sleep(delay).await;
                }
                Ok(reply) if reply.is_success() => {
                    let payload = serde_json::from_str(&reply.body)
                        .map_err(|e| TransportError::Decode {
                            url: url.clone(),
                            source: e,
                        })?;
                    return Ok(ApiResponse {
                        payload,
                        status: reply.status,
                    });
                }
                Ok(reply) => {
                    warn!("HTTP status {} for {}", reply.status, url);
                    return Err(TransportError::HttpStatus {
                        url,
                        status: reply.status,
                    });
                }
                Err(e) => {
                    failed += 1;
                    if failed >= self.retry.max_transport_attempts {
                        warn!("Request to {} failed {} times: {}", url, failed, e);
                        return Err(TransportError::Exhausted {
                            url,
                            attempts: failed,
                            source: e,
                        });
                    }
                    let delay = self.retry.transport_delay(failed - 1);
                    warn!(
                        "Request to {} failed (attempt {}/{}): {}; retrying in {:?}",
                        url, failed, self.retry.max_transport_attempts, e, delay
                    );
                    sleep(delay).await;
                }
            }
        }
    }

    /// Sleeps until the minimum interval for `kind` has passed since the last call,
    /// then stamps the current call.
    async fn wait_turn(&self, kind: ResourceKind) {
        let interval = self.throttle.interval(kind);
        let mut last_call = self.last_call.lock().await;
        if let Some(previous) = *last_call {
            let ready_at = previous + interval;
            let now = Instant::now();
            if ready_at > now {
                let wait = ready_at - now;
                debug!("Throttling {} call for {:?}", kind, wait);
                sleep(wait).await;
            }
        }
        *last_call = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedBackend;
    use crate::transport::backend::HttpReply;
    use crate::transport::error::BackendError;
    use std::time::Duration;

    fn transport(backend: ScriptedBackend, retry: RetryPolicy) -> ThrottledTransport<ScriptedBackend> {
        ThrottledTransport::new(backend, "https://api.test/v3/", retry, ThrottleConfig::none())
    }

    #[tokio::test]
    async fn returns_payload_on_success() {
        let backend = ScriptedBackend::new(|_, _| Ok(HttpReply::new(200, r#"{"results": []}"#)));
        let transport = transport(backend, RetryPolicy::immediate(3, 3));

        let response = transport
            .call(ResourceKind::Locations, "locations", &[])
            .await
            .unwrap();

        assert_eq!(response.status, 200);
        assert!(response.payload["results"].as_array().unwrap().is_empty());
        assert_eq!(
            transport.backend().requests()[0].url,
            "https://api.test/v3/locations"
        );
    }

    #[tokio::test]
    async fn always_rate_limited_stops_after_max_attempts() {
        let backend = ScriptedBackend::new(|_, _| Ok(HttpReply::new(429, "slow down")));
        let retry = RetryPolicy {
            rate_limit_base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            ..RetryPolicy::immediate(3, 3)
        };
        let transport = transport(backend, retry);

        let started = std::time::Instant::now();
        let err = transport
            .call(ResourceKind::Measurements, "sensors/1/measurements", &[])
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        assert!(matches!(
            err,
            TransportError::RateLimitExceeded { attempts: 3, .. }
        ));
        assert_eq!(transport.backend().call_count(), 3);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn recovers_after_transient_rate_limit() {
        let backend = ScriptedBackend::sequence(vec![
            Ok(HttpReply::new(429, "")),
            Ok(HttpReply::new(200, r#"{"ok": true}"#)),
        ]);
        let transport = transport(backend, RetryPolicy::immediate(3, 3));

        let response = transport
            .call(ResourceKind::Sensors, "locations/1/sensors", &[])
            .await
            .unwrap();

        assert_eq!(response.payload["ok"], Value::Bool(true));
        assert_eq!(transport.backend().call_count(), 2);
    }

    #[tokio::test]
    async fn network_failures_are_retried_then_surface() {
        let backend =
            ScriptedBackend::new(|url, _| Err(BackendError::Timeout(url.to_string())));
        let transport = transport(backend, RetryPolicy::immediate(3, 4));

        let err = transport
            .call(ResourceKind::Locations, "locations", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Exhausted { attempts: 4, .. }));
        assert_eq!(transport.backend().call_count(), 4);
    }

    #[tokio::test]
    async fn other_statuses_fail_without_retry() {
        let backend = ScriptedBackend::new(|_, _| Ok(HttpReply::new(404, "not found")));
        let transport = transport(backend, RetryPolicy::immediate(3, 3));

        let err = transport
            .call(ResourceKind::Sensors, "locations/9/sensors", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::HttpStatus { status: 404, .. }));
        assert_eq!(transport.backend().call_count(), 1);
    }

    #[tokio::test]
    async fn invalid_json_is_a_decode_error() {
        let backend = ScriptedBackend::new(|_, _| Ok(HttpReply::new(200, "<html>")));
        let transport = transport(backend, RetryPolicy::immediate(3, 3));

        let err = transport
            .call(ResourceKind::Locations, "locations", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, TransportError::Decode { .. }));
    }

    #[tokio::test]
    async fn consecutive_calls_respect_min_interval() {
        let backend = ScriptedBackend::new(|_, _| Ok(HttpReply::new(200, "{}")));
        let throttle = ThrottleConfig {
            locations: Duration::from_millis(30),
            ..ThrottleConfig::none()
        };
        let transport = ThrottledTransport::new(
            backend,
            "https://api.test/v3",
            RetryPolicy::immediate(1, 1),
            throttle,
        );

        let started = std::time::Instant::now();
        for _ in 0..3 {
            transport
                .call(ResourceKind::Locations, "locations", &[])
                .await
                .unwrap();
        }
        assert!(started.elapsed() >= Duration::from_millis(60));
    }
}
