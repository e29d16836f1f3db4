//! HTTP forwarder with bounded exponential-backoff retries.
//!
//! Sends one JSON payload to a downstream endpoint, retrying transport
//! failures and non-2xx responses according to a [`RetryPolicy`]. Backoff
//! waits go through the injected [`Clock`] so tests observe the schedule
//! without sleeping.

use std::{collections::HashMap, sync::Arc, time::Duration};

use bytes::Bytes;
use relay_core::{Clock, RealClock};
use reqwest::Response;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info_span, warn, Instrument};

use crate::{
    error::{DeliveryError, Result},
    retry::RetryPolicy,
    DEFAULT_HTTP_TIMEOUT,
};

/// Response bodies beyond this size are truncated before logging.
const MAX_RESPONSE_BODY_SIZE: usize = 64 * 1024;

/// Configuration for the [`Forwarder`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwarderConfig {
    /// Timeout applied to each individual attempt.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
    /// Retry count and backoff base.
    pub retry: RetryPolicy,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_HTTP_TIMEOUT,
            user_agent: format!("event-relay/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a successful forward.
#[derive(Debug, Clone)]
pub struct ForwardResponse {
    /// HTTP status of the accepted attempt, always 2xx.
    pub status_code: u16,
    /// Response body, truncated to a bounded size.
    pub body: String,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Duration of the successful attempt.
    pub duration: Duration,
}

/// Result of a single attempt that reached the server.
#[derive(Debug)]
struct AttemptResponse {
    status_code: u16,
    body: String,
    duration: Duration,
}

/// Retrying HTTP sender shared by all workers.
///
/// Cloning is cheap and shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    config: ForwarderConfig,
    clock: Arc<dyn Clock>,
}

impl Forwarder {
    /// Creates a forwarder that waits in real time between attempts.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn new(config: ForwarderConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(RealClock::new()))
    }

    /// Creates a forwarder using `clock` for backoff waits.
    ///
    /// # Errors
    ///
    /// Returns `DeliveryError::Configuration` if the HTTP client cannot be
    /// built with the provided settings.
    pub fn with_clock(config: ForwarderConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()
            .map_err(|e| {
                DeliveryError::configuration(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self { client, config, clock })
    }

    /// Active configuration.
    pub fn config(&self) -> &ForwarderConfig {
        &self.config
    }

    /// POSTs `payload` as JSON to `url`, retrying until a 2xx response.
    ///
    /// Makes up to `max_retries + 1` attempts. Before attempt `k >= 1` waits
    /// `base_delay * 2^(k-1)`. An attempt succeeds only when the request and
    /// the response body both complete and the status is 2xx. Every other
    /// failure, including an invalid request, consumes the retry budget.
    /// Cancellation during an attempt or a wait returns immediately without
    /// further attempts.
    ///
    /// # Errors
    ///
    /// - `Cancelled` when `cancel` fires.
    /// - `Serialization` when `payload` cannot be encoded.
    /// - The final attempt's error (`Network`, `Timeout` or `Configuration`)
    ///   when retries run out on a failure that produced no status.
    /// - `RetriesExhausted` naming the final status when retries run out on
    ///   non-2xx responses.
    pub async fn send<P>(
        &self,
        url: &str,
        payload: &P,
        headers: &HashMap<String, String>,
        cancel: &CancellationToken,
    ) -> Result<ForwardResponse>
    where
        P: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(payload)
            .map(Bytes::from)
            .map_err(|e| DeliveryError::serialization(e.to_string()))?;

        let policy = self.config.retry;
        let total_attempts = policy.total_attempts();
        let mut last_failure = DeliveryError::retries_exhausted(0, 0);

        for attempt in 0..total_attempts {
            if attempt > 0 {
                let delay = policy.delay_before(attempt);
                debug!(attempt, delay_ms = delay.as_millis(), "backing off before retry");

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                    () = self.clock.sleep(delay) => {},
                }
            }

            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(DeliveryError::Cancelled),
                outcome = self.attempt(url, body.clone(), headers, attempt) => outcome,
            };

            match outcome {
                Ok(response) if (200..300).contains(&response.status_code) => {
                    return Ok(ForwardResponse {
                        status_code: response.status_code,
                        body: response.body,
                        attempts: attempt + 1,
                        duration: response.duration,
                    });
                },
                Ok(response) => {
                    last_failure =
                        DeliveryError::retries_exhausted(response.status_code, attempt + 1);
                },
                Err(error) => last_failure = error,
            }
        }

        warn!(url, attempts = total_attempts, error = %last_failure, "forward failed after all attempts");
        Err(last_failure)
    }

    /// Runs one HTTP attempt inside its own span.
    async fn attempt(
        &self,
        url: &str,
        body: Bytes,
        headers: &HashMap<String, String>,
        attempt: u32,
    ) -> Result<AttemptResponse> {
        let span = info_span!("forward_attempt", url = %url, attempt);

        async move {
            let start_time = self.clock.now();

            let mut request =
                self.client.post(url).body(body).header("content-type", "application/json");
            for (key, value) in headers {
                request = request.header(key, value);
            }

            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    let duration = self.clock.now().duration_since(start_time);
                    warn!(duration_ms = duration.as_millis(), "request failed: {}", e);
                    return Err(self.classify(&e));
                },
            };

            let duration = self.clock.now().duration_since(start_time);
            let status_code = response.status().as_u16();
            let body = match read_body(response).await {
                Ok(body) => body,
                Err(e) => {
                    warn!(status = status_code, "failed to read response body: {}", e);
                    return Err(self.classify(&e));
                },
            };

            if (200..300).contains(&status_code) {
                debug!(status = status_code, duration_ms = duration.as_millis(), "received response");
            } else {
                warn!(status = status_code, duration_ms = duration.as_millis(), "non-success response");
            }

            Ok(AttemptResponse { status_code, body, duration })
        }
        .instrument(span)
        .await
    }

    fn classify(&self, error: &reqwest::Error) -> DeliveryError {
        if error.is_builder() {
            return DeliveryError::configuration(format!("invalid request: {error}"));
        }
        if error.is_timeout() {
            let timeout_ms = u64::try_from(self.config.timeout.as_millis()).unwrap_or(u64::MAX);
            return DeliveryError::timeout(timeout_ms);
        }
        if error.is_connect() {
            return DeliveryError::network(format!("connection failed: {error}"));
        }
        DeliveryError::network(error.to_string())
    }
}

/// Reads the response body, truncating oversized bodies.
async fn read_body(response: Response) -> reqwest::Result<String> {
    let bytes = response.bytes().await?;

    if bytes.len() > MAX_RESPONSE_BODY_SIZE {
        let truncated = String::from_utf8_lossy(&bytes[..MAX_RESPONSE_BODY_SIZE]);
        return Ok(format!("{truncated}... (truncated)"));
    }

    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use relay_core::TestClock;
    use serde_json::json;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::{TcpListener, TcpStream},
    };
    use wiremock::{matchers, Mock, MockServer, ResponseTemplate};

    use super::*;

    fn fast_config(max_retries: u32) -> ForwarderConfig {
        ForwarderConfig {
            timeout: Duration::from_millis(500),
            retry: RetryPolicy::new(max_retries, Duration::from_millis(1)),
            ..ForwarderConfig::default()
        }
    }

    #[tokio::test]
    async fn successful_forward_sends_json() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::path("/alerts"))
            .and(matchers::header("content-type", "application/json"))
            .and(matchers::body_json(json!({"event_id": "abc"})))
            .respond_with(ResponseTemplate::new(202).set_body_string("queued"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let forwarder = Forwarder::new(fast_config(3)).unwrap();
        let url = format!("{}/alerts", mock_server.uri());

        let response = forwarder
            .send(&url, &json!({"event_id": "abc"}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status_code, 202);
        assert_eq!(response.body, "queued");
        assert_eq!(response.attempts, 1);
    }

    #[tokio::test]
    async fn extra_headers_and_user_agent_are_sent() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .and(matchers::header("X-Correlation-ID", "corr-42"))
            .and(matchers::header_exists("user-agent"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let forwarder = Forwarder::new(fast_config(0)).unwrap();
        let headers = HashMap::from([("X-Correlation-ID".to_string(), "corr-42".to_string())]);

        let response = forwarder
            .send(&mock_server.uri(), &json!({}), &headers, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status_code, 200);
    }

    #[tokio::test]
    async fn non_success_status_exhausts_retries() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .expect(3)
            .mount(&mock_server)
            .await;

        let clock = TestClock::new();
        let forwarder = Forwarder::with_clock(fast_config(2), Arc::new(clock.clone())).unwrap();

        let error = forwarder
            .send(&mock_server.uri(), &json!({}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, DeliveryError::RetriesExhausted { status_code: 404, attempts: 3 }));
        assert_eq!(clock.recorded_sleeps().len(), 2);
    }

    #[tokio::test]
    async fn slow_endpoint_maps_to_timeout() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
            .mount(&mock_server)
            .await;

        let config = ForwarderConfig { timeout: Duration::from_millis(100), ..fast_config(0) };
        let forwarder = Forwarder::new(config).unwrap();

        let error = forwarder
            .send(&mock_server.uri(), &json!({}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, DeliveryError::Timeout { timeout_ms: 100 }));
    }

    #[tokio::test]
    async fn unreachable_endpoint_returns_last_transport_error() {
        let clock = TestClock::new();
        let forwarder = Forwarder::with_clock(fast_config(2), Arc::new(clock.clone())).unwrap();

        // Port 9 (discard) is assumed closed on test hosts.
        let error = forwarder
            .send("http://127.0.0.1:9/alerts", &json!({}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(error.is_retryable(), "expected transport error, got {error:?}");
        assert_eq!(clock.recorded_sleeps().len(), 2);
    }

    /// Serves every connection a 2xx status line whose body ends early.
    async fn spawn_truncating_server() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("http://{}/alerts", listener.local_addr().unwrap());
        let connections = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&connections);
        tokio::spawn(async move {
            while let Ok((mut stream, _)) = listener.accept().await {
                counter.fetch_add(1, Ordering::SeqCst);
                read_request(&mut stream).await;
                let _ = stream
                    .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\npartial")
                    .await;
                let _ = stream.shutdown().await;
            }
        });

        (url, connections)
    }

    /// Consumes request headers and a `Content-Length` body.
    async fn read_request(stream: &mut TcpStream) {
        let mut request = Vec::new();
        let mut chunk = [0_u8; 1024];

        loop {
            let Ok(n) = stream.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            request.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&request).to_ascii_lowercase();
            if let Some(header_end) = text.find("\r\n\r\n") {
                let content_length = text[..header_end]
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= header_end + 4 + content_length {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn truncated_success_body_is_retried() {
        let (url, connections) = spawn_truncating_server().await;
        let clock = TestClock::new();
        let forwarder = Forwarder::with_clock(fast_config(2), Arc::new(clock.clone())).unwrap();

        let error = forwarder
            .send(&url, &json!({"event_id": "abc"}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, DeliveryError::Network { .. }), "got {error:?}");
        assert_eq!(connections.load(Ordering::SeqCst), 3);
        assert_eq!(clock.recorded_sleeps().len(), 2);
    }

    #[tokio::test]
    async fn invalid_url_consumes_retry_budget() {
        let clock = TestClock::new();
        let forwarder = Forwarder::with_clock(fast_config(2), Arc::new(clock.clone())).unwrap();

        let error = forwarder
            .send("not a url", &json!({}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(error, DeliveryError::Configuration { .. }), "got {error:?}");
        assert_eq!(clock.recorded_sleeps().len(), 2);
    }

    #[tokio::test]
    async fn already_cancelled_token_makes_no_attempt() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let forwarder = Forwarder::new(fast_config(3)).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let error =
            forwarder.send(&mock_server.uri(), &json!({}), &HashMap::new(), &cancel).await.unwrap_err();

        assert!(matches!(error, DeliveryError::Cancelled));
    }

    #[tokio::test]
    async fn oversized_body_is_truncated() {
        let mock_server = MockServer::start().await;

        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(100 * 1024)))
            .mount(&mock_server)
            .await;

        let forwarder = Forwarder::new(fast_config(0)).unwrap();

        let response = forwarder
            .send(&mock_server.uri(), &json!({}), &HashMap::new(), &CancellationToken::new())
            .await
            .unwrap();

        assert!(response.body.ends_with("... (truncated)"));
        assert!(response.body.len() < 100 * 1024);
    }

    #[test]
    fn default_config_uses_documented_values() {
        let config = ForwarderConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(3));
        assert_eq!(config.retry, RetryPolicy::new(3, Duration::from_millis(500)));
        assert!(config.user_agent.starts_with("event-relay/"));
    }
}
