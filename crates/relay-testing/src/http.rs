//! Recording downstream sink for forwarding tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    time::{Duration, Instant},
};

use serde_json::Value;
use wiremock::{matchers::method, Mock, MockServer, Request, Respond, ResponseTemplate};

/// Path the sink listens on, mirroring the default external endpoint.
pub const SINK_PATH: &str = "/external/alerts";

/// One request observed by the sink.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// When the request arrived.
    pub received_at: Instant,
    /// Parsed JSON body, `Value::Null` if the body was not JSON.
    pub body: Value,
    /// Value of the `X-Correlation-ID` header, if present.
    pub correlation_id: Option<String>,
    /// Status the sink answered with.
    pub status: u16,
}

/// Responds from a scripted status list, then a fallback status.
struct ScriptedResponder {
    statuses: Vec<u16>,
    fallback: u16,
    delay: Option<Duration>,
    next: AtomicUsize,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl Respond for ScriptedResponder {
    fn respond(&self, request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        let status = self.statuses.get(index).copied().unwrap_or(self.fallback);

        let correlation_id = request
            .headers
            .get("x-correlation-id")
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).push(RecordedRequest {
            received_at: Instant::now(),
            body: serde_json::from_slice(&request.body).unwrap_or(Value::Null),
            correlation_id,
            status,
        });

        let response = ResponseTemplate::new(status).set_body_string(format!("status {status}"));
        match self.delay {
            Some(delay) => response.set_delay(delay),
            None => response,
        }
    }
}

/// Wiremock server that records every forwarded event.
pub struct MockSink {
    server: MockServer,
    recorded: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockSink {
    /// Starts a sink that always answers with `status`.
    pub async fn always(status: u16) -> Self {
        Self::start(Vec::new(), status, None).await
    }

    /// Starts a sink answering with `statuses` in order, then `then`.
    pub async fn with_sequence(statuses: impl Into<Vec<u16>>, then: u16) -> Self {
        Self::start(statuses.into(), then, None).await
    }

    /// Starts a sink that answers 200 after `delay`.
    pub async fn slow(delay: Duration) -> Self {
        Self::start(Vec::new(), 200, Some(delay)).await
    }

    async fn start(statuses: Vec<u16>, fallback: u16, delay: Option<Duration>) -> Self {
        let server = MockServer::start().await;
        let recorded = Arc::new(Mutex::new(Vec::new()));

        Mock::given(method("POST"))
            .respond_with(ScriptedResponder {
                statuses,
                fallback,
                delay,
                next: AtomicUsize::new(0),
                recorded: Arc::clone(&recorded),
            })
            .mount(&server)
            .await;

        Self { server, recorded }
    }

    /// Full URL events should be forwarded to.
    pub fn url(&self) -> String {
        format!("{}{SINK_PATH}", self.server.uri())
    }

    /// Snapshot of every request received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of requests received so far.
    pub fn request_count(&self) -> usize {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Distinct `event_id` values among received bodies.
    pub fn distinct_event_ids(&self) -> HashSet<String> {
        self.requests()
            .iter()
            .filter_map(|r| r.body.get("event_id").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Gaps between consecutive request arrivals.
    pub fn arrival_gaps(&self) -> Vec<Duration> {
        let requests = self.requests();
        requests.windows(2).map(|w| w[1].received_at.duration_since(w[0].received_at)).collect()
    }

    /// Polls until at least `count` requests arrived or `timeout` elapsed.
    ///
    /// Returns whether the count was reached.
    pub async fn wait_for_requests(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.request_count() >= count {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.request_count() >= count
    }
}
