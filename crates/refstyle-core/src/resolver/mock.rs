//! Mock link resolver for testing.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::LinkResolver;
use crate::links::LinkKind;
use crate::rate_limit::LinkQueryError;

/// A configurable mock response for [`MockResolver`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Respond with this HTTP status.
    Status(u16),
    /// Simulate a 429 rate-limit response.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate a transport error.
    Error(String),
}

/// A hand-rolled mock implementing [`LinkResolver`] for tests.
///
/// Supports a fixed response or a sequence (last one repeated), optional
/// per-call latency, call counting and a record of requested targets.
pub struct MockResolver {
    /// Each call pops the next response; falls back when exhausted.
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    targets: Mutex<Vec<String>>,
}

impl MockResolver {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses
            .first()
            .cloned()
            .unwrap_or(MockResponse::Status(200));
        Self {
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            call_count: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `resolve()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Targets requested so far, in call order.
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().map(|t| t.clone()).unwrap_or_default()
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap_or_else(|e| e.into_inner());
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl LinkResolver for MockResolver {
    fn name(&self) -> &str {
        "mock"
    }

    fn resolve<'a>(
        &'a self,
        target: &'a str,
        _kind: LinkKind,
        _timeout: Duration,
    ) -> Pin<Box<dyn Future<Output = Result<u16, LinkQueryError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut targets) = self.targets.lock() {
            targets.push(target.to_string());
        }
        let response = self.next_response();
        let delay = self.delay;

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Status(code) => Ok(code),
                MockResponse::RateLimited { retry_after } => {
                    Err(LinkQueryError::RateLimited { retry_after })
                }
                MockResponse::Error(msg) => Err(LinkQueryError::Other(msg)),
            }
        })
    }
}
