//! Scripted [`HttpTransport`] that replays canned responses.

use crate::errors::TransportError;
use crate::transport::{HttpRequest, HttpResponse, HttpTransport};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// One canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    /// Status code.
    pub status: u16,
    /// Headers by name.
    pub headers: HashMap<String, String>,
    /// Body.
    pub body: Bytes,
}

impl MockResponse {
    /// 200 with no body.
    pub fn ok() -> Self {
        Self::with_status(200, Bytes::new())
    }

    /// 200 with `body`.
    pub fn ok_with_body(body: impl Into<Bytes>) -> Self {
        Self::with_status(200, body)
    }

    /// `status` with a JSON body.
    pub fn json(status: u16, value: &serde_json::Value) -> Self {
        Self::with_status(status, value.to_string()).with_header("content-type", "application/json")
    }

    /// 202, as Graph answers intermediate upload blocks.
    pub fn accepted() -> Self {
        Self::with_status(202, r#"{"nextExpectedRanges":[]}"#)
    }

    /// 204, as Graph answers deletes.
    pub fn no_content() -> Self {
        Self::with_status(204, Bytes::new())
    }

    /// `status` with `body`.
    pub fn with_status(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HashMap::new(),
            body: body.into(),
        }
    }

    /// A failure status with `body`, typically a Graph error object.
    pub fn error(status: u16, body: impl Into<Bytes>) -> Self {
        Self::with_status(status, body)
    }

    /// Adds a header.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    fn into_http_response(self) -> HttpResponse {
        let headers: HeaderMap = self
            .headers
            .iter()
            .filter_map(|(key, value)| {
                let name = HeaderName::from_bytes(key.as_bytes()).ok()?;
                let value = HeaderValue::from_str(value).ok()?;
                Some((name, value))
            })
            .collect();
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        HttpResponse::new(status, headers, self.body)
    }
}

/// Collects responses for a [`MockTransport`].
#[derive(Default)]
pub struct MockResponseBuilder {
    responses: Vec<MockResponse>,
}

impl MockResponseBuilder {
    /// Empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `response` to the script.
    pub fn respond(mut self, response: MockResponse) -> Self {
        self.responses.push(response);
        self
    }

    /// The transport that plays the script.
    pub fn build(self) -> MockTransport {
        MockTransport::with_responses(self.responses)
    }
}

#[derive(Default)]
struct Script {
    queue: VecDeque<MockResponse>,
    fallback: Option<MockResponse>,
    recorded: Vec<HttpRequest>,
}

/// Transport that answers from a queue and records every request.
///
/// Once the queue is empty it answers with the fallback response, or with
/// [`TransportError::Network`] when there is none.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<Script>,
}

impl MockTransport {
    /// A transport with nothing queued.
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport answering with `responses` in order.
    pub fn with_responses(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Mutex::new(Script {
                queue: responses.into(),
                ..Script::default()
            }),
        }
    }

    /// A transport answering every request with `response`.
    pub fn with_default(response: MockResponse) -> Self {
        Self {
            script: Mutex::new(Script {
                fallback: Some(response),
                ..Script::default()
            }),
        }
    }

    /// Starts a scripted transport.
    pub fn builder() -> MockResponseBuilder {
        MockResponseBuilder::new()
    }

    /// Appends a response to the queue.
    pub fn queue_response(&self, response: MockResponse) {
        self.script().queue.push_back(response);
    }

    /// Every request seen so far, oldest first.
    pub fn requests(&self) -> Vec<HttpRequest> {
        self.script().recorded.clone()
    }

    /// Number of requests seen.
    pub fn request_count(&self) -> usize {
        self.script().recorded.len()
    }

    /// Most recent request.
    pub fn last_request(&self) -> Option<HttpRequest> {
        self.script().recorded.last().cloned()
    }

    /// Forgets recorded requests; the queue is kept.
    pub fn clear_requests(&self) {
        self.script().recorded.clear();
    }

    fn script(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut script = self.script();
        script.recorded.push(request);

        script
            .queue
            .pop_front()
            .or_else(|| script.fallback.clone())
            .map(MockResponse::into_http_response)
            .ok_or_else(|| TransportError::Network("No mock response available".to_string()))
    }
}

impl std::fmt::Debug for MockTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let script = self.script();
        f.debug_struct("MockTransport")
            .field("queued", &script.queue.len())
            .field("recorded", &script.recorded.len())
            .finish()
    }
}
