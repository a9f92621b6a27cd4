// Scripted transport for testing

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream;
use http::header::{CONTENT_TYPE, HeaderName, HeaderValue};
use http::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use url::Url;
use wirebind_client::{
    RawResponse, ResponseBody, Transport, TransportError, TransportErrorKind, TransportRequest,
};

/// A canned response.
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    body_error: Option<TransportError>,
}

impl MockResponse {
    /// Create an empty response with the given status.
    pub fn new(status: u16) -> Self {
        Self {
            status: StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            headers: HeaderMap::new(),
            body: Bytes::new(),
            body_error: None,
        }
    }

    /// Create a JSON response.
    pub fn json(status: u16, body: Value) -> Self {
        Self::new(status)
            .header(CONTENT_TYPE.as_str(), "application/json")
            .body(body.to_string())
    }

    /// Set a header. Invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Set the raw body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Fail the body stream after the body bytes were delivered.
    pub fn fail_body(mut self, error: TransportError) -> Self {
        self.body_error = Some(error);
        self
    }

    fn into_raw(self) -> RawResponse {
        let mut chunks = vec![Ok(self.body)];
        if let Some(error) = self.body_error {
            chunks.push(Err(error));
        }
        RawResponse::new(
            self.status,
            self.headers,
            ResponseBody::from_stream(stream::iter(chunks)),
        )
    }
}

#[derive(Debug)]
enum Reply {
    Response(MockResponse),
    Error(TransportError),
    Hang,
}

/// A request seen by [`MockTransport`].
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// HTTP method.
    pub method: Method,
    /// Full URL.
    pub url: Url,
    /// Request headers.
    pub headers: HeaderMap,
    /// Request body.
    pub body: Option<Bytes>,
    /// When the request was sent (tokio clock).
    pub sent_at: Instant,
}

impl RecordedRequest {
    /// The URL path.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// First value of a query parameter.
    pub fn query(&self, key: &str) -> Option<String> {
        self.url
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    /// A header value as a string.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// The body parsed as JSON.
    pub fn body_json(&self) -> Option<Value> {
        self.body
            .as_ref()
            .and_then(|body| serde_json::from_slice(body).ok())
    }
}

#[derive(Debug, Default)]
struct State {
    replies: VecDeque<Reply>,
    requests: Vec<RecordedRequest>,
}

/// A [`Transport`] replaying queued replies in order and recording every
/// request.
///
/// Clones share the same script. When the script runs out, requests fail
/// with a non-transient transport error.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    /// Create a transport with an empty script.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn push_response(&self, response: MockResponse) -> &Self {
        self.state.lock().replies.push_back(Reply::Response(response));
        self
    }

    /// Queue a JSON response.
    pub fn push_json(&self, status: u16, body: Value) -> &Self {
        self.push_response(MockResponse::json(status, body))
    }

    /// Queue a transport error.
    pub fn push_error(&self, error: TransportError) -> &Self {
        self.state.lock().replies.push_back(Reply::Error(error));
        self
    }

    /// Queue a call that never completes.
    pub fn push_hang(&self) -> &Self {
        self.state.lock().replies.push_back(Reply::Hang);
        self
    }

    /// All requests seen so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.lock().requests.clone()
    }

    /// The most recent request.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.state.lock().requests.last().cloned()
    }

    /// Number of requests seen so far.
    pub fn call_count(&self) -> usize {
        self.state.lock().requests.len()
    }

    /// Number of queued replies not yet consumed.
    pub fn remaining(&self) -> usize {
        self.state.lock().replies.len()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: TransportRequest) -> Result<RawResponse, TransportError> {
        let reply = {
            let mut state = self.state.lock();
            state.requests.push(RecordedRequest {
                method: request.method,
                url: request.url,
                headers: request.headers,
                body: request.body,
                sent_at: Instant::now(),
            });
            state.replies.pop_front()
        };

        match reply {
            Some(Reply::Response(response)) => Ok(response.into_raw()),
            Some(Reply::Error(error)) => Err(error),
            Some(Reply::Hang) => std::future::pending().await,
            None => Err(TransportError::new(
                TransportErrorKind::Other,
                "no scripted response left",
            )),
        }
    }
}
