use std::collections::{BTreeMap, VecDeque};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use futures::{Future, Stream};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT};
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, instrument};

use chathistory_core::backend::{Fragment, FragmentStream, GenerationBackend, GenerationRequest};
use chathistory_core::errors::BackendError;

use crate::sse::{self, ChunkEvent, LineDecoder};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const SSE_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

/// Streaming client for OpenAI-compatible `/chat/completions` endpoints.
pub struct OpenAiChatBackend {
    client: Client,
    url: String,
    headers: HeaderMap,
    idle_timeout: Duration,
}

impl OpenAiChatBackend {
    pub fn new(url: impl Into<String>, headers: &BTreeMap<String, String>) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| BackendError::InvalidRequest(format!("failed to build HTTP client: {e}")))?;

        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| BackendError::InvalidRequest(format!("header name {name:?}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| BackendError::InvalidRequest(format!("header {name}: {e}")))?;
            header_map.insert(name, value);
        }

        Ok(Self {
            client,
            url: url.into(),
            headers: header_map,
            idle_timeout: SSE_IDLE_TIMEOUT,
        })
    }

    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    fn request_body(request: &GenerationRequest) -> Result<Value, BackendError> {
        let mut body = serde_json::to_value(request)
            .map_err(|e| BackendError::InvalidRequest(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("stream".into(), Value::Bool(true));
        }
        Ok(body)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiChatBackend {
    fn name(&self) -> &str {
        "openai-chat"
    }

    #[instrument(skip(self, request), fields(url = %self.url, messages = request.messages.len()))]
    async fn generate(&self, request: &GenerationRequest) -> Result<FragmentStream, BackendError> {
        let body = Self::request_body(request)?;

        let resp = self
            .client
            .post(&self.url)
            .headers(self.headers.clone())
            .header(ACCEPT, "text/event-stream")
            .json(&body)
            .send()
            .await
            .map_err(|e| BackendError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(BackendError::Status { status, body });
        }
        debug!(status = resp.status().as_u16(), "stream opened");

        let stream = SseStream::with_idle_timeout(resp.bytes_stream(), self.idle_timeout);
        Ok(Box::pin(stream))
    }
}

/// Wraps a byte stream from reqwest and yields fragments.
/// If no data arrives within `idle_duration`, yields an error and ends.
struct SseStream {
    inner: Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>,
    decoder: LineDecoder,
    pending: VecDeque<Result<Fragment, BackendError>>,
    finished: bool,
    idle_deadline: Pin<Box<tokio::time::Sleep>>,
    idle_duration: Duration,
}

impl SseStream {
    fn with_idle_timeout(
        byte_stream: impl Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            inner: Box::pin(byte_stream),
            decoder: LineDecoder::new(),
            pending: VecDeque::new(),
            finished: false,
            idle_deadline: Box::pin(tokio::time::sleep(idle_timeout)),
            idle_duration: idle_timeout,
        }
    }

    /// Queue the fragments of `lines`; stops at the first terminal event.
    fn absorb(&mut self, lines: Result<Vec<String>, BackendError>) {
        let lines = match lines {
            Ok(lines) => lines,
            Err(e) => return self.fail(e),
        };
        for line in lines {
            match sse::parse_line(&line) {
                Ok(None) => {}
                Ok(Some(ChunkEvent::Done)) => {
                    self.finished = true;
                }
                Ok(Some(ChunkEvent::Delta { fragment, finished })) => {
                    if fragment != Fragment::default() {
                        self.pending.push_back(Ok(fragment));
                    }
                    self.finished = finished;
                }
                Err(e) => self.fail(e),
            }
            if self.finished {
                return;
            }
        }
    }

    fn fail(&mut self, error: BackendError) {
        self.pending.push_back(Err(error));
        self.finished = true;
    }
}

impl Stream for SseStream {
    type Item = Result<Fragment, BackendError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if let Some(item) = self.pending.pop_front() {
                return Poll::Ready(Some(item));
            }
            if self.finished {
                return Poll::Ready(None);
            }

            match self.inner.as_mut().poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => {
                    let new_deadline = tokio::time::Instant::now() + self.idle_duration;
                    self.idle_deadline.as_mut().reset(new_deadline);
                    let lines = self.decoder.push(&bytes);
                    self.absorb(lines);
                }
                Poll::Ready(Some(Err(e))) => {
                    self.fail(BackendError::StreamInterrupted(e.to_string()));
                }
                Poll::Ready(None) => {
                    let tail = self.decoder.finish().map(|line| line.into_iter().collect());
                    self.absorb(tail);
                    self.finished = true;
                }
                Poll::Pending => {
                    if self.idle_deadline.as_mut().poll(cx).is_ready() {
                        let secs = self.idle_duration.as_secs();
                        self.fail(BackendError::StreamInterrupted(format!(
                            "idle timeout after {secs}s"
                        )));
                        continue;
                    }
                    return Poll::Pending;
                }
            }
        }
    }
}
