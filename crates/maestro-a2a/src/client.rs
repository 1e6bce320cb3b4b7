use crate::protocol::{
    classify_result, JsonRpcRequest, JsonRpcResponse, MessageSendParams, WireMessage,
    WorkerEvent, METHOD_SEND, METHOD_STREAM,
};
use crate::registry::WorkerDescriptor;
use async_trait::async_trait;
use futures_util::stream::{self, BoxStream};
use futures_util::{Stream, StreamExt};
use maestro_core::{strip_code_fences, MaestroError, MaestroResult, Message, Part};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};

/// Per-call timeout used when none is configured.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Sends one message to a worker and returns the worker's final message.
///
/// Every call is a fresh conversation: no task or context id is carried over
/// between calls.
#[async_trait]
pub trait WorkerClient: Send + Sync {
    /// Send `message` to `worker` and return its final reply.
    async fn send(&self, worker: &WorkerDescriptor, message: Message) -> MaestroResult<Message>;
}

/// A2A client over HTTP JSON-RPC.
///
/// Uses `message/stream` for workers that advertise streaming and
/// `message/send` otherwise. Both paths feed the same fold, so callers see the
/// same result either way.
#[derive(Clone)]
pub struct HttpWorkerClient {
    http: reqwest::Client,
}

impl HttpWorkerClient {
    /// Client with a per-request timeout.
    pub fn new(timeout: Duration) -> MaestroResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MaestroError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http })
    }

    /// Wrap an already configured `reqwest` client.
    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl WorkerClient for HttpWorkerClient {
    async fn send(&self, worker: &WorkerDescriptor, message: Message) -> MaestroResult<Message> {
        let method = if worker.streaming {
            METHOD_STREAM
        } else {
            METHOD_SEND
        };
        let params = serde_json::to_value(MessageSendParams {
            message: WireMessage::from_message(&message),
            metadata: None,
        })?;
        let request = JsonRpcRequest::new(method, params);

        debug!(worker = %worker.name, method, "Sending message to worker");

        let mut builder = self.http.post(worker.endpoint()).json(&request);
        if worker.streaming {
            builder = builder.header(ACCEPT, "text/event-stream");
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| transport_error(&worker.name, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(MaestroError::Transport(format!(
                "worker '{}' returned HTTP {}: {}",
                worker.name, status, body
            )));
        }

        let is_event_stream = resp
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_event_stream {
            collect_final(&worker.name, sse_events(resp)).await
        } else {
            let body = resp
                .text()
                .await
                .map_err(|e| transport_error(&worker.name, e))?;
            let event = decode_event(&body);
            collect_final(&worker.name, stream::once(async move { event })).await
        }
    }
}

fn transport_error(worker: &str, e: reqwest::Error) -> MaestroError {
    if e.is_timeout() {
        MaestroError::Transport(format!("worker '{worker}' timed out: {e}"))
    } else {
        MaestroError::Transport(format!("worker '{worker}' unreachable: {e}"))
    }
}

/// Decode one JSON-RPC response document into a worker event.
fn decode_event(data: &str) -> MaestroResult<WorkerEvent> {
    let response: JsonRpcResponse = serde_json::from_str(data)
        .map_err(|e| MaestroError::Protocol(format!("malformed JSON-RPC response: {e}")))?;
    classify_result(&response.into_result()?)
}

/// Fold a worker's event stream down to its final message.
///
/// The last final event wins; intermediate events are discarded. A stream
/// with no final event is an `EmptyResponse`. The first error ends the fold.
/// Fenced text parts are unwrapped.
pub async fn collect_final<S>(worker: &str, events: S) -> MaestroResult<Message>
where
    S: Stream<Item = MaestroResult<WorkerEvent>>,
{
    futures_util::pin_mut!(events);
    let mut last = None;

    while let Some(event) = events.next().await {
        match event? {
            WorkerEvent::Final(message) => last = Some(message),
            WorkerEvent::Intermediate { kind, state } => {
                if state.as_deref() == Some("failed") {
                    warn!(worker, kind = %kind, "Worker reported a failed task");
                } else {
                    debug!(worker, kind = %kind, state = ?state, "Skipping intermediate event");
                }
            }
        }
    }

    last.map(normalize_fences)
        .ok_or_else(|| MaestroError::EmptyResponse(worker.to_string()))
}

fn normalize_fences(message: Message) -> Message {
    let parts = message
        .parts
        .into_iter()
        .map(|part| {
            if part.text.trim_start().starts_with("```") {
                Part::text(strip_code_fences(&part.text))
            } else {
                part
            }
        })
        .collect();
    Message::new(message.role, parts)
}

/// Turn an SSE response body into a stream of worker events.
fn sse_events(resp: reqwest::Response) -> impl Stream<Item = MaestroResult<WorkerEvent>> + Send {
    struct State {
        bytes: BoxStream<'static, reqwest::Result<Vec<u8>>>,
        decoder: SseDecoder,
        pending: VecDeque<MaestroResult<WorkerEvent>>,
        done: bool,
    }

    let state = State {
        bytes: resp.bytes_stream().map(|r| r.map(|b| b.to_vec())).boxed(),
        decoder: SseDecoder::default(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }
            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    for data in state.decoder.push(&chunk) {
                        state.pending.push_back(decode_event(&data));
                    }
                }
                Some(Err(e)) => {
                    state.pending.push_back(Err(MaestroError::Transport(format!(
                        "stream read error: {e}"
                    ))));
                    state.done = true;
                }
                None => {
                    if let Some(data) = state.decoder.finish() {
                        state.pending.push_back(decode_event(&data));
                    }
                    state.done = true;
                }
            }
        }
    })
}

/// Incremental `text/event-stream` decoder.
///
/// Bytes go in as they arrive; the `data` payload of each complete event
/// comes out. Multi-line `data` fields are joined with `\n`. Comments and
/// other fields are ignored.
#[derive(Debug, Default)]
pub(crate) struct SseDecoder {
    buffer: Vec<u8>,
    data: Vec<String>,
}

impl SseDecoder {
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(line_end) = self.buffer.iter().position(|b| *b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=line_end).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim_end_matches(['\n', '\r']);
            if let Some(event) = self.process_line(line) {
                events.push(event);
            }
        }
        events
    }

    /// Flush at end of stream: a trailing line without newline and any
    /// undispatched data still count.
    pub(crate) fn finish(&mut self) -> Option<String> {
        if !self.buffer.is_empty() {
            let raw = std::mem::take(&mut self.buffer);
            let line = String::from_utf8_lossy(&raw).trim_end_matches('\r').to_string();
            if let Some(event) = self.process_line(&line) {
                return Some(event);
            }
        }
        self.dispatch()
    }

    fn process_line(&mut self, line: &str) -> Option<String> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(value) = line.strip_prefix("data:") {
            self.data
                .push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
        None
    }

    fn dispatch(&mut self) -> Option<String> {
        if self.data.is_empty() {
            return None;
        }
        let event = self.data.join("\n");
        self.data.clear();
        Some(event)
    }
}
