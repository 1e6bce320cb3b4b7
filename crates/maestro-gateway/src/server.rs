use crate::handler::AgentHandler;
use axum::{
    body::Bytes,
    extract::State,
    response::{
        sse::{Event as SseEvent, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use maestro_a2a::protocol::{
    error_codes, AgentCard, JsonRpcError, JsonRpcRequest, JsonRpcResponse, MessageSendParams,
    WireMessage, WireStatusUpdate, WireTask, AGENT_CARD_PATH, METHOD_CANCEL, METHOD_SEND,
    METHOD_STREAM,
};
use maestro_core::{EventSink, MaestroResult, Message, TaskEvent, TaskLifecycle, TaskState};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

struct ServerState {
    card: AgentCard,
    handler: Arc<dyn AgentHandler>,
}

/// Hosts one [`AgentHandler`] over A2A.
///
/// Routes:
/// - `GET /.well-known/agent.json`: the agent card
/// - `POST /`: JSON-RPC (`message/send`, `message/stream`, `tasks/cancel`)
/// - `GET /health`
///
/// Every inbound message runs under its own task lifecycle. A message that
/// names an existing `taskId` continues that task and does not re-emit
/// `submitted`.
pub struct A2aServer {
    state: Arc<ServerState>,
}

impl A2aServer {
    /// Serve `handler` under `card`.
    pub fn new(card: AgentCard, handler: Arc<dyn AgentHandler>) -> Self {
        Self {
            state: Arc::new(ServerState { card, handler }),
        }
    }

    /// The axum router for this agent.
    pub fn router(&self) -> Router {
        Router::new()
            .route(AGENT_CARD_PATH, get(card_handler))
            .route("/", post(rpc_handler))
            .route("/health", get(health_handler))
            .with_state(self.state.clone())
    }

    /// Serve until the listener fails.
    pub async fn serve(self, listener: TcpListener) -> MaestroResult<()> {
        let addr = listener.local_addr()?;
        info!(agent = %self.state.card.name, addr = %addr, "A2A server listening");
        axum::serve(listener, self.router()).await?;
        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok", "agent": state.card.name}))
}

async fn card_handler(State(state): State<Arc<ServerState>>) -> Json<AgentCard> {
    Json(state.card.clone())
}

async fn rpc_handler(State(state): State<Arc<ServerState>>, body: Bytes) -> Response {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            return rpc_error(Value::Null, error_codes::PARSE_ERROR, format!("Parse error: {e}"))
        }
    };
    let id = value.get("id").cloned().unwrap_or(Value::Null);

    let request: JsonRpcRequest = match serde_json::from_value::<JsonRpcRequest>(value) {
        Ok(r) if r.jsonrpc == "2.0" => r,
        _ => return rpc_error(id, error_codes::INVALID_REQUEST, "Invalid JSON-RPC request"),
    };

    debug!(method = %request.method, "JSON-RPC request");

    match request.method.as_str() {
        METHOD_SEND | METHOD_STREAM => {
            let params: MessageSendParams = match serde_json::from_value(request.params) {
                Ok(p) => p,
                Err(e) => {
                    return rpc_error(
                        request.id,
                        error_codes::INVALID_PARAMS,
                        format!("Invalid params: {e}"),
                    )
                }
            };
            if request.method == METHOD_SEND {
                send_message(state, request.id, params.message).await
            } else {
                stream_message(state, request.id, params.message)
            }
        }
        METHOD_CANCEL => rpc_error(
            request.id,
            error_codes::UNSUPPORTED_OPERATION,
            "Task cancellation is not supported",
        ),
        other => rpc_error(
            request.id,
            error_codes::METHOD_NOT_FOUND,
            format!("Method not found: {other}"),
        ),
    }
}

fn rpc_error(id: Value, code: i64, message: impl Into<String>) -> Response {
    Json(JsonRpcResponse::failure(id, JsonRpcError::new(code, message))).into_response()
}

/// Open the task for an inbound message: continue it if the message names
/// a task, otherwise submit a new one.
fn open_task(message: &WireMessage, sinks: Vec<EventSink>) -> TaskLifecycle {
    let context_id = message
        .context_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    match &message.task_id {
        Some(task_id) => {
            debug!(task_id = %task_id, "Continuing existing task");
            TaskLifecycle::resume(task_id.clone(), context_id, sinks)
        }
        None => TaskLifecycle::submit(None, context_id, sinks),
    }
}

async fn run_handler(
    state: &ServerState,
    lifecycle: &mut TaskLifecycle,
    input: Message,
) -> MaestroResult<Message> {
    lifecycle.start()?;
    match state.handler.handle(input).await {
        Ok(reply) => {
            lifecycle.succeed(reply.clone())?;
            Ok(reply)
        }
        Err(e) => {
            warn!(task_id = %lifecycle.id(), error = %e, "Handler failed");
            lifecycle.fail(e.to_string())?;
            Err(e)
        }
    }
}

/// `message/send`: the terminal task as the result, or an internal error
/// carrying the failed task.
async fn send_message(state: Arc<ServerState>, id: Value, message: WireMessage) -> Response {
    let mut lifecycle = open_task(&message, Vec::new());
    let outcome = run_handler(&state, &mut lifecycle, message.to_message()).await;
    let task = serde_json::to_value(WireTask::from_task(lifecycle.task())).unwrap_or(Value::Null);

    match outcome {
        Ok(_) => Json(JsonRpcResponse::success(id, task)).into_response(),
        Err(e) => {
            let mut error = JsonRpcError::new(error_codes::INTERNAL_ERROR, e.to_string());
            error.data = Some(task);
            Json(JsonRpcResponse::failure(id, error)).into_response()
        }
    }
}

/// `message/stream`: every task event as a `status-update`, with the reply
/// `message` sent just before the final `completed` update.
fn stream_message(state: Arc<ServerState>, id: Value, message: WireMessage) -> Response {
    let (tx, rx) = mpsc::unbounded_channel::<TaskEvent>();
    let mut lifecycle = open_task(&message, vec![tx]);
    let input = message.to_message();

    tokio::spawn(async move {
        // The stream ends when the lifecycle, and with it the sender, is dropped.
        let _ = run_handler(&state, &mut lifecycle, input).await;
    });

    let frames = UnboundedReceiverStream::new(rx)
        .flat_map(move |event| stream::iter(sse_frames(&id, &event)));

    Sse::new(frames).keep_alive(KeepAlive::default()).into_response()
}

fn sse_frames(id: &Value, event: &TaskEvent) -> Vec<Result<SseEvent, Infallible>> {
    let mut results = Vec::with_capacity(2);

    let mut update = WireStatusUpdate::from(event);
    match event.state {
        TaskState::Completed => {
            if let Some(reply) = update.status.message.take() {
                results.push(serde_json::to_value(reply));
            }
        }
        TaskState::Failed => {
            if let Some(reason) = &event.error {
                update.status.message = Some(
                    WireMessage::from_message(&Message::agent(reason.clone()))
                        .with_task(event.task_id.clone(), event.context_id.clone()),
                );
            }
        }
        TaskState::Submitted | TaskState::Working => {}
    }
    results.push(serde_json::to_value(update));

    results
        .into_iter()
        .filter_map(|result| match result {
            Ok(value) => SseEvent::default()
                .json_data(JsonRpcResponse::success(id.clone(), value))
                .ok(),
            Err(e) => {
                warn!(error = %e, "Dropping unserializable stream event");
                None
            }
        })
        .map(Ok)
        .collect()
}
