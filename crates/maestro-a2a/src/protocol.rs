//! A2A wire types: agent card document, JSON-RPC 2.0 envelope, message and
//! task shapes, and the classification of response events.

use chrono::{DateTime, Utc};
use maestro_core::{MaestroError, MaestroResult, Message, Part, Role, Task, TaskEvent, TaskState};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Well-known path of the agent card document.
pub const AGENT_CARD_PATH: &str = "/.well-known/agent.json";
/// Blocking send: one JSON-RPC response.
pub const METHOD_SEND: &str = "message/send";
/// Streaming send: a server-sent event stream of JSON-RPC responses.
pub const METHOD_STREAM: &str = "message/stream";
/// Task cancellation (always answered with an error by Maestro).
pub const METHOD_CANCEL: &str = "tasks/cancel";

/// JSON-RPC 2.0 and A2A error codes.
pub mod error_codes {
    /// Invalid JSON was received.
    pub const PARSE_ERROR: i64 = -32700;
    /// The JSON is not a valid request object.
    pub const INVALID_REQUEST: i64 = -32600;
    /// The method does not exist.
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid method parameters.
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error while handling the request.
    pub const INTERNAL_ERROR: i64 = -32603;
    /// The task cannot be canceled.
    pub const TASK_NOT_CANCELABLE: i64 = -32002;
    /// The operation is not supported.
    pub const UNSUPPORTED_OPERATION: i64 = -32004;
}

// ---------------------------------------------------------------------------
// Agent card
// ---------------------------------------------------------------------------

/// The descriptor document a worker publishes at [`AGENT_CARD_PATH`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Display name of the agent.
    pub name: String,
    /// What the agent does.
    #[serde(default)]
    pub description: String,
    /// JSON-RPC endpoint.
    pub url: String,
    /// Agent version string.
    #[serde(default)]
    pub version: String,
    /// Accepted input media types.
    #[serde(default)]
    pub default_input_modes: Vec<String>,
    /// Produced output media types.
    #[serde(default)]
    pub default_output_modes: Vec<String>,
    /// Advertised skills.
    #[serde(default)]
    pub skills: Vec<AgentSkill>,
    /// Optional protocol features.
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

impl AgentCard {
    /// A text-in, text-out card with streaming enabled and no skills.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            url: url.into(),
            version: "1.0.0".to_string(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            skills: Vec::new(),
            capabilities: AgentCapabilities {
                streaming: true,
                push_notifications: false,
            },
        }
    }

    /// Adds a skill to the card.
    pub fn with_skill(mut self, skill: AgentSkill) -> Self {
        self.skills.push(skill);
        self
    }
}

/// Feature flags advertised by a worker. An empty object is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Accepts `message/stream`.
    #[serde(default)]
    pub streaming: bool,
    /// Supports push notifications.
    #[serde(default)]
    pub push_notifications: bool,
}

/// A skill entry of an agent card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSkill {
    /// Stable skill identifier.
    pub id: String,
    /// Human-readable skill name.
    pub name: String,
    /// What the skill does.
    #[serde(default)]
    pub description: String,
    /// Free-form labels.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Some workers publish structured examples; those are kept as JSON text.
    #[serde(default, deserialize_with = "lenient_strings")]
    pub examples: Vec<String>,
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(values
        .into_iter()
        .map(|v| match v {
            Value::String(s) => s,
            other => other.to_string(),
        })
        .collect())
}

// ---------------------------------------------------------------------------
// JSON-RPC envelope
// ---------------------------------------------------------------------------

/// JSON-RPC 2.0 request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// Protocol version, always `2.0`.
    pub jsonrpc: String,
    /// Request id echoed in the response.
    #[serde(default)]
    pub id: Value,
    /// Method name.
    pub method: String,
    /// Method parameters.
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Build a request with a fresh string id.
    pub fn new(method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Value::String(Uuid::new_v4().to_string()),
            method: method.into(),
            params,
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcResponse {
    /// Protocol version, always `2.0`.
    pub jsonrpc: String,
    /// Id of the request being answered.
    #[serde(default)]
    pub id: Value,
    /// Set on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Set on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// A successful response.
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// An error response.
    pub fn failure(id: Value, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Unwrap the `result` member. An `error` member or a missing result is a
    /// protocol violation from the caller's point of view.
    pub fn into_result(self) -> MaestroResult<Value> {
        if let Some(err) = self.error {
            return Err(MaestroError::Protocol(format!(
                "worker returned error {}: {}",
                err.code, err.message
            )));
        }
        self.result
            .ok_or_else(|| MaestroError::Protocol("response carries neither result nor error".into()))
    }
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code (see [`error_codes`]).
    pub code: i64,
    /// Short description.
    pub message: String,
    /// Additional error payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// An error without data.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Messages, artifacts and tasks
// ---------------------------------------------------------------------------

fn text_kind() -> String {
    "text".to_string()
}

fn message_kind() -> String {
    "message".to_string()
}

fn task_kind() -> String {
    "task".to_string()
}

fn status_update_kind() -> String {
    "status-update".to_string()
}

/// A text part on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WirePart {
    /// Part kind, `text` for everything Maestro produces.
    #[serde(default = "text_kind")]
    pub kind: String,
    /// Text content.
    #[serde(default)]
    pub text: String,
}

impl From<&Part> for WirePart {
    fn from(part: &Part) -> Self {
        Self {
            kind: text_kind(),
            text: part.text.clone(),
        }
    }
}

/// A message on the wire, as sent in `message/send` params.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMessage {
    /// Author of the message.
    pub role: Role,
    /// Unique message id.
    #[serde(default)]
    pub message_id: String,
    /// Content parts.
    pub parts: Vec<WirePart>,
    /// Always `message`.
    #[serde(default = "message_kind")]
    pub kind: String,
    /// Task the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Conversation the message belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl WireMessage {
    /// Wrap a domain message with a fresh message id.
    pub fn from_message(message: &Message) -> Self {
        Self {
            role: message.role,
            message_id: Uuid::new_v4().to_string(),
            parts: message.parts.iter().map(WirePart::from).collect(),
            kind: message_kind(),
            task_id: None,
            context_id: None,
        }
    }

    /// Tags the message with a task and context.
    pub fn with_task(mut self, task_id: impl Into<String>, context_id: impl Into<String>) -> Self {
        self.task_id = Some(task_id.into());
        self.context_id = Some(context_id.into());
        self
    }

    /// The domain message. Non-text parts are skipped.
    pub fn to_message(&self) -> Message {
        Message::new(
            self.role,
            self.parts
                .iter()
                .filter(|p| p.kind == "text")
                .map(|p| Part::text(p.text.clone()))
                .collect(),
        )
    }
}

/// Params of `message/send` and `message/stream`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageSendParams {
    /// The message to deliver.
    pub message: WireMessage,
    /// Opaque request metadata.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// An output artifact of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireArtifact {
    /// Unique artifact id.
    pub artifact_id: String,
    /// Optional artifact name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Artifact content.
    pub parts: Vec<WirePart>,
}

/// Task status on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTaskStatus {
    /// Current state.
    pub state: TaskState,
    /// Status message, e.g. the failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<WireMessage>,
    /// When the state was entered.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// A task result, as returned by `message/send`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireTask {
    /// Task id.
    pub id: String,
    /// Conversation id.
    pub context_id: String,
    /// Always `task`.
    #[serde(default = "task_kind")]
    pub kind: String,
    /// Current status.
    pub status: WireTaskStatus,
    /// Task outputs.
    #[serde(default)]
    pub artifacts: Vec<WireArtifact>,
    /// Messages exchanged so far.
    #[serde(default)]
    pub history: Vec<WireMessage>,
}

impl WireTask {
    /// Wire view of a task record. A completed result becomes a single artifact;
    /// a failure reason becomes the status message.
    pub fn from_task(task: &Task) -> Self {
        let artifacts = task
            .result
            .iter()
            .map(|result| WireArtifact {
                artifact_id: Uuid::new_v4().to_string(),
                name: Some("result".to_string()),
                parts: result.parts.iter().map(WirePart::from).collect(),
            })
            .collect();

        let message = task.error.as_ref().map(|reason| {
            WireMessage::from_message(&Message::agent(reason.clone()))
                .with_task(task.id.clone(), task.context_id.clone())
        });

        Self {
            id: task.id.clone(),
            context_id: task.context_id.clone(),
            kind: task_kind(),
            status: WireTaskStatus {
                state: task.state,
                message,
                timestamp: task.history.last().map(|e| e.timestamp),
            },
            artifacts,
            history: Vec::new(),
        }
    }
}

/// A `status-update` streaming event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireStatusUpdate {
    /// Task the update belongs to.
    pub task_id: String,
    /// Conversation the task belongs to.
    pub context_id: String,
    /// Always `status-update`.
    #[serde(default = "status_update_kind")]
    pub kind: String,
    /// New status.
    pub status: WireTaskStatus,
    /// Set on the last event of the task.
    #[serde(rename = "final")]
    pub is_final: bool,
}

impl From<&TaskEvent> for WireStatusUpdate {
    fn from(event: &TaskEvent) -> Self {
        let message = event
            .message
            .as_ref()
            .map(|m| WireMessage::from_message(m).with_task(event.task_id.clone(), event.context_id.clone()));
        Self {
            task_id: event.task_id.clone(),
            context_id: event.context_id.clone(),
            kind: status_update_kind(),
            status: WireTaskStatus {
                state: event.state,
                message,
                timestamp: Some(event.timestamp),
            },
            is_final: event.is_final,
        }
    }
}

// ---------------------------------------------------------------------------
// Response event classification
// ---------------------------------------------------------------------------

/// One event of a worker's reply stream, reduced to what the orchestrator needs.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerEvent {
    /// Carries the worker's final message content.
    Final(Message),
    /// Anything else (status updates, echoes, empty tasks). Discarded.
    Intermediate {
        /// Wire `kind` of the event.
        kind: String,
        /// Task state, when the event carries one.
        state: Option<String>,
    },
}

/// Classify the `result` member of one JSON-RPC response.
///
/// Final events are: a result with non-empty `artifacts`, an
/// `artifact-update`, an agent `message` with parts, or a `completed` status
/// carrying a message. Everything else is intermediate.
pub fn classify_result(result: &Value) -> MaestroResult<WorkerEvent> {
    let obj = result
        .as_object()
        .ok_or_else(|| MaestroError::Protocol(format!("result is not an object: {result}")))?;
    let kind = obj.get("kind").and_then(Value::as_str).unwrap_or_default();

    if let Some(artifacts) = obj.get("artifacts").and_then(Value::as_array) {
        let parts: Vec<Part> = artifacts.iter().flat_map(parts_of).collect();
        if !parts.is_empty() {
            return Ok(WorkerEvent::Final(Message::new(Role::Agent, parts)));
        }
    }

    if kind == "artifact-update" {
        if let Some(artifact) = obj.get("artifact") {
            let parts = parts_of(artifact);
            if !parts.is_empty() {
                return Ok(WorkerEvent::Final(Message::new(Role::Agent, parts)));
            }
        }
    }

    if kind == "message" || (kind.is_empty() && obj.contains_key("parts")) {
        let from_user = obj.get("role").and_then(Value::as_str) == Some("user");
        let parts = parts_of(result);
        if !from_user && !parts.is_empty() {
            return Ok(WorkerEvent::Final(Message::new(Role::Agent, parts)));
        }
    }

    let state = obj
        .get("status")
        .and_then(|s| s.get("state"))
        .and_then(Value::as_str)
        .map(str::to_string);

    if state.as_deref() == Some("completed") {
        if let Some(message) = obj.get("status").and_then(|s| s.get("message")) {
            let parts = parts_of(message);
            if !parts.is_empty() {
                return Ok(WorkerEvent::Final(Message::new(Role::Agent, parts)));
            }
        }
    }

    Ok(WorkerEvent::Intermediate {
        kind: kind.to_string(),
        state,
    })
}

/// Text parts of any object with a `parts` array. Accepts both `{text}` and
/// the `{root: {text}}` shape some SDKs emit.
fn parts_of(value: &Value) -> Vec<Part> {
    value
        .get("parts")
        .and_then(Value::as_array)
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| {
                    p.get("text")
                        .or_else(|| p.get("root").and_then(|r| r.get("text")))
                        .and_then(Value::as_str)
                })
                .map(Part::text)
                .collect()
        })
        .unwrap_or_default()
}
