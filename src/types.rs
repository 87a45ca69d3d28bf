//! Canonical wire types for the Kairos A2A substrate.
//!
//! Every binding (native service, HTTP/JSON, JSON-RPC) renders these types
//! with the same camelCase JSON shape. Streaming payloads are discriminated
//! by a `kind` field and serialize flat (no wrapper keys), so a frame is
//! self-describing on every transport.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ============================================================================
// Enums
// ============================================================================

/// The lifecycle state of a task, serialized kebab-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskState {
    /// Task has been received but not yet started.
    Submitted,
    /// Task is actively being processed.
    Working,
    /// Task is parked awaiting a human approval decision.
    InputRequired,
    /// Task completed successfully. Terminal.
    Completed,
    /// Task failed. Terminal.
    Failed,
    /// Task was cancelled by the client. Terminal.
    Cancelled,
    /// Task was rejected by policy or an operator. Terminal.
    Rejected,
}

impl TaskState {
    /// Whether the state admits no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled | TaskState::Rejected
        )
    }

    /// Stable integer code used by the durable backend's `status_state` column.
    pub(crate) fn code(&self) -> i64 {
        match self {
            TaskState::Submitted => 0,
            TaskState::Working => 1,
            TaskState::InputRequired => 2,
            TaskState::Completed => 3,
            TaskState::Failed => 4,
            TaskState::Cancelled => 5,
            TaskState::Rejected => 6,
        }
    }

    pub(crate) fn from_code(code: i64) -> Option<Self> {
        match code {
            0 => Some(TaskState::Submitted),
            1 => Some(TaskState::Working),
            2 => Some(TaskState::InputRequired),
            3 => Some(TaskState::Completed),
            4 => Some(TaskState::Failed),
            5 => Some(TaskState::Cancelled),
            6 => Some(TaskState::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskState::Submitted => "submitted",
            TaskState::Working => "working",
            TaskState::InputRequired => "input-required",
            TaskState::Completed => "completed",
            TaskState::Failed => "failed",
            TaskState::Cancelled => "cancelled",
            TaskState::Rejected => "rejected",
        };
        write!(f, "{}", s)
    }
}

/// The role of a message sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Message from the user / client.
    User,
    /// Message from the agent / server.
    Agent,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Agent => write!(f, "agent"),
        }
    }
}

// ============================================================================
// Core Task Types
// ============================================================================

/// Current status of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    /// The current state.
    pub state: TaskState,

    /// Message explaining the most recent status change.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<Message>,

    /// RFC3339 timestamp of when this status was set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl TaskStatus {
    /// A status with the given state and no message.
    pub fn new(state: TaskState) -> Self {
        TaskStatus {
            state,
            message: None,
            timestamp: None,
        }
    }

    /// A status with a state and an explanatory message.
    pub fn with_message(state: TaskState, message: Message) -> Self {
        TaskStatus {
            state,
            message: Some(message),
            timestamp: None,
        }
    }
}

/// A task — the unit of work in the A2A contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    /// Unique task identifier.
    pub id: String,

    /// Context identifier grouping related tasks.
    pub context_id: String,

    /// Discriminator field, always "task".
    #[serde(default = "kind_task")]
    pub kind: String,

    /// Current task status.
    pub status: TaskStatus,

    /// Artifacts produced by the task, in production order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifacts: Option<Vec<Artifact>>,

    /// Message history, append-only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<Vec<Message>>,

    /// Monotonic last-write timestamp, maintained by the store.
    #[serde(default = "default_timestamp")]
    pub updated_at: DateTime<Utc>,

    /// Arbitrary metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

fn default_timestamp() -> DateTime<Utc> {
    DateTime::UNIX_EPOCH
}

// ============================================================================
// Message & Parts
// ============================================================================

/// A single message in a task's conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Unique message identifier (unique within a task's history).
    pub message_id: String,

    /// Who sent this message.
    pub role: Role,

    /// Discriminator field, always "message".
    #[serde(default = "kind_message")]
    pub kind: String,

    /// Content parts, never empty on a valid message.
    pub parts: Vec<Part>,

    /// Context this message belongs to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Task this message is associated with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,

    /// Arbitrary metadata. Recognized keys: `caller`, `agent`, `tenant`
    /// (lifted into the policy action), `approval_id` /
    /// `approval_expires_at` (stamped on HITL transitions), `event_type` /
    /// `payload` (semantic event encoding).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// A content part within a message or artifact, discriminated by `kind`.
///
/// JSON wire format:
/// - Text: `{"kind": "text", "text": "hello"}`
/// - Data: `{"kind": "data", "data": {"key": "value"}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Part {
    /// A text content part.
    #[serde(rename = "text")]
    Text {
        /// The text content.
        text: String,
        /// Optional metadata for this part.
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
    /// A structured data content part.
    #[serde(rename = "data")]
    Data {
        /// Arbitrary structured data.
        data: serde_json::Value,
        /// Optional metadata for this part.
        #[serde(skip_serializing_if = "Option::is_none")]
        metadata: Option<serde_json::Value>,
    },
}

/// An artifact produced by a task step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Artifact {
    /// Unique artifact identifier.
    pub artifact_id: String,

    /// Human-readable name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Description of the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Content parts of the artifact.
    pub parts: Vec<Part>,
}

// ============================================================================
// Streaming Frames
// ============================================================================

/// Notification that a task's status has changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatusUpdateEvent {
    /// ID of the task whose status changed.
    pub task_id: String,

    /// Context this task belongs to.
    pub context_id: String,

    /// Discriminator field, always "status-update".
    #[serde(default = "kind_status_update")]
    pub kind: String,

    /// The new status.
    pub status: TaskStatus,

    /// Whether this is the final frame of the stream.
    #[serde(rename = "final")]
    pub r#final: bool,

    /// Arbitrary metadata.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Notification that an artifact has been produced or extended.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskArtifactUpdateEvent {
    /// ID of the task that produced the artifact.
    pub task_id: String,

    /// Context this task belongs to.
    pub context_id: String,

    /// Discriminator field, always "artifact-update".
    #[serde(default = "kind_artifact_update")]
    pub kind: String,

    /// The artifact.
    pub artifact: Artifact,

    /// Whether the artifact extends an earlier chunk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<bool>,

    /// Whether this is the last chunk of the artifact.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_chunk: Option<bool>,
}

fn kind_task() -> String {
    "task".to_string()
}

fn kind_message() -> String {
    "message".to_string()
}

fn kind_status_update() -> String {
    "status-update".to_string()
}

fn kind_artifact_update() -> String {
    "artifact-update".to_string()
}

/// One discrete payload on a streaming response.
///
/// Each inner type carries a `kind` discriminator; the frame serializes flat
/// (no wrapper keys), so the discriminator alone identifies the variant:
/// `"task"`, `"message"`, `"status-update"`, `"artifact-update"`.
#[derive(Debug, Clone)]
pub enum StreamFrame {
    /// A complete task snapshot.
    Task(Task),

    /// A direct message.
    Message(Message),

    /// A task status update.
    StatusUpdate(TaskStatusUpdateEvent),

    /// An artifact update.
    ArtifactUpdate(TaskArtifactUpdateEvent),
}

impl Serialize for StreamFrame {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StreamFrame::Task(inner) => inner.serialize(serializer),
            StreamFrame::Message(inner) => inner.serialize(serializer),
            StreamFrame::StatusUpdate(inner) => inner.serialize(serializer),
            StreamFrame::ArtifactUpdate(inner) => inner.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for StreamFrame {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| serde::de::Error::custom("missing 'kind' field"))?;

        match kind {
            "task" => serde_json::from_value(value)
                .map(StreamFrame::Task)
                .map_err(serde::de::Error::custom),
            "message" => serde_json::from_value(value)
                .map(StreamFrame::Message)
                .map_err(serde::de::Error::custom),
            "status-update" => serde_json::from_value(value)
                .map(StreamFrame::StatusUpdate)
                .map_err(serde::de::Error::custom),
            "artifact-update" => serde_json::from_value(value)
                .map(StreamFrame::ArtifactUpdate)
                .map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "unknown kind '{}' — expected one of: task, message, status-update, artifact-update",
                other
            ))),
        }
    }
}

/// Response payload for a non-streaming send: a task or a direct message,
/// discriminated by `kind` and serialized flat.
#[derive(Debug, Clone)]
pub enum SendMessageResponse {
    /// A task was created or updated.
    Task(Task),

    /// A direct message response.
    Message(Message),
}

impl Serialize for SendMessageResponse {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            SendMessageResponse::Task(inner) => inner.serialize(serializer),
            SendMessageResponse::Message(inner) => inner.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for SendMessageResponse {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let kind = value
            .get("kind")
            .and_then(|v| v.as_str())
            .ok_or_else(|| serde::de::Error::custom("missing 'kind' field"))?;

        match kind {
            "task" => serde_json::from_value(value)
                .map(SendMessageResponse::Task)
                .map_err(serde::de::Error::custom),
            "message" => serde_json::from_value(value)
                .map(SendMessageResponse::Message)
                .map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "unknown kind '{}' — expected one of: task, message",
                other
            ))),
        }
    }
}

// ============================================================================
// Semantic Events
// ============================================================================

/// Metadata key carrying the semantic event type.
pub const METADATA_EVENT_TYPE: &str = "event_type";
/// Metadata key carrying the semantic event payload.
pub const METADATA_PAYLOAD: &str = "payload";
/// Metadata key carrying an approval record id on HITL transitions.
pub const METADATA_APPROVAL_ID: &str = "approval_id";
/// Metadata key carrying the RFC3339 approval expiry on HITL transitions.
pub const METADATA_APPROVAL_EXPIRES_AT: &str = "approval_expires_at";
/// Message metadata key lifted into the policy action as the caller.
pub const METADATA_CALLER: &str = "caller";
/// Message metadata key lifted into the policy action as the agent.
pub const METADATA_AGENT: &str = "agent";
/// Message metadata key lifted into the policy action as the tenant.
pub const METADATA_TENANT: &str = "tenant";

/// Semantic event type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    /// The agent is reasoning.
    #[serde(rename = "thinking")]
    Thinking,
    /// A task started executing.
    #[serde(rename = "task.started")]
    TaskStarted,
    /// A task finished executing.
    #[serde(rename = "task.completed")]
    TaskCompleted,
    /// Work was delegated to another agent.
    #[serde(rename = "delegation")]
    Delegation,
    /// Something went wrong.
    #[serde(rename = "error")]
    Error,
}

/// A semantic streaming/log record carried in status-message metadata.
///
/// Events annotate state; they never gate it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
    /// What happened.
    #[serde(rename = "event_type")]
    pub event_type: EventType,

    /// The agent the event is attributed to.
    pub agent: String,

    /// The task the event belongs to.
    pub task_id: String,

    /// RFC3339 timestamp.
    pub timestamp: String,

    /// Event-specific payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl AgentEvent {
    /// Build an event attributed to `agent` for `task_id` at `now`.
    pub fn new(
        event_type: EventType,
        agent: impl Into<String>,
        task_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type,
            agent: agent.into(),
            task_id: task_id.into(),
            timestamp: now.to_rfc3339(),
            payload: None,
        }
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Encode the event into message-metadata form.
    pub fn to_metadata(&self) -> serde_json::Value {
        // Serialization of this shape cannot fail; fall back to null if it ever does.
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    /// Decode an event from message metadata, if one is present.
    pub fn from_metadata(metadata: &serde_json::Value) -> Option<Self> {
        if metadata.get(METADATA_EVENT_TYPE).is_none() {
            return None;
        }
        serde_json::from_value(metadata.clone()).ok()
    }
}

// ============================================================================
// Agent Card
// ============================================================================

/// Capabilities advertised by an agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    /// Whether the agent supports streaming responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streaming: Option<bool>,

    /// Whether the agent supports push notifications.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_notifications: Option<bool>,
}

/// Self-describing manifest for an agent.
///
/// Only the fields the substrate consults are modeled here; card publishing
/// and discovery live outside this crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    /// Human-readable name, used as the policy action name.
    pub name: String,

    /// Description of the agent.
    pub description: String,

    /// Agent version string.
    pub version: String,

    /// Advertised capabilities.
    #[serde(default)]
    pub capabilities: AgentCapabilities,
}

// ============================================================================
// Push Notifications
// ============================================================================

/// Delivery hook for push notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationConfig {
    /// Identifier for this config; server-generated when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// URL to deliver notifications to.
    pub url: String,

    /// Optional verification token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Authentication configuration for the push endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication: Option<PushNotificationAuthenticationInfo>,
}

/// Authentication information for push notification delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushNotificationAuthenticationInfo {
    /// Supported authentication schemes (e.g. `["Bearer"]`).
    pub schemes: Vec<String>,

    /// Optional credentials required by the endpoint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<String>,
}

/// Push notification config bound to a specific task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPushNotificationConfig {
    /// Resource name: `tasks/{task_id}/pushNotificationConfigs/{config_id}`.
    pub name: String,

    /// Task this config applies to.
    pub task_id: String,

    /// The hook descriptor.
    pub push_notification_config: PushNotificationConfig,
}

// ============================================================================
// Approvals
// ============================================================================

/// Resolution state of an approval record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    /// Awaiting an operator decision.
    Pending,
    /// The operator allowed the action. Terminal for the record.
    Approved,
    /// The operator (or the sweeper) rejected the action. Terminal.
    Rejected,
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApprovalStatus::Pending => write!(f, "pending"),
            ApprovalStatus::Approved => write!(f, "approved"),
            ApprovalStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A persistent decision for a policy-pending action.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApprovalRecord {
    /// Unique approval identifier.
    pub id: String,

    /// Task the approval gates.
    pub task_id: String,

    /// Context the task belongs to.
    pub context_id: String,

    /// Resolution state.
    pub status: ApprovalStatus,

    /// Why the record is in its current state.
    pub reason: String,

    /// Creation instant.
    pub created_at: DateTime<Utc>,

    /// Last update instant.
    pub updated_at: DateTime<Utc>,

    /// When the pending decision expires; `None` disables expiry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,

    /// The captured message to execute on approval.
    pub message: Message,
}

impl ApprovalRecord {
    /// Whether a pending record has passed its expiry.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ApprovalStatus::Pending
            && self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

// ============================================================================
// Request / Response Parameter Types
// ============================================================================

/// Parameters for `SendMessage` and `SendStreamingMessage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageParams {
    /// The message to send.
    pub message: Message,

    /// Optional send configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub configuration: Option<SendMessageConfiguration>,

    /// Arbitrary metadata attached to the request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Configuration for a send request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessageConfiguration {
    /// Whether to run the executor synchronously and return its response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocking: Option<bool>,

    /// Maximum number of history messages to include in the response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i32>,
}

/// Parameters for `ListTasks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListTasksParams {
    /// Filter by context id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,

    /// Filter by task state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskState>,

    /// Only tasks updated strictly after this instant.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_after: Option<DateTime<Utc>>,

    /// Page size; defaults to 50. Negative values are rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_size: Option<i32>,

    /// Opaque cursor from a previous page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_token: Option<String>,

    /// History messages to keep per task; 0 keeps everything. Negative
    /// values are rejected.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history_length: Option<i32>,

    /// Whether to include artifacts in the listed tasks.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub include_artifacts: Option<bool>,
}

/// One page of a task listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPage {
    /// Tasks on this page, ordered `updatedAt DESC, id ASC`.
    pub tasks: Vec<Task>,

    /// Total number of tasks matching the filter.
    pub total_size: i32,

    /// The effective page size applied.
    pub page_size: i32,

    /// Cursor for the next page; absent when this is the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// One page of push configs for a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPushConfigsResponse {
    /// Configs ordered by config id.
    pub configs: Vec<TaskPushNotificationConfig>,
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl Part {
    /// Create a text part.
    pub fn text(text: impl Into<String>) -> Self {
        Part::Text {
            text: text.into(),
            metadata: None,
        }
    }

    /// Create a structured data part.
    pub fn data(data: serde_json::Value) -> Self {
        Part::Data {
            data,
            metadata: None,
        }
    }
}

impl Message {
    /// Create a user message with a single text part.
    pub fn user(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Message {
            message_id: message_id.into(),
            role: Role::User,
            kind: kind_message(),
            parts: vec![Part::text(text)],
            context_id: None,
            task_id: None,
            metadata: None,
        }
    }

    /// Create an agent message with a single text part.
    pub fn agent(message_id: impl Into<String>, text: impl Into<String>) -> Self {
        Message {
            message_id: message_id.into(),
            role: Role::Agent,
            kind: kind_message(),
            parts: vec![Part::text(text)],
            context_id: None,
            task_id: None,
            metadata: None,
        }
    }

    /// Concatenated text content of all text parts.
    pub fn text_content(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text, .. } => Some(text.as_str()),
                Part::Data { .. } => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Read a string value from the message metadata map.
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.as_ref()?.get(key)?.as_str()
    }

    /// Merge entries into the message metadata map.
    pub fn merge_metadata(&mut self, entries: HashMap<String, serde_json::Value>) {
        let metadata = self
            .metadata
            .get_or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
        if let Some(map) = metadata.as_object_mut() {
            for (key, value) in entries {
                map.insert(key, value);
            }
        }
    }
}
