use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Unique identifier for tasks
pub type TaskId = Uuid;

/// Unique identifier for catalog entities
pub type EntityId = Uuid;

/// Open/closed state of a task as reported by the remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskStatus {
    Open,
    Closed,
}

/// Reference to another entity (user, project, incident, ...).
///
/// References carry identity, not ownership: a task referencing a project
/// does not own that project.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub entity_type: Option<String>,
}

impl EntityRef {
    /// Reference by name only, the common shape in listing payloads
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }
}

/// Classification tag attached to a task. Order is meaningful and preserved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    #[serde(rename = "tagFQN")]
    pub tag_fqn: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A task as returned by the remote service.
///
/// Created server-side; this client only reads and partially patches it.
/// Timestamps travel as epoch milliseconds on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub entity_id: EntityId,
    pub entity_type: String,
    #[serde(rename = "type")]
    pub task_type: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub assignees: Vec<EntityRef>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub updated_at: DateTime<Utc>,
    #[serde(
        default,
        with = "chrono::serde::ts_milliseconds_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_by: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<EntityRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<EntityRef>,
}

/// Partial update applied to a task; absent fields are left untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assignees: Option<Vec<EntityRef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<Tag>>,
}

/// One page of an ordered listing plus its continuation cursor.
///
/// A cursor returned by page N, passed back as `after`, yields a disjoint
/// contiguous continuation of the same ordering. Absence of `after` signals
/// exhaustion. `total` is the server-side total, not the local count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub after: Option<String>,
    pub total: Option<u64>,
}

/// Pagination block of the response envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Paging {
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

/// Normalized response envelope.
///
/// The service answers either with a bare payload or with
/// `{ "data": ..., "paging": ... }`; both shapes normalize to this form.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub data: Value,
    pub paging: Option<Paging>,
}

impl Envelope {
    /// Normalize a raw response body into the envelope form
    pub fn normalize(value: Value) -> Self {
        if let Value::Object(ref map) = value
            && map.contains_key("data")
        {
            let paging = map
                .get("paging")
                .cloned()
                .and_then(|p| serde_json::from_value(p).ok());
            let data = map.get("data").cloned().unwrap_or(Value::Null);
            return Self { data, paging };
        }
        Self {
            data: value,
            paging: None,
        }
    }
}

/// Closed set of entity kinds the asset view dispatches on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityKind {
    Table,
    Dashboard,
    Other(String),
}

impl EntityKind {
    /// Map the wire-level `entityType` discriminator to a kind
    pub fn from_entity_type(entity_type: &str) -> Self {
        match entity_type.to_ascii_lowercase().as_str() {
            "table" => Self::Table,
            "dashboard" => Self::Dashboard,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Classification of asset content, used by hosts to pick a renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Definition language text for tabular entities
    Sql,
    /// Serialized structure (dashboards and charts)
    Json,
    /// Generic serialized fallback
    Text,
}

/// Normalized "content + content-kind" view of a catalog asset
#[derive(Debug, Clone, Serialize)]
pub struct AssetView {
    pub entity_id: EntityId,
    pub name: String,
    pub content: String,
    pub kind: ContentKind,
}

/// One edge of a lineage graph
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineageEdge {
    pub from_entity: EntityId,
    pub to_entity: EntityId,
}

/// Lineage graph around a single entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lineage {
    #[serde(default)]
    pub entity: Value,
    #[serde(default)]
    pub nodes: Vec<Value>,
    #[serde(default)]
    pub upstream_edges: Vec<LineageEdge>,
    #[serde(default)]
    pub downstream_edges: Vec<LineageEdge>,
}

/// One hit of a full-text search
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(default)]
    pub id: Option<EntityId>,
    pub name: String,
    #[serde(default)]
    pub entity_type: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Search response restricted to what hosts consume
#[derive(Debug, Clone)]
pub struct SearchResults {
    pub hits: Vec<SearchHit>,
    pub total: Option<u64>,
}

/// One data-quality result for a test case
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCaseResult {
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
    pub test_case_status: String,
    #[serde(default)]
    pub result: Option<String>,
}

/// Failure taxonomy for every call against the remote service.
///
/// `ApiClient` and `CredentialManager` never swallow these; the tree
/// aggregator is the only component that catches them, at its expansion
/// boundary.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    /// Precondition not met; raised before any network attempt
    #[error("not authenticated: sign in before contacting the service")]
    NotAuthenticated,
    /// Server answered in the 400-499 range
    #[error("request rejected with status {status}: {hint}")]
    AuthOrNotFound { status: u16, hint: String },
    /// No response received at all (connection, DNS, timeout)
    #[error("no response from service: {0}")]
    Transport(String),
    /// Anything else, including 5xx responses and malformed envelopes
    #[error("service error: {0}")]
    Unexpected(String),
}

impl ApiError {
    /// Classify a non-success HTTP status into the taxonomy
    pub fn from_status(status: u16, body: &str) -> Self {
        match status {
            401 => Self::AuthOrNotFound {
                status,
                hint: "check your token".to_string(),
            },
            404 => Self::AuthOrNotFound {
                status,
                hint: "resource not found".to_string(),
            },
            400..=499 => Self::AuthOrNotFound {
                status,
                hint: truncate_body(body),
            },
            _ => Self::Unexpected(format!("status {}: {}", status, truncate_body(body))),
        }
    }

    /// True for the 401 branch that should flag credential invalidity
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::AuthOrNotFound { status: 401, .. })
    }
}

fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "no error detail provided".to_string();
    }
    let mut out: String = trimmed.chars().take(200).collect();
    if out.len() < trimmed.len() {
        out.push_str("...");
    }
    out
}
