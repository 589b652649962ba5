//! Core data model for the Universal Memory Core (§3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Opaque handle into `VectorIndex` / `LexicalIndex`. Memories without an
/// embedding carry `None`.
pub type EmbeddingRef = i64;

/// Reserved agent name readable by all agents belonging to a user (§3.1, I7).
pub const GLOBAL_AGENT: &str = "global";

/// Maximum serialized value size, bytes (§5).
pub const MAX_VALUE_SIZE_BYTES: usize = 1024 * 1024;

/// Maximum number of tags per memory (§5).
pub const MAX_TAGS: usize = 32;

/// Scope of a memory (§3.1). `working` memories live only in process state
/// unless persisted via `save_session`; `persistent` memories survive restarts
/// via `KVStore`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Hash)]
#[serde(rename_all = "lowercase")]
pub enum MemoryScope {
    Working,
    #[default]
    Persistent,
}

impl MemoryScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryScope::Working => "working",
            MemoryScope::Persistent => "persistent",
        }
    }
}

impl std::str::FromStr for MemoryScope {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "working" => Ok(MemoryScope::Working),
            "persistent" => Ok(MemoryScope::Persistent),
            other => Err(format!("unknown scope: {other}")),
        }
    }
}

/// A query-time scope filter; `all` concatenates results from both tiers,
/// tagged by origin (§4.5.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ScopeFilter {
    Working,
    #[default]
    Persistent,
    All,
}

/// The opaque value payload of a memory (§9 "dynamic typing of memory
/// values"). The scorer and lexical index only ever see the derived text
/// projection (`as_text`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MemoryValue {
    Text(String),
    Json(serde_json::Value),
    BinaryRef { uri: String, mime_type: Option<String> },
}

impl MemoryValue {
    /// Text projection used for lexical indexing and recall scoring.
    pub fn as_text(&self) -> String {
        match self {
            MemoryValue::Text(s) => s.clone(),
            MemoryValue::Json(v) => v.to_string(),
            MemoryValue::BinaryRef { uri, .. } => uri.clone(),
        }
    }

    pub fn serialized_len(&self) -> usize {
        match self {
            MemoryValue::Text(s) => s.len(),
            MemoryValue::Json(v) => v.to_string().len(),
            MemoryValue::BinaryRef { uri, .. } => uri.len(),
        }
    }
}

/// A memory: the unit of storage (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Memory {
    /// Row identity within the KV store; stable once assigned.
    pub id: i64,
    pub user_id: String,
    pub agent_name: String,
    pub key: String,
    pub value: MemoryValue,
    pub scope: MemoryScope,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub access_count: i64,
    pub last_accessed_at: DateTime<Utc>,
    pub embedding_ref: Option<EmbeddingRef>,
    pub content_hash: String,
}

fn default_importance() -> f32 {
    0.5
}

impl Memory {
    /// Stable digest of value + sorted tags + scope, used as the dedup key
    /// (§4.5.3).
    pub fn compute_content_hash(value: &MemoryValue, tags: &[String], scope: MemoryScope) -> String {
        let mut sorted_tags = tags.to_vec();
        sorted_tags.sort();
        let mut hasher = Sha256::new();
        hasher.update(value.as_text().as_bytes());
        hasher.update(b"\0");
        hasher.update(sorted_tags.join(",").as_bytes());
        hasher.update(b"\0");
        hasher.update(scope.as_str().as_bytes());
        hex::encode(hasher.finalize())
    }

    pub fn partition(&self) -> (String, String) {
        (self.user_id.clone(), self.agent_name.clone())
    }
}

/// Input to `remember` (§4.5.1).
#[derive(Debug, Clone, Deserialize)]
pub struct MemorySpec {
    pub user_id: String,
    pub agent_name: String,
    pub key: Option<String>,
    pub value: MemoryValue,
    #[serde(default)]
    pub scope: MemoryScope,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default = "default_importance")]
    pub importance: f32,
}

/// Role of a `Message` in a context-memory session (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

/// An append-only item in context memory (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Ordered message log plus a working-memory snapshot (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Session {
    pub session_name: String,
    pub messages: Vec<Message>,
    /// Snapshot of working-memory keys at save time.
    pub working_snapshot: HashMap<String, Memory>,
}

/// Graph node type (§3.1, closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    Memory,
    User,
    Topic,
    Interaction,
    Error,
    Solution,
    Decision,
    File,
    Session,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Memory => "memory",
            NodeType::User => "user",
            NodeType::Topic => "topic",
            NodeType::Interaction => "interaction",
            NodeType::Error => "error",
            NodeType::Solution => "solution",
            NodeType::Decision => "decision",
            NodeType::File => "file",
            NodeType::Session => "session",
        }
    }
}

impl std::str::FromStr for NodeType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "memory" => Ok(NodeType::Memory),
            "user" => Ok(NodeType::User),
            "topic" => Ok(NodeType::Topic),
            "interaction" => Ok(NodeType::Interaction),
            "error" => Ok(NodeType::Error),
            "solution" => Ok(NodeType::Solution),
            "decision" => Ok(NodeType::Decision),
            "file" => Ok(NodeType::File),
            "session" => Ok(NodeType::Session),
            other => Err(format!("unknown node type: {other}")),
        }
    }
}

/// A node in the temporal knowledge graph (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub node_type: NodeType,
    #[serde(default)]
    pub data: serde_json::Value,
}

/// Closed set of relation types carried by a `GraphEdge` (§3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RelType {
    RelatedTo,
    DependsOn,
    LearnedFrom,
    Influences,
    WorksOn,
    SolvedBy,
    Implements,
    CausedBy,
    Supersedes,
    /// Supplemented: links a `file_change` node to the `session` it occurred in.
    InSession,
}

impl RelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelType::RelatedTo => "related_to",
            RelType::DependsOn => "depends_on",
            RelType::LearnedFrom => "learned_from",
            RelType::Influences => "influences",
            RelType::WorksOn => "works_on",
            RelType::SolvedBy => "solved_by",
            RelType::Implements => "implements",
            RelType::CausedBy => "caused_by",
            RelType::Supersedes => "supersedes",
            RelType::InSession => "in_session",
        }
    }
}

impl std::str::FromStr for RelType {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "related_to" => Ok(RelType::RelatedTo),
            "depends_on" => Ok(RelType::DependsOn),
            "learned_from" => Ok(RelType::LearnedFrom),
            "influences" => Ok(RelType::Influences),
            "works_on" => Ok(RelType::WorksOn),
            "solved_by" => Ok(RelType::SolvedBy),
            "implements" => Ok(RelType::Implements),
            "caused_by" => Ok(RelType::CausedBy),
            "supersedes" => Ok(RelType::Supersedes),
            "in_session" => Ok(RelType::InSession),
            other => Err(format!("unknown rel type: {other}")),
        }
    }
}

/// A directed, time-scoped edge in the graph (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub src: String,
    pub dst: String,
    pub rel_type: RelType,
    pub weight: f32,
    #[serde(default)]
    pub data: serde_json::Value,
    pub valid_from: DateTime<Utc>,
    pub valid_until: Option<DateTime<Utc>>,
    pub source: Option<String>,
    pub confidence: f32,
}

impl GraphEdge {
    /// Whether this edge's validity interval contains `at_time` (§4.8, P6):
    /// `valid_from <= at_time` and (`valid_until` is null or `at_time < valid_until`).
    pub fn valid_at(&self, at_time: DateTime<Utc>) -> bool {
        self.valid_from <= at_time && self.valid_until.map(|u| at_time < u).unwrap_or(true)
    }
}

/// Lifecycle of a `CodingSession` (§4.6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Ended,
    Aborted,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Ended => "ended",
            SessionStatus::Aborted => "aborted",
        }
    }
}

impl std::str::FromStr for SessionStatus {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "active" => Ok(SessionStatus::Active),
            "ended" => Ok(SessionStatus::Ended),
            "aborted" => Ok(SessionStatus::Aborted),
            other => Err(format!("unknown session status: {other}")),
        }
    }
}

/// A tracked unit of development work scoped to `(user, project)` (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodingSession {
    pub session_id: String,
    pub user_id: String,
    pub project_id: String,
    pub description: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub linked_issue: Option<String>,
    pub summary: Option<String>,
}

/// Kind of file action tracked by `coding_track_file_change` (§4.6.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Create,
    Edit,
    Delete,
    Rename,
    Refactor,
    Test,
}

impl FileAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileAction::Create => "create",
            FileAction::Edit => "edit",
            FileAction::Delete => "delete",
            FileAction::Rename => "rename",
            FileAction::Refactor => "refactor",
            FileAction::Test => "test",
        }
    }
}

impl std::str::FromStr for FileAction {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "create" => Ok(FileAction::Create),
            "edit" => Ok(FileAction::Edit),
            "delete" => Ok(FileAction::Delete),
            "rename" => Ok(FileAction::Rename),
            "refactor" => Ok(FileAction::Refactor),
            "test" => Ok(FileAction::Test),
            other => Err(format!("unknown file action: {other}")),
        }
    }
}

/// A file change tracked within a coding session (§4.6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub id: String,
    pub session_id: String,
    pub file_path: String,
    pub action: FileAction,
    pub diff: Option<String>,
    pub reason: Option<String>,
    #[serde(default)]
    pub related_files: Vec<String>,
    pub line_range: Option<(u32, u32)>,
    pub implements_decision_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An error observed during a coding session, optionally linked to its
/// resolving solution (§4.6.2, §4.6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub id: String,
    pub session_id: String,
    pub error_type: String,
    pub message: String,
    pub stack_trace: Option<String>,
    pub file_path: Option<String>,
    pub line_number: Option<u32>,
    pub screenshot_ref: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub solution: Option<String>,
    pub resolved: bool,
    pub created_at: DateTime<Utc>,
}

/// A decision made during a coding session (§4.6.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub session_id: String,
    pub decision: String,
    pub rationale: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
    pub impact: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub related_files: Vec<String>,
    pub confidence: f32,
    pub created_at: DateTime<Utc>,
}

/// Feedback label applied by `feedback` (§4.5.1, §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackLabel {
    Useful,
    Irrelevant,
    Outdated,
}

impl FeedbackLabel {
    /// Signed importance delta per unit weight (§4.7).
    pub fn importance_delta(&self, weight: f32) -> f32 {
        let w = weight.abs();
        match self {
            FeedbackLabel::Useful => 0.1 * w,
            FeedbackLabel::Irrelevant => -0.1 * w,
            FeedbackLabel::Outdated => -0.2 * w,
        }
    }
}

/// Weights for the recall scorer's signal blend (§4.7). Must sum to 1.0.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScorerWeights {
    pub semantic: f32,
    pub recency: f32,
    pub frequency: f32,
    pub graph: f32,
    pub importance: f32,
}

impl Default for ScorerWeights {
    fn default() -> Self {
        Self {
            semantic: 0.30,
            recency: 0.20,
            frequency: 0.15,
            graph: 0.15,
            importance: 0.20,
        }
    }
}

/// Options controlling a `recall_hybrid` call (§9 "dynamic kwargs").
#[derive(Debug, Clone)]
pub struct RecallOptions {
    pub top_k: usize,
    pub candidates_k: usize,
    pub rerank_enabled: bool,
    pub scope: ScopeFilter,
    pub rrf_k: f32,
    pub scorer_weights: ScorerWeights,
}

impl Default for RecallOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            candidates_k: 100,
            rerank_enabled: false,
            scope: ScopeFilter::All,
            rrf_k: 60.0,
            scorer_weights: ScorerWeights::default(),
        }
    }
}

impl RecallOptions {
    /// `candidates_k = max(5*top_k, 100)` per §4.5.2, clamped to §5 limits.
    pub fn derive_candidates_k(top_k: usize) -> usize {
        (5 * top_k).max(100).min(500)
    }
}

/// A scored, ranked memory returned by recall operations.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredMemory {
    pub memory: Memory,
    pub score: f32,
    pub semantic_score: Option<f32>,
    pub lexical_score: Option<f32>,
}

/// Result of `list`, tagged with the scope it came from when `scope=all`.
#[derive(Debug, Clone, Serialize)]
pub struct ListedMemory {
    pub memory: Memory,
    pub origin: MemoryScope,
}

/// Filter accepted by `list`/`scan` (§4.1).
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub agent_name: Option<String>,
    pub tags: Option<Vec<String>>,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}
