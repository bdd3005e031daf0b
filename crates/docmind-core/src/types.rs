//! Core domain types for the docmind engine.

use serde::{Deserialize, Serialize};
use ulid::Ulid;

/// Current time as Unix milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_millis() as u64
}

/// Distance metric for the vector index.
///
/// Fixed at index construction; changing it requires a full reindex.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMetric {
    Cosine,
    Euclidean,
}

/// An ingested document. Immutable once stored; re-ingestion of changed
/// content produces a new document under a new id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Source URI (file://, https://, upload://).
    pub source_uri: String,

    /// Normalized text content.
    pub raw_text: String,

    /// Blake3 hash of the normalized text, for idempotent ingestion.
    #[serde(with = "serde_hash")]
    pub content_hash: [u8; 32],

    /// Creation timestamp (Unix millis).
    pub created_at: u64,
}

impl Document {
    /// Create a new document from normalized text.
    pub fn new(source_uri: &str, raw_text: &str) -> Self {
        let content_hash = blake3::hash(raw_text.as_bytes());
        Self {
            id: Ulid::new(),
            source_uri: source_uri.to_string(),
            raw_text: raw_text.to_string(),
            content_hash: *content_hash.as_bytes(),
            created_at: now_millis(),
        }
    }

    /// Hash the given text the same way ingestion does.
    pub fn hash_content(text: &str) -> [u8; 32] {
        *blake3::hash(text.as_bytes()).as_bytes()
    }
}

/// A bounded segment of a document, the unit of embedding and retrieval.
///
/// Offsets are byte positions into the document's normalized text. Adjacent
/// chunks may overlap by the configured overlap window; `sequence_index` is
/// strictly increasing within a document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier (ULID).
    pub id: Ulid,

    /// Parent document ID.
    pub document_id: Ulid,

    /// Chunk text, a verbatim slice of the normalized document text.
    pub text: String,

    /// Byte offset of the first character in the document text.
    pub offset_start: usize,

    /// Byte offset one past the last character.
    pub offset_end: usize,

    /// Position within the document (0-based, strictly increasing).
    pub sequence_index: u32,

    /// Page number governing this chunk, when the source carries page
    /// markers.
    pub page: Option<u32>,

    /// Token count of the chunk text.
    pub token_count: u32,

    /// Embedding vector, absent until computed.
    pub embedding: Option<Vec<f32>>,
}

impl Chunk {
    pub fn new(
        document_id: Ulid,
        sequence_index: u32,
        text: &str,
        offset_start: usize,
        offset_end: usize,
        token_count: u32,
        page: Option<u32>,
    ) -> Self {
        Self {
            id: Ulid::new(),
            document_id,
            text: text.to_string(),
            offset_start,
            offset_end,
            sequence_index,
            page,
            token_count,
            embedding: None,
        }
    }
}

/// Metadata carried alongside each index entry, used for filtered search
/// and cascade deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub document_id: Ulid,
    pub page: Option<u32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// A (vector, metadata) pair stored in the vector index, one-to-one with an
/// embedded chunk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk_id: Ulid,
    pub vector: Vec<f32>,
    pub metadata: EntryMetadata,
}

/// Metadata filters applied during search.
///
/// Empty filters match every entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchFilters {
    /// Restrict to these documents.
    pub document_ids: Option<Vec<Ulid>>,

    /// Restrict to these page numbers.
    pub pages: Option<Vec<u32>>,

    /// Entry must carry at least one of these tags.
    pub tags: Option<Vec<String>>,
}

impl SearchFilters {
    /// Whether the given entry metadata passes the filters.
    pub fn matches(&self, metadata: &EntryMetadata) -> bool {
        if let Some(ids) = &self.document_ids {
            if !ids.contains(&metadata.document_id) {
                return false;
            }
        }
        if let Some(pages) = &self.pages {
            match metadata.page {
                Some(p) if pages.contains(&p) => {}
                _ => return false,
            }
        }
        if let Some(tags) = &self.tags {
            if !tags.iter().any(|t| metadata.tags.contains(t)) {
                return false;
            }
        }
        true
    }
}

/// A user query. Ephemeral; persisted only as part of a session trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: Ulid,
    pub text: String,
    #[serde(default)]
    pub filters: SearchFilters,
    pub created_at: u64,
}

impl Query {
    pub fn new(text: &str) -> Self {
        Self {
            id: Ulid::new(),
            text: text.to_string(),
            filters: SearchFilters::default(),
            created_at: now_millis(),
        }
    }

    pub fn with_filters(text: &str, filters: SearchFilters) -> Self {
        Self {
            filters,
            ..Self::new(text)
        }
    }
}

/// A retrieved chunk with its normalized relevance score in [0, 1].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub score: f32,
}

/// Ordered retrieval output: scores non-increasing, chunk ids unique.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub query_id: Ulid,
    pub results: Vec<ScoredChunk>,
    pub latency_ms: u64,
}

/// An action decided by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Invoke a registered tool with the given arguments.
    ToolCall {
        name: String,
        arguments: serde_json::Value,
    },

    /// Terminate the session with a final answer.
    FinalAnswer { text: String },
}

/// What came back from executing an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Observation {
    /// Tool output that passed schema validation.
    Output { value: serde_json::Value },

    /// The action failed; the error is recorded, not propagated.
    Error { code: String, message: String },
}

impl Observation {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error { .. })
    }
}

/// One planning cycle in a session trace: the action taken and what was
/// observed. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentStep {
    /// 0-based position in the trace.
    pub step_index: u32,

    pub action: Action,
    pub observation: Observation,

    /// Unix millis when the observation was recorded.
    pub timestamp: u64,
}

/// Terminal and non-terminal session states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Running,
    Succeeded,
    Failed,
    Truncated,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }
}

/// One query's orchestration state: the trace of steps taken and the
/// terminal outcome. Created per query; independent sessions share nothing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: Ulid,
    pub query: Query,

    /// Ordered, append-only step trace.
    pub trace: Vec<AgentStep>,

    pub status: SessionStatus,

    /// Set when the session terminates with an answer. For truncated
    /// sessions this is the best-available partial answer.
    pub final_answer: Option<String>,

    /// True when `final_answer` is a partial answer from a truncated run.
    pub partial: bool,

    /// Populated for failed sessions (e.g. "CANCELLED", "PLANNING_ERROR").
    pub failure_reason: Option<String>,

    pub created_at: u64,
}

impl AgentSession {
    pub fn new(query: Query) -> Self {
        Self {
            id: Ulid::new(),
            query,
            trace: Vec::new(),
            status: SessionStatus::Running,
            final_answer: None,
            partial: false,
            failure_reason: None,
            created_at: now_millis(),
        }
    }

    /// Append a step to the trace, assigning the next step index.
    pub fn record_step(&mut self, action: Action, observation: Observation) {
        let step_index = self.trace.len() as u32;
        self.trace.push(AgentStep {
            step_index,
            action,
            observation,
            timestamp: now_millis(),
        });
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Counts describing the current knowledge base.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stats {
    pub documents: u64,
    pub chunks: u64,
    pub entries: u64,
    pub dimension: usize,
}

/// Hex serialization for content hashes.
mod serde_hash {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(value: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        hex::encode(value).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<[u8; 32], D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(serde::de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| serde::de::Error::custom("invalid hash length"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_hash_stable() {
        let a = Document::new("upload://a.pdf", "same text");
        let b = Document::new("upload://b.pdf", "same text");
        assert_ne!(a.id, b.id);
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(Document::hash_content("same text"), a.content_hash);
    }

    #[test]
    fn test_filters_match() {
        let doc_id = Ulid::new();
        let meta = EntryMetadata {
            document_id: doc_id,
            page: Some(2),
            tags: vec!["statement".to_string()],
        };

        assert!(SearchFilters::default().matches(&meta));

        let by_doc = SearchFilters {
            document_ids: Some(vec![doc_id]),
            ..Default::default()
        };
        assert!(by_doc.matches(&meta));

        let wrong_page = SearchFilters {
            pages: Some(vec![5]),
            ..Default::default()
        };
        assert!(!wrong_page.matches(&meta));

        let by_tag = SearchFilters {
            tags: Some(vec!["statement".to_string(), "invoice".to_string()]),
            ..Default::default()
        };
        assert!(by_tag.matches(&meta));
    }

    #[test]
    fn test_action_wire_format() {
        let action: Action = serde_json::from_value(serde_json::json!({
            "type": "tool_call",
            "name": "search_documents",
            "arguments": {"query": "total expenses"}
        }))
        .unwrap();
        assert!(matches!(action, Action::ToolCall { ref name, .. } if name == "search_documents"));

        let final_answer: Action =
            serde_json::from_value(serde_json::json!({"type": "final_answer", "text": "done"}))
                .unwrap();
        assert_eq!(
            final_answer,
            Action::FinalAnswer {
                text: "done".to_string()
            }
        );
    }

    #[test]
    fn test_session_trace_indices() {
        let mut session = AgentSession::new(Query::new("q"));
        session.record_step(
            Action::FinalAnswer {
                text: "a".to_string(),
            },
            Observation::Output {
                value: serde_json::Value::Null,
            },
        );
        session.record_step(
            Action::FinalAnswer {
                text: "b".to_string(),
            },
            Observation::Error {
                code: "TIMEOUT".to_string(),
                message: "slow".to_string(),
            },
        );
        assert_eq!(session.trace[0].step_index, 0);
        assert_eq!(session.trace[1].step_index, 1);
        assert!(!session.is_terminal());
    }
}
