//! Component seams: the contracts the orchestration core depends on.
//!
//! Embedding and planning backends vary by vendor; each is modeled as a
//! capability trait with swappable implementations rather than an
//! inheritance chain.

use async_trait::async_trait;
use ulid::Ulid;

use crate::error::Result;
use crate::types::{Action, AgentSession, AgentStep, Chunk, Query};

/// Maps text to a fixed-dimension vector.
///
/// Implementations may perform network I/O; a single call failure is a
/// transient `Provider` error. Retry policy lives in the decorating layer,
/// not in implementations.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch. The default loops over `embed`; implementations with
    /// a batch endpoint should override.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }

    /// Output dimensionality, fixed per provider instance.
    fn dimension(&self) -> usize;
}

/// The reasoning call: given the query and the trace so far, decide the
/// next action.
///
/// Malformed output surfaces as a `Planning` error; the orchestrator
/// retries up to its configured budget. Implementations must be
/// deterministic given an identical trace prefix and identical model
/// output, so traces are replayable.
#[async_trait]
pub trait Planner: Send + Sync {
    async fn plan(&self, query: &Query, trace: &[AgentStep]) -> Result<Action>;
}

/// A tool body: a function over already-validated JSON arguments.
///
/// Schema validation happens in the registry on both sides of this call;
/// handlers only see arguments that passed the declared input schema.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

/// Resolves chunk ids coming out of the vector index back to full chunks.
#[async_trait]
pub trait ChunkSource: Send + Sync {
    async fn chunk(&self, id: Ulid) -> Result<Option<Chunk>>;
}

/// Best-effort durable sink for terminated session traces. Losing a trace
/// on crash is acceptable; losing ingested knowledge is not.
#[async_trait]
pub trait SessionSink: Send + Sync {
    async fn save_session(&self, session: &AgentSession) -> Result<()>;
}
