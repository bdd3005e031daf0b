//! The engine: wiring for the ingestion and query pipelines.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use ulid::Ulid;

use docmind_agent::{CancelHandle, Orchestrator, ToolRegistry};
use docmind_chunk::{normalize, Chunker};
use docmind_core::{
    AgentSession, DocmindConfig, DocmindError, Document, EmbeddingProvider, EntryMetadata,
    IndexEntry, Query, Result, SearchFilters, SessionSink, Stats,
};
use docmind_embed::{HashEmbedder, RetryingProvider};
use docmind_index::MemoryIndex;
use docmind_retrieve::Retriever;
use docmind_store::SqliteStore;

use crate::planner::RetrieveThenAnswerPlanner;
use crate::tools::{
    AnalyzeSpendingTool, CategorizeExpensesTool, DetectAnomaliesTool, ForecastExpensesTool,
    SearchDocumentsTool,
};

/// Outcome of ingesting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub document_id: Ulid,
    pub chunks: usize,
    /// True when identical content was already ingested and nothing new
    /// was stored.
    pub deduplicated: bool,
}

/// Outcome of deleting one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteReport {
    pub document_id: Ulid,
    pub chunks_removed: usize,
    pub entries_removed: usize,
}

/// Engine wired with the default local embedding stack.
pub type DefaultEngine = Engine<RetryingProvider<HashEmbedder>>;

/// Owns the store, index, provider, and orchestrator, and exposes the two
/// pipelines: ingest and query.
pub struct Engine<P> {
    config: DocmindConfig,
    store: Arc<SqliteStore>,
    index: Arc<MemoryIndex>,
    provider: Arc<P>,
    chunker: Chunker,
    registry: Arc<ToolRegistry>,
    orchestrator: Orchestrator<RetrieveThenAnswerPlanner>,
}

impl DefaultEngine {
    /// Open an engine with the deterministic local embedder behind the
    /// configured retry policy.
    pub fn open(config: DocmindConfig) -> Result<Self> {
        let provider = Arc::new(RetryingProvider::new(
            HashEmbedder::new(config.index.dimension),
            &config.provider,
        ));
        Self::new(config, provider)
    }
}

impl<P> Engine<P>
where
    P: EmbeddingProvider + 'static,
{
    /// Build an engine from configuration and an embedding provider,
    /// rebuilding the vector index from the durable entry table.
    pub fn new(config: DocmindConfig, provider: Arc<P>) -> Result<Self> {
        config.validate()?;
        if provider.dimension() != config.index.dimension {
            return Err(DocmindError::DimensionMismatch {
                expected: config.index.dimension,
                actual: provider.dimension(),
            });
        }

        let store = Arc::new(SqliteStore::open(&config.database.path)?);
        let index = Arc::new(MemoryIndex::from_config(&config.index)?);
        let chunker = Chunker::from_config(&config.chunking)?;

        let persisted = store.load_entries()?;
        if !persisted.is_empty() {
            let rebuilt = index.upsert(persisted)?;
            info!(entries = rebuilt, "vector index rebuilt from store");
        }

        let retriever = Arc::new(Retriever::new(
            store.clone(),
            index.clone(),
            provider.clone(),
            config.retrieval.clone(),
        ));

        let mut registry = ToolRegistry::new();
        registry.register(
            SearchDocumentsTool::<P>::spec(),
            Arc::new(SearchDocumentsTool::new(
                retriever,
                store.clone(),
                config.retrieval.top_k,
            )),
        )?;
        registry.register(DetectAnomaliesTool::spec(), Arc::new(DetectAnomaliesTool))?;
        registry.register(
            CategorizeExpensesTool::spec(),
            Arc::new(CategorizeExpensesTool),
        )?;
        registry.register(ForecastExpensesTool::spec(), Arc::new(ForecastExpensesTool))?;
        registry.register(AnalyzeSpendingTool::spec(), Arc::new(AnalyzeSpendingTool))?;
        let registry = Arc::new(registry);

        let orchestrator = Orchestrator::new(
            Arc::new(RetrieveThenAnswerPlanner::new(config.retrieval.top_k)),
            registry.clone(),
            config.agent.clone(),
        );

        Ok(Self {
            config,
            store,
            index,
            provider,
            chunker,
            registry,
            orchestrator,
        })
    }

    /// Ingest one document: normalize, dedup by content hash, chunk, embed,
    /// persist, then index.
    ///
    /// Identical content under any source URI is a no-op returning the
    /// existing document id.
    pub async fn ingest_document(&self, source_uri: &str, raw_text: &str) -> Result<IngestReport> {
        let normalized = normalize(raw_text);
        if normalized.is_empty() {
            return Err(DocmindError::invalid_document(
                "document is empty after normalization",
            ));
        }

        let content_hash = Document::hash_content(&normalized);
        if let Some(existing) = self.store.find_document_by_hash(&content_hash)? {
            info!(document_id = %existing.id, source_uri, "content already ingested");
            let chunks = self.store.chunks_for_document(existing.id)?.len();
            return Ok(IngestReport {
                document_id: existing.id,
                chunks,
                deduplicated: true,
            });
        }

        let document = Document::new(source_uri, &normalized);
        let mut chunks = self.chunker.chunk(&document)?;

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let vectors = self.provider.embed_batch(&texts).await?;

        let mut entries = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.iter_mut().zip(vectors) {
            entries.push(IndexEntry {
                chunk_id: chunk.id,
                vector: vector.clone(),
                metadata: EntryMetadata {
                    document_id: document.id,
                    page: chunk.page,
                    tags: Vec::new(),
                },
            });
            chunk.embedding = Some(vector);
        }

        // Durable first, then visible to search.
        self.store.persist_document(&document, &chunks, &entries)?;
        self.index.upsert(entries)?;

        info!(document_id = %document.id, chunks = chunks.len(), source_uri, "document ingested");
        Ok(IngestReport {
            document_id: document.id,
            chunks: chunks.len(),
            deduplicated: false,
        })
    }

    /// Ingest several documents, isolating failures per document: one bad
    /// document never blocks the rest of the batch.
    pub async fn ingest_batch(&self, items: &[(String, String)]) -> Vec<Result<IngestReport>> {
        let mut reports = Vec::with_capacity(items.len());
        for (source_uri, raw_text) in items {
            let report = self.ingest_document(source_uri, raw_text).await;
            if let Err(err) = &report {
                warn!(source_uri, error = %err, "batch item failed");
            }
            reports.push(report);
        }
        reports
    }

    /// Answer a question: run an agent session to a terminal state and
    /// persist its trace best-effort.
    pub async fn submit_query(&self, text: &str, cancel: CancelHandle) -> Result<AgentSession> {
        self.submit_query_with_filters(text, SearchFilters::default(), cancel)
            .await
    }

    /// Like `submit_query`, restricting retrieval to entries matching the
    /// given filters.
    pub async fn submit_query_with_filters(
        &self,
        text: &str,
        filters: SearchFilters,
        cancel: CancelHandle,
    ) -> Result<AgentSession> {
        if text.trim().is_empty() {
            return Err(DocmindError::invalid_argument("query text is empty"));
        }

        let query = Query::with_filters(text, filters);
        let session = self.orchestrator.run(query, cancel).await;

        if let Err(err) = self.store.save_session(&session).await {
            warn!(session_id = %session.id, error = %err, "failed to persist session trace");
        }

        Ok(session)
    }

    /// Delete a document and everything derived from it.
    pub async fn delete_document(&self, document_id: Ulid) -> Result<DeleteReport> {
        let chunks_removed = self.store.delete_document(document_id)?;
        let entries_removed = self.index.delete(document_id);
        info!(%document_id, chunks_removed, entries_removed, "document deleted");
        Ok(DeleteReport {
            document_id,
            chunks_removed,
            entries_removed,
        })
    }

    /// Knowledge base counts.
    pub fn stats(&self) -> Result<Stats> {
        self.store.stats(self.index.dimension())
    }

    /// Names of the registered agent tools, sorted.
    pub fn tool_names(&self) -> Vec<&str> {
        self.registry.names()
    }

    pub fn config(&self) -> &DocmindConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }
}
