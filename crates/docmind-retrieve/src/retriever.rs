//! Ranked, deduplicated retrieval over the vector index.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};
use ulid::Ulid;

use docmind_core::{
    ChunkSource, DocmindError, EmbeddingProvider, Query, Result, RetrievalConfig, RetrievalResult,
    ScoredChunk,
};
use docmind_index::MemoryIndex;

/// Turns a query into a ranked, deduplicated set of chunks.
///
/// The index is oversampled by `oversample_factor` so the diversity policy
/// has room to drop near-duplicates before truncating to `k`.
pub struct Retriever<S, P> {
    store: Arc<S>,
    index: Arc<MemoryIndex>,
    provider: Arc<P>,
    config: RetrievalConfig,
}

impl<S, P> Retriever<S, P>
where
    S: ChunkSource,
    P: EmbeddingProvider,
{
    pub fn new(
        store: Arc<S>,
        index: Arc<MemoryIndex>,
        provider: Arc<P>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            index,
            provider,
            config,
        }
    }

    /// Retrieve the top `k` chunks for a query.
    ///
    /// Scores are non-increasing and chunk ids unique; ties are broken by
    /// ascending sequence index. An unreachable embedding provider
    /// surfaces as `EmbeddingUnavailable`, never as an empty success.
    pub async fn retrieve(&self, query: &Query, k: usize) -> Result<RetrievalResult> {
        if k == 0 {
            return Err(DocmindError::invalid_argument("k must be > 0"));
        }

        let start = Instant::now();
        info!(query_id = %query.id, k, "retrieving");

        let query_vector = self.provider.embed(&query.text).await?;

        let fetch_k = k * self.config.oversample_factor;
        let hits = self.index.search(&query_vector, fetch_k, &query.filters)?;
        debug!(hits = hits.len(), fetch_k, "index search complete");

        // Hits come back in ascending distance, so the first chunk seen
        // for a (document, page) group is its best.
        let mut seen_groups: HashSet<(Ulid, Option<u32>)> = HashSet::new();
        let mut results: Vec<ScoredChunk> = Vec::with_capacity(k);

        for (chunk_id, distance) in hits {
            let chunk = match self.store.chunk(chunk_id).await? {
                Some(c) => c,
                None => continue,
            };

            if self.config.dedup_by_page
                && !seen_groups.insert((chunk.document_id, chunk.page))
            {
                continue;
            }

            results.push(ScoredChunk {
                score: crate::score::relevance(distance),
                chunk,
            });
            if results.len() == k {
                break;
            }
        }

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.chunk.sequence_index.cmp(&b.chunk.sequence_index))
        });

        let latency_ms = start.elapsed().as_millis() as u64;
        info!(query_id = %query.id, results = results.len(), latency_ms, "retrieval complete");

        Ok(RetrievalResult {
            query_id: query.id,
            results,
            latency_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    use docmind_core::{Chunk, DistanceMetric, EntryMetadata, IndexEntry};

    /// Chunk lookup backed by a plain map.
    struct MapSource {
        chunks: Mutex<HashMap<Ulid, Chunk>>,
    }

    #[async_trait]
    impl ChunkSource for MapSource {
        async fn chunk(&self, id: Ulid) -> Result<Option<Chunk>> {
            Ok(self.chunks.lock().unwrap().get(&id).cloned())
        }
    }

    /// Provider returning a fixed vector for any text.
    struct FixedProvider {
        vector: Vec<f32>,
    }

    #[async_trait]
    impl EmbeddingProvider for FixedProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(self.vector.clone())
        }

        fn dimension(&self) -> usize {
            self.vector.len()
        }
    }

    /// Provider that is permanently down.
    struct DownProvider;

    #[async_trait]
    impl EmbeddingProvider for DownProvider {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Err(DocmindError::EmbeddingUnavailable {
                attempts: 3,
                message: "connection refused".to_string(),
            })
        }

        fn dimension(&self) -> usize {
            2
        }
    }

    struct Fixture {
        store: Arc<MapSource>,
        index: Arc<MemoryIndex>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                store: Arc::new(MapSource {
                    chunks: Mutex::new(HashMap::new()),
                }),
                index: Arc::new(MemoryIndex::new(2, DistanceMetric::Euclidean).unwrap()),
            }
        }

        fn add(&self, document_id: Ulid, seq: u32, page: Option<u32>, vector: Vec<f32>) -> Ulid {
            let chunk = Chunk::new(document_id, seq, &format!("chunk {}", seq), 0, 7, 2, page);
            let id = chunk.id;
            self.index
                .upsert(vec![IndexEntry {
                    chunk_id: id,
                    vector,
                    metadata: EntryMetadata {
                        document_id,
                        page,
                        tags: Vec::new(),
                    },
                }])
                .unwrap();
            self.store.chunks.lock().unwrap().insert(id, chunk);
            id
        }

        fn retriever<P: EmbeddingProvider>(
            &self,
            provider: Arc<P>,
            dedup_by_page: bool,
        ) -> Retriever<MapSource, P> {
            Retriever::new(
                self.store.clone(),
                self.index.clone(),
                provider,
                RetrievalConfig {
                    top_k: 5,
                    oversample_factor: 4,
                    dedup_by_page,
                },
            )
        }
    }

    #[tokio::test]
    async fn test_scores_non_increasing_and_unique() {
        let fx = Fixture::new();
        let doc = Ulid::new();
        fx.add(doc, 0, Some(1), vec![0.0, 1.0]);
        fx.add(doc, 1, Some(2), vec![0.0, 3.0]);
        fx.add(doc, 2, Some(3), vec![0.0, 6.0]);

        let retriever = fx.retriever(Arc::new(FixedProvider { vector: vec![0.0, 0.0] }), false);
        let result = retriever.retrieve(&Query::new("q"), 3).await.unwrap();

        assert_eq!(result.results.len(), 3);
        for pair in result.results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
        let ids: HashSet<Ulid> = result.results.iter().map(|r| r.chunk.id).collect();
        assert_eq!(ids.len(), 3);
    }

    #[tokio::test]
    async fn test_dedup_keeps_best_per_document_page() {
        let fx = Fixture::new();
        let doc = Ulid::new();
        let best = fx.add(doc, 0, Some(1), vec![0.0, 1.0]);
        fx.add(doc, 1, Some(1), vec![0.0, 2.0]); // same page, worse
        fx.add(doc, 2, Some(2), vec![0.0, 5.0]);

        let retriever = fx.retriever(Arc::new(FixedProvider { vector: vec![0.0, 0.0] }), true);
        let result = retriever.retrieve(&Query::new("q"), 5).await.unwrap();

        assert_eq!(result.results.len(), 2);
        assert_eq!(result.results[0].chunk.id, best);
    }

    #[tokio::test]
    async fn test_tie_break_by_sequence_index() {
        let fx = Fixture::new();
        let doc_a = Ulid::new();
        let doc_b = Ulid::new();
        // Equal distances, distinct (doc, page) groups.
        fx.add(doc_b, 7, Some(1), vec![0.0, 2.0]);
        fx.add(doc_a, 3, Some(1), vec![2.0, 0.0]);

        let retriever = fx.retriever(Arc::new(FixedProvider { vector: vec![0.0, 0.0] }), true);
        let result = retriever.retrieve(&Query::new("q"), 2).await.unwrap();

        assert_eq!(result.results[0].chunk.sequence_index, 3);
        assert_eq!(result.results[1].chunk.sequence_index, 7);
        assert_eq!(result.results[0].score, result.results[1].score);
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_surfaced() {
        let fx = Fixture::new();
        fx.add(Ulid::new(), 0, None, vec![0.0, 1.0]);

        let retriever = fx.retriever(Arc::new(DownProvider), false);
        let err = retriever.retrieve(&Query::new("q"), 3).await.unwrap_err();
        assert!(matches!(err, DocmindError::EmbeddingUnavailable { .. }));
    }

    #[tokio::test]
    async fn test_empty_index_yields_empty_result() {
        let fx = Fixture::new();
        let retriever = fx.retriever(Arc::new(FixedProvider { vector: vec![0.0, 0.0] }), true);
        let result = retriever.retrieve(&Query::new("q"), 3).await.unwrap();
        assert!(result.results.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_k_fails_fast() {
        let fx = Fixture::new();
        let retriever = fx.retriever(Arc::new(FixedProvider { vector: vec![0.0, 0.0] }), true);
        let err = retriever.retrieve(&Query::new("q"), 0).await.unwrap_err();
        assert!(matches!(err, DocmindError::InvalidArgument { .. }));
    }
}
