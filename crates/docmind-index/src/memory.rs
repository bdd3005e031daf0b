//! In-memory vector index.
//!
//! Entries live in a map keyed by chunk id behind a single RwLock: reads
//! (search) run fully concurrent, mutations (`upsert`, `delete`) take the
//! write lock for the whole batch so no caller ever observes a partial
//! batch or a half-written entry.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;
use ulid::Ulid;

use docmind_core::{
    DistanceMetric, DocmindError, IndexConfig, IndexEntry, Result, SearchFilters,
};

use crate::distance::distance;

/// Fixed-dimension nearest-neighbor index with metadata filters.
///
/// Dimension and metric are fixed at construction; entries with mismatched
/// dimensionality are rejected at upsert time, never truncated and never
/// reachable from `search`.
pub struct MemoryIndex {
    dimension: usize,
    metric: DistanceMetric,
    entries: RwLock<HashMap<Ulid, IndexEntry>>,
}

impl MemoryIndex {
    /// Create an empty index. Fails fast on a zero dimension.
    pub fn new(dimension: usize, metric: DistanceMetric) -> Result<Self> {
        if dimension == 0 {
            return Err(DocmindError::invalid_argument("dimension must be > 0"));
        }
        Ok(Self {
            dimension,
            metric,
            entries: RwLock::new(HashMap::new()),
        })
    }

    pub fn from_config(config: &IndexConfig) -> Result<Self> {
        Self::new(config.dimension, config.metric)
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace entries, keyed by chunk id.
    ///
    /// The whole batch is validated before anything is written; a single
    /// mismatched vector rejects the batch. Returns the number of entries
    /// inserted or replaced.
    pub fn upsert(&self, batch: Vec<IndexEntry>) -> Result<usize> {
        for entry in &batch {
            if entry.vector.len() != self.dimension {
                return Err(DocmindError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.vector.len(),
                });
            }
        }

        let count = batch.len();
        let mut entries = self.entries.write().unwrap();
        for entry in batch {
            entries.insert(entry.chunk_id, entry);
        }

        debug!(count, total = entries.len(), "upserted index entries");
        Ok(count)
    }

    /// Nearest neighbors of `query_vector`, ascending by distance, at most
    /// `k` results. An empty index yields an empty result, never an error.
    ///
    /// Equal distances are broken by ascending chunk id so results are
    /// deterministic.
    pub fn search(
        &self,
        query_vector: &[f32],
        k: usize,
        filters: &SearchFilters,
    ) -> Result<Vec<(Ulid, f32)>> {
        if k == 0 {
            return Err(DocmindError::invalid_argument("k must be > 0"));
        }
        if query_vector.len() != self.dimension {
            return Err(DocmindError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        let entries = self.entries.read().unwrap();
        let mut scored: Vec<(Ulid, f32)> = entries
            .values()
            .filter(|entry| filters.matches(&entry.metadata))
            .map(|entry| {
                (
                    entry.chunk_id,
                    distance(self.metric, query_vector, &entry.vector),
                )
            })
            .collect();
        drop(entries);

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);

        Ok(scored)
    }

    /// Remove every entry belonging to the given document. Returns the
    /// number removed.
    pub fn delete(&self, document_id: Ulid) -> usize {
        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|_, entry| entry.metadata.document_id != document_id);
        let removed = before - entries.len();

        debug!(%document_id, removed, "deleted index entries");
        removed
    }
}
