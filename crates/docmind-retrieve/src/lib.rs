//! docmind-retrieve - Retrieval and ranking
//!
//! Embeds the query, oversamples the vector index, applies the diversity
//! policy, and returns a ranked, deduplicated retrieval result.

pub mod retriever;
pub mod score;

pub use retriever::Retriever;
pub use score::relevance;
