//! docmind-embed - Embedding provider implementations
//!
//! The core only depends on the `EmbeddingProvider` contract; this crate
//! supplies a deterministic local implementation and the retry/timeout
//! decorator that enforces the transient-failure policy for any backend.

pub mod hash;
pub mod retry;

pub use hash::HashEmbedder;
pub use retry::RetryingProvider;
