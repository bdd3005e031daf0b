//! docmind-index - In-memory vector index
//!
//! Stores (vector, chunk id, metadata) entries with a fixed dimension and
//! distance metric, and answers filtered nearest-neighbor queries.

pub mod distance;
pub mod memory;

pub use memory::MemoryIndex;
