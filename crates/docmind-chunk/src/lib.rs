//! docmind-chunk - Document chunking
//!
//! Turns normalized document text into overlapping, size-bounded chunks
//! with stable provenance (byte offsets, sequence index, page number).

pub mod normalize;
pub mod splitter;

pub use normalize::{normalize, page_markers};
pub use splitter::{reconstruct, Chunker};
