//! docmind-engine - End-to-end pipelines
//!
//! Wires chunking, embedding, indexing, storage, retrieval, and agent
//! orchestration into two operations: ingest and query.

pub mod context;
pub mod engine;
pub mod planner;
pub mod tools;

pub use engine::{DefaultEngine, DeleteReport, Engine, IngestReport};
pub use planner::RetrieveThenAnswerPlanner;
