//! docmind-agent - Agent orchestration
//!
//! A bounded plan/act/observe state machine over a registry of
//! contract-checked tools, with cooperative cancellation.

pub mod cancel;
pub mod orchestrator;
pub mod registry;
pub mod schema;

pub use cancel::CancelHandle;
pub use orchestrator::Orchestrator;
pub use registry::{ToolRegistry, ToolSpec};
pub use schema::{ToolSchema, ValueKind};
