//! Tool registry with contract enforcement.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use docmind_core::{DocmindError, Result, ToolHandler};

use crate::schema::ToolSchema;

/// Declared contract for one tool.
#[derive(Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input: ToolSchema,
    pub output: ToolSchema,
    /// Whether transient failures of this tool may be retried.
    pub retryable: bool,
    /// Per-tool retry budget; `None` falls back to the agent-wide default.
    pub max_retries: Option<u32>,
}

struct RegisteredTool {
    spec: ToolSpec,
    handler: Arc<dyn ToolHandler>,
}

/// Holds the tools available to an agent session and enforces their
/// declared input/output contracts on every invocation.
#[derive(Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, RegisteredTool>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Duplicate names are rejected.
    pub fn register(&mut self, spec: ToolSpec, handler: Arc<dyn ToolHandler>) -> Result<()> {
        if self.tools.contains_key(&spec.name) {
            return Err(DocmindError::invalid_argument(format!(
                "tool '{}' is already registered",
                spec.name
            )));
        }
        debug!(tool = %spec.name, "registering tool");
        self.tools
            .insert(spec.name.clone(), RegisteredTool { spec, handler });
        Ok(())
    }

    /// Look up a tool's spec by name.
    pub fn spec(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name).map(|t| &t.spec)
    }

    /// Registered tool names in stable order.
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Invoke a tool once, validating arguments before the call and the
    /// result after it. A result that violates the output schema is a
    /// `ToolContractViolation` even though the handler itself succeeded.
    pub async fn invoke(&self, name: &str, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let tool = self.tools.get(name).ok_or_else(|| DocmindError::ToolNotFound {
            name: name.to_string(),
        })?;

        tool.spec
            .input
            .validate(&arguments)
            .map_err(|message| DocmindError::tool_contract(name, message))?;

        let value = tool.handler.call(arguments).await?;

        tool.spec
            .output
            .validate(&value)
            .map_err(|message| {
                DocmindError::tool_contract(name, format!("output: {}", message))
            })?;

        Ok(value)
    }
}
