//! Tool dispatch
//!
//! Thin layer between the loop and the registry. Whatever goes wrong on
//! this side of the boundary comes back as a structured `{"error"}` value
//! for the model to read; `execute` itself never fails.

use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::browser::PageContext;
use crate::tools::ToolRegistry;

pub struct ToolExecutor {
    registry: ToolRegistry,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    /// Run one invocation to completion.
    pub async fn execute(&self, name: &str, args: &Map<String, Value>, ctx: &PageContext) -> Value {
        let Some(tool) = self.registry.get(name) else {
            debug!(tool = name, "unknown tool requested");
            return json!({ "error": format!("unknown tool: {name}") });
        };

        match tool.invoke(args, ctx).await {
            Ok(result) => result,
            Err(err) => {
                warn!(tool = name, error = %err, "tool execution failed");
                json!({ "error": err.to_string() })
            }
        }
    }
}
