//! Tool registry and capability trait
//!
//! Every page action the model can request is a [`Tool`]: a name, a parameter
//! schema, a permission tier, and an async `invoke`. The registry is built
//! once at startup and consulted by the extractor (recognized tag names), the
//! decision engine (tiers), and the executor (dispatch).

mod impls;
pub mod schema;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::browser::{Browser, PageContext};
use crate::llm::ToolSchema;
pub use impls::{
    ClickTool, FillFormTool, FindElementsTool, GoBackTool, NavigateTool, ReadPageTool,
    SearchWebTool, SelectOptionTool, SubmitFormTool,
};
pub use schema::{ParamKind, ParamSpec};

/// Canonical tool names
pub mod names {
    pub const READ_PAGE: &str = "read_page";
    pub const FIND_ELEMENTS: &str = "find_elements";
    pub const SEARCH_WEB: &str = "search_web";
    pub const NAVIGATE: &str = "navigate";
    pub const GO_BACK: &str = "go_back";
    pub const CLICK: &str = "click";
    pub const FILL_FORM: &str = "fill_form";
    pub const SELECT_OPTION: &str = "select_option";
    pub const SUBMIT_FORM: &str = "submit_form";
}

/// Risk classification of a tool, used to select a default policy stance.
///
/// Ordered from least to most consequential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionTier {
    ReadOnly,
    Navigate,
    Interact,
    Submit,
}

impl PermissionTier {
    /// Rank on the shared trust/tier scale; see `policy::engine` for the
    /// cross-scale comparison against `TrustLevel::rank`.
    pub fn rank(self) -> u8 {
        match self {
            PermissionTier::ReadOnly => 1,
            PermissionTier::Navigate => 2,
            PermissionTier::Interact => 3,
            PermissionTier::Submit => 4,
        }
    }
}

impl std::fmt::Display for PermissionTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PermissionTier::ReadOnly => "read_only",
            PermissionTier::Navigate => "navigate",
            PermissionTier::Interact => "interact",
            PermissionTier::Submit => "submit",
        };
        write!(f, "{name}")
    }
}

/// A named, schema-described page action
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn parameters(&self) -> &'static [ParamSpec];

    fn tier(&self) -> PermissionTier;

    /// Perform the action. Errors are caught by the executor and fed back to
    /// the model as structured `{"error"}` results.
    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        ctx: &PageContext,
    ) -> anyhow::Result<Value>;

    /// Wire schema advertised to the model
    fn schema(&self) -> ToolSchema {
        ToolSchema::function(
            self.name(),
            self.description(),
            schema::object_schema(self.parameters()),
        )
    }
}

/// Registry of available tools, populated once at startup
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The full browser tool set, wired to one page-action substrate
    pub fn standard(browser: Arc<dyn Browser>) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(ReadPageTool::new(browser.clone())));
        registry.register(Arc::new(FindElementsTool::new(browser.clone())));
        registry.register(Arc::new(SearchWebTool::new(browser.clone())));
        registry.register(Arc::new(NavigateTool::new(browser.clone())));
        registry.register(Arc::new(GoBackTool::new(browser.clone())));
        registry.register(Arc::new(ClickTool::new(browser.clone())));
        registry.register(Arc::new(FillFormTool::new(browser.clone())));
        registry.register(Arc::new(SelectOptionTool::new(browser.clone())));
        registry.register(Arc::new(SubmitFormTool::new(browser)));
        registry
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn values(&self) -> impl Iterator<Item = &dyn Tool> {
        self.tools.values().map(|t| t.as_ref())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tools.keys().map(|k| k.as_str())
    }

    /// Schemas for every registered tool, for the chat request
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.tools.values().map(|t| t.schema()).collect()
    }
}

/// Extract a required string argument, erroring in the tool's own voice
pub(crate) fn require_str<'a>(
    args: &'a serde_json::Map<String, Value>,
    key: &str,
) -> anyhow::Result<&'a str> {
    args.get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| anyhow::anyhow!("missing required argument: {key}"))
}

/// Extract an argument as a display string regardless of its JSON type.
///
/// Tag-format attributes are coerced aggressively (numbers, booleans), so a
/// semantically-string parameter may arrive as a non-string scalar.
pub(crate) fn require_scalar(
    args: &serde_json::Map<String, Value>,
    key: &str,
) -> anyhow::Result<String> {
    match args.get(key) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        Some(Value::Bool(b)) => Ok(b.to_string()),
        Some(other) => anyhow::bail!("argument {key} must be a scalar, got {other}"),
        None => anyhow::bail!("missing required argument: {key}"),
    }
}
