//! Web search tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::{Browser, PageContext};
use crate::tools::{names, require_scalar, ParamKind, ParamSpec, PermissionTier, Tool};

/// Run a web search in the active tab
pub struct SearchWebTool {
    browser: Arc<dyn Browser>,
}

impl SearchWebTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const SEARCH_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "query",
    ParamKind::String,
    "Search query",
)];

#[async_trait]
impl Tool for SearchWebTool {
    fn name(&self) -> &'static str {
        names::SEARCH_WEB
    }

    fn description(&self) -> &'static str {
        "Search the web and open the results page in the active tab."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SEARCH_PARAMS
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::Navigate
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let query = require_scalar(args, "query")?;
        let results = self.browser.search(&query).await?;
        Ok(json!({ "query": query, "results": results }))
    }
}
