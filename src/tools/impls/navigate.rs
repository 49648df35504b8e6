//! Navigation tools

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::{Browser, PageContext};
use crate::tools::{names, require_str, ParamKind, ParamSpec, PermissionTier, Tool};

/// Navigate the active tab to a URL
pub struct NavigateTool {
    browser: Arc<dyn Browser>,
}

impl NavigateTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const NAVIGATE_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "url",
    ParamKind::String,
    "Absolute URL to open in the active tab",
)];

#[async_trait]
impl Tool for NavigateTool {
    fn name(&self) -> &'static str {
        names::NAVIGATE
    }

    fn description(&self) -> &'static str {
        "Open a URL in the active tab."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        NAVIGATE_PARAMS
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::Navigate
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let url = require_str(args, "url")?;
        let status = self.browser.navigate(url).await?;
        Ok(json!({ "navigated": url, "status": status }))
    }
}

/// Go back one entry in the tab history
pub struct GoBackTool {
    browser: Arc<dyn Browser>,
}

impl GoBackTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for GoBackTool {
    fn name(&self) -> &'static str {
        names::GO_BACK
    }

    fn description(&self) -> &'static str {
        "Go back one page in the active tab's history."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::Navigate
    }

    async fn invoke(
        &self,
        _args: &serde_json::Map<String, Value>,
        _ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let status = self.browser.go_back().await?;
        Ok(json!({ "status": status }))
    }
}
