//! Read-only page tools

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::{Browser, PageContext};
use crate::tools::{names, require_str, ParamKind, ParamSpec, PermissionTier, Tool};

/// Extract the readable content of the current page
pub struct ReadPageTool {
    browser: Arc<dyn Browser>,
}

impl ReadPageTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

#[async_trait]
impl Tool for ReadPageTool {
    fn name(&self) -> &'static str {
        names::READ_PAGE
    }

    fn description(&self) -> &'static str {
        "Read the visible text content of the current page."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        &[]
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::ReadOnly
    }

    async fn invoke(
        &self,
        _args: &serde_json::Map<String, Value>,
        ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let content = self.browser.read_page().await?;
        Ok(json!({ "url": ctx.url, "content": content }))
    }
}

/// List elements matching a CSS selector
pub struct FindElementsTool {
    browser: Arc<dyn Browser>,
}

impl FindElementsTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const FIND_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "selector",
    ParamKind::String,
    "CSS selector to match elements against",
)];

#[async_trait]
impl Tool for FindElementsTool {
    fn name(&self) -> &'static str {
        names::FIND_ELEMENTS
    }

    fn description(&self) -> &'static str {
        "Find elements on the current page by CSS selector and describe them."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        FIND_PARAMS
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::ReadOnly
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let selector = require_str(args, "selector")?;
        let elements = self.browser.find_elements(selector).await?;
        Ok(json!({ "selector": selector, "elements": elements }))
    }
}
