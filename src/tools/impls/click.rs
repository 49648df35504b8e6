//! Click tool

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::{Browser, PageContext};
use crate::tools::{names, require_str, ParamKind, ParamSpec, PermissionTier, Tool};

/// Click an element on the current page
pub struct ClickTool {
    browser: Arc<dyn Browser>,
}

impl ClickTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const CLICK_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "selector",
    ParamKind::String,
    "CSS selector of the element to click",
)];

#[async_trait]
impl Tool for ClickTool {
    fn name(&self) -> &'static str {
        names::CLICK
    }

    fn description(&self) -> &'static str {
        "Click an element on the current page."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        CLICK_PARAMS
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::Interact
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let selector = require_str(args, "selector")?;
        let status = self.browser.click(selector).await?;
        Ok(json!({ "clicked": selector, "status": status }))
    }
}
