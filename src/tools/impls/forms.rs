//! Form interaction tools

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::browser::{Browser, PageContext};
use crate::tools::{names, require_scalar, require_str, ParamKind, ParamSpec, PermissionTier, Tool};

/// Type text into an input field
pub struct FillFormTool {
    browser: Arc<dyn Browser>,
}

impl FillFormTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const FILL_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("selector", ParamKind::String, "CSS selector of the input"),
    ParamSpec::required("text", ParamKind::String, "Text to type into the input"),
    ParamSpec::optional(
        "submit",
        ParamKind::Boolean,
        "Press enter after filling (defaults to false)",
    ),
];

#[async_trait]
impl Tool for FillFormTool {
    fn name(&self) -> &'static str {
        names::FILL_FORM
    }

    fn description(&self) -> &'static str {
        "Fill a form input with text, optionally pressing enter afterwards."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        FILL_PARAMS
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
        // Tag attributes coerce "42" to a number, so accept any scalar here
        let text = require_scalar(args, "text")?;
        let status = self.browser.fill(selector, &text).await?;

        let submit = args.get("submit").and_then(|v| v.as_bool()).unwrap_or(false);
        if submit {
            let submit_status = self.browser.submit(selector).await?;
            return Ok(json!({
                "filled": selector,
                "status": status,
                "submitted": submit_status,
            }));
        }

        Ok(json!({ "filled": selector, "status": status }))
    }
}

/// Choose an option in a select element
pub struct SelectOptionTool {
    browser: Arc<dyn Browser>,
}

impl SelectOptionTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const SELECT_PARAMS: &[ParamSpec] = &[
    ParamSpec::required("selector", ParamKind::String, "CSS selector of the select element"),
    ParamSpec::required("value", ParamKind::String, "Option value to choose"),
];

#[async_trait]
impl Tool for SelectOptionTool {
    fn name(&self) -> &'static str {
        names::SELECT_OPTION
    }

    fn description(&self) -> &'static str {
        "Choose an option in a select element on the current page."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SELECT_PARAMS
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
        let value = require_scalar(args, "value")?;
        let status = self.browser.select_option(selector, &value).await?;
        Ok(json!({ "selected": value, "status": status }))
    }
}

/// Submit a form
pub struct SubmitFormTool {
    browser: Arc<dyn Browser>,
}

impl SubmitFormTool {
    pub fn new(browser: Arc<dyn Browser>) -> Self {
        Self { browser }
    }
}

const SUBMIT_PARAMS: &[ParamSpec] = &[ParamSpec::required(
    "selector",
    ParamKind::String,
    "CSS selector of the form or submit control",
)];

#[async_trait]
impl Tool for SubmitFormTool {
    fn name(&self) -> &'static str {
        names::SUBMIT_FORM
    }

    fn description(&self) -> &'static str {
        "Submit a form on the current page."
    }

    fn parameters(&self) -> &'static [ParamSpec] {
        SUBMIT_PARAMS
    }

    fn tier(&self) -> PermissionTier {
        PermissionTier::Submit
    }

    async fn invoke(
        &self,
        args: &serde_json::Map<String, Value>,
        _ctx: &PageContext,
    ) -> anyhow::Result<Value> {
        let selector = require_str(args, "selector")?;
        let status = self.browser.submit(selector).await?;
        Ok(json!({ "submitted": selector, "status": status }))
    }
}
