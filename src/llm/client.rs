//! Chat transport: the narrow contract to the language-model provider
//!
//! The agent loop only ever talks to [`ChatTransport`]. A reference
//! implementation for OpenAI-compatible endpoints is provided; anything else
//! (local gateways, extension messaging bridges) implements the same trait.

use async_trait::async_trait;
use serde_json::json;
use tracing::{debug, warn};

use crate::llm::types::{ChatResponse, Message, ToolSchema, TransportError};

/// One chat completion round-trip.
///
/// Implementations must signal a provider that rejects the tool schema with
/// [`TransportError::ToolSchemaRejected`] so the loop can retry schema-less;
/// every other error is fatal to the current run.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, TransportError>;
}

/// Reference transport for OpenAI-compatible `/chat/completions` endpoints
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl HttpTransport {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            model: model.into(),
        }
    }

    /// Build a transport from the environment (`.env` honored).
    ///
    /// Reads `TABPILOT_API_KEY`, with `TABPILOT_BASE_URL` and `TABPILOT_MODEL`
    /// falling back to the given defaults.
    pub fn from_env(default_base_url: &str, default_model: &str) -> anyhow::Result<Self> {
        let _ = dotenvy::dotenv();
        let api_key = std::env::var("TABPILOT_API_KEY")
            .map_err(|_| anyhow::anyhow!("TABPILOT_API_KEY is not set"))?;
        let base_url =
            std::env::var("TABPILOT_BASE_URL").unwrap_or_else(|_| default_base_url.to_string());
        let model = std::env::var("TABPILOT_MODEL").unwrap_or_else(|_| default_model.to_string());
        Ok(Self::new(base_url, api_key, model))
    }
}

#[async_trait]
impl ChatTransport for HttpTransport {
    async fn chat(
        &self,
        messages: &[Message],
        tools: &[ToolSchema],
    ) -> Result<ChatResponse, TransportError> {
        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !tools.is_empty() {
            body["tools"] = serde_json::to_value(tools)
                .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
            body["tool_choice"] = json!("auto");
        }

        debug!(model = %self.model, tools = tools.len(), "chat request");

        let response = self
            .client
            .post(format!(
                "{}/chat/completions",
                self.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| {
                    v.pointer("/error/message")
                        .and_then(|m| m.as_str())
                        .map(String::from)
                })
                .unwrap_or(text);

            // Providers without function-calling support reject the `tools`
            // parameter with a 400 naming it; that is the fallback signal.
            if status.as_u16() == 400
                && !tools.is_empty()
                && (message.contains("tool") || message.contains("function"))
            {
                warn!("provider rejected tool schema, signalling fallback");
                return Err(TransportError::ToolSchemaRejected);
            }

            return Err(TransportError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| TransportError::InvalidResponse(e.to_string()))?;
        Ok(parsed)
    }
}
