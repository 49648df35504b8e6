//! Message and wire types for the chat-completion transport
//!
//! The wire shape follows the OpenAI chat-completions format: role-tagged
//! messages, structured tool calls carrying their arguments as a JSON string,
//! and a `choices` array in the response.

use serde::{Deserialize, Serialize};

/// Message role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<StructuredCall>,
    /// Set on `Tool`-role messages to correlate the result with its call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant turn carrying structured tool calls (content may be empty)
    pub fn assistant_with_calls(content: Option<String>, calls: Vec<StructuredCall>) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    /// `Tool`-role result turn keyed to the originating call id
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }
}

/// A structured tool call as returned by the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredCall {
    pub id: String,
    #[serde(rename = "type", default = "function_call_type")]
    pub call_type: String,
    pub function: FunctionCall,
}

fn function_call_type() -> String {
    "function".to_string()
}

/// The function half of a structured call; arguments arrive as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String,
}

impl StructuredCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            call_type: function_call_type(),
            function: FunctionCall {
                name: name.into(),
                arguments: arguments.into(),
            },
        }
    }

    /// Parse the argument JSON string into a map.
    ///
    /// Malformed arguments degrade to an empty map rather than failing the
    /// turn; the tool sees no arguments and reports its own error.
    pub fn parse_arguments(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::from_str::<serde_json::Value>(&self.function.arguments) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// Tool schema advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    #[serde(rename = "type")]
    pub schema_type: String,
    pub function: FunctionSchema,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSchema {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            schema_type: "function".to_string(),
            function: FunctionSchema {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Chat-completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Choice {
    pub message: ResponseMessage,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The assistant message inside a response choice
#[derive(Debug, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<StructuredCall>>,
}

impl ResponseMessage {
    /// True when the message carries neither text nor structured calls
    pub fn is_empty(&self) -> bool {
        let no_text = self.content.as_deref().map_or(true, |c| c.trim().is_empty());
        let no_calls = self.tool_calls.as_ref().map_or(true, |c| c.is_empty());
        no_text && no_calls
    }
}

/// Errors from the chat transport
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The provider rejected the tool schema; the caller should retry without it
    #[error("provider rejected the tool schema")]
    ToolSchemaRejected,

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_helpers_set_roles() {
        assert_eq!(Message::user("hi").role, Role::User);
        assert_eq!(Message::assistant("yo").role, Role::Assistant);
        let result = Message::tool_result("call_1", "{}");
        assert_eq!(result.role, Role::Tool);
        assert_eq!(result.tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn malformed_arguments_degrade_to_empty_map() {
        let call = StructuredCall::new("c1", "click", "{not json");
        assert!(call.parse_arguments().is_empty());

        // Non-object JSON is also treated as no arguments
        let call = StructuredCall::new("c2", "click", "[1, 2]");
        assert!(call.parse_arguments().is_empty());
    }

    #[test]
    fn arguments_round_trip() {
        let args = serde_json::json!({"selector": "#buy", "count": 2, "force": true});
        let call = StructuredCall::new("c1", "click", args.to_string());
        let parsed = call.parse_arguments();
        assert_eq!(serde_json::Value::Object(parsed), args);
    }

    #[test]
    fn deserialize_response_with_tool_calls() {
        let json = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "navigate", "arguments": "{\"url\":\"https://example.com\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;

        let response: ChatResponse = serde_json::from_str(json).unwrap();
        let msg = &response.choices[0].message;
        let calls = msg.tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].function.name, "navigate");
        assert!(!msg.is_empty());
    }

    #[test]
    fn empty_message_detection() {
        let msg = ResponseMessage {
            content: Some("   ".to_string()),
            tool_calls: None,
        };
        assert!(msg.is_empty());
    }
}
