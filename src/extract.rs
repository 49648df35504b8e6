//! Tool invocation extraction
//!
//! Models answer in one of two shapes: structured tool calls on the API
//! response, or inline tags embedded in the assistant text for models that
//! were never taught the structured protocol. Both shapes normalize into
//! [`ToolInvocation`] so the rest of the loop never cares which one arrived.

use std::collections::{BTreeMap, HashSet};

use fancy_regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;
use uuid::Uuid;

use crate::llm::{ChatResponse, StructuredCall};

/// What the model produced this iteration, before normalization
#[derive(Debug, Clone)]
pub enum RawModelTurn {
    /// Structured tool calls from the API response, used as-is
    StructuredCalls(Vec<StructuredCall>),
    /// Plain assistant text, which may still carry inline tags
    FreeText(String),
}

impl RawModelTurn {
    /// Classify the first choice of a response. Structured calls win over
    /// text when both are present; an absent or empty message is empty text.
    pub fn from_response(response: &ChatResponse) -> Self {
        let Some(choice) = response.choices.first() else {
            return Self::FreeText(String::new());
        };
        if let Some(calls) = &choice.message.tool_calls {
            if !calls.is_empty() {
                return Self::StructuredCalls(calls.clone());
            }
        }
        if choice.message.is_empty() {
            return Self::FreeText(String::new());
        }
        Self::FreeText(choice.message.content.clone().unwrap_or_default())
    }
}

/// A normalized tool call ready for the permission check and executor
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub id: String,
    pub name: String,
    pub arguments: Map<String, Value>,
}

impl ToolInvocation {
    /// Convert structured API calls without filtering against the registry;
    /// unknown names surface as executor error results instead.
    pub fn from_structured(calls: &[StructuredCall]) -> Vec<Self> {
        calls
            .iter()
            .map(|call| Self {
                id: call.id.clone(),
                name: call.function.name.clone(),
                arguments: call.parse_arguments(),
            })
            .collect()
    }

    fn dedup_key(&self) -> String {
        let ordered: BTreeMap<&String, &Value> = self.arguments.iter().collect();
        format!(
            "{}\u{0}{}",
            self.name.to_ascii_lowercase(),
            serde_json::to_string(&ordered).unwrap_or_default()
        )
    }
}

/// Inline-tag parser bound to the set of registered tool names.
///
/// Tags look like `<navigate url="https://example.com"/>` or a paired form
/// whose body may carry a JSON object of extra arguments. Matching is
/// case-insensitive on the tag name; only registered names produce
/// invocations, but anything tag-shaped is stripped from the reply text.
pub struct Extractor {
    names: HashSet<String>,
    self_closing: Regex,
    paired: Regex,
    attr: Regex,
}

const SELF_CLOSING: &str = r#"<([A-Za-z_][\w-]*)((?:\s+[\w-]+\s*=\s*"[^"]*")*)\s*/>"#;
// Backreference keeps nested different-named tags from closing each other
const PAIRED: &str = r#"<([A-Za-z_][\w-]*)((?:\s+[\w-]+\s*=\s*"[^"]*")*)\s*>([\s\S]*?)</\1\s*>"#;
const ATTR: &str = r#"([\w-]+)\s*=\s*"([^"]*)""#;

impl Extractor {
    pub fn new<I, S>(tool_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let names = tool_names
            .into_iter()
            .map(|n| n.as_ref().to_ascii_lowercase())
            .collect();
        Self {
            names,
            // Patterns are fixed literals, compile cannot fail
            self_closing: Regex::new(SELF_CLOSING).unwrap(),
            paired: Regex::new(PAIRED).unwrap(),
            attr: Regex::new(ATTR).unwrap(),
        }
    }

    /// Pull registered tool tags out of assistant text, in document order,
    /// with exact duplicates collapsed to one invocation.
    pub fn extract(&self, text: &str) -> Vec<ToolInvocation> {
        let mut found: Vec<(usize, ToolInvocation)> = Vec::new();

        for caps in self.paired.captures_iter(text).flatten() {
            let whole = caps.get(0).unwrap();
            let name = caps.get(1).unwrap().as_str();
            let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            let body = caps.get(3).map(|m| m.as_str()).unwrap_or("");
            if let Some(inv) = self.build_invocation(name, attrs, Some(body)) {
                found.push((whole.start(), inv));
            }
        }
        for caps in self.self_closing.captures_iter(text).flatten() {
            let whole = caps.get(0).unwrap();
            let name = caps.get(1).unwrap().as_str();
            let attrs = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            if let Some(inv) = self.build_invocation(name, attrs, None) {
                found.push((whole.start(), inv));
            }
        }

        found.sort_by_key(|(start, _)| *start);

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for (_, inv) in found {
            if seen.insert(inv.dedup_key()) {
                out.push(inv);
            } else {
                debug!(tool = %inv.name, "dropping duplicate tag invocation");
            }
        }
        out
    }

    /// Remove everything tag-shaped from the text, registered or not.
    /// Stripping is shape-based so a hallucinated tool name never leaks
    /// raw markup to the user; the registry gate applies to execution only.
    pub fn strip_tags(&self, text: &str) -> String {
        let stripped = self.paired.replace_all(text, "");
        let stripped = self.self_closing.replace_all(&stripped, "");
        stripped.trim().to_string()
    }

    fn build_invocation(
        &self,
        name: &str,
        attrs: &str,
        body: Option<&str>,
    ) -> Option<ToolInvocation> {
        let lowered = name.to_ascii_lowercase();
        if !self.names.contains(&lowered) {
            debug!(tag = name, "ignoring unregistered tag");
            return None;
        }

        let mut arguments = Map::new();
        if let Some(body) = body {
            if let Ok(Value::Object(extra)) = serde_json::from_str::<Value>(body.trim()) {
                arguments.extend(extra);
            }
        }
        // Attributes win over body keys
        for caps in self.attr.captures_iter(attrs).flatten() {
            let key = caps.get(1).unwrap().as_str().to_string();
            let raw = caps.get(2).unwrap().as_str();
            arguments.insert(key, coerce(raw));
        }

        Some(ToolInvocation {
            id: format!("tag-{}", Uuid::new_v4()),
            name: lowered,
            arguments,
        })
    }
}

/// Attribute values are untyped text; map them onto the JSON scalar they
/// spell. Applied uniformly, so a numeric-looking value for a declared
/// string parameter still arrives as a number and tools accept any scalar.
fn coerce(raw: &str) -> Value {
    match raw {
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }
    if let Ok(n) = raw.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = raw.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    Value::String(raw.to_string())
}
