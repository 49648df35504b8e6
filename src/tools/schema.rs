//! Parameter specs and JSON schema generation for tool definitions

use serde_json::{json, Value};

/// Scalar parameter kinds supported by tool schemas
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Boolean,
}

impl ParamKind {
    fn json_type(self) -> &'static str {
        match self {
            ParamKind::String => "string",
            ParamKind::Number => "number",
            ParamKind::Boolean => "boolean",
        }
    }
}

/// A single declared parameter of a tool
#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub kind: ParamKind,
    pub required: bool,
    /// Closed set of accepted values, rendered as a JSON-schema enum
    pub choices: Option<&'static [&'static str]>,
}

impl ParamSpec {
    pub const fn required(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind,
            required: true,
            choices: None,
        }
    }

    pub const fn optional(name: &'static str, kind: ParamKind, description: &'static str) -> Self {
        Self {
            name,
            description,
            kind,
            required: false,
            choices: None,
        }
    }

    pub const fn with_choices(mut self, choices: &'static [&'static str]) -> Self {
        self.choices = Some(choices);
        self
    }
}

/// Render a parameter list as a JSON-schema object for the wire
pub fn object_schema(params: &[ParamSpec]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();

    for param in params {
        let mut prop = json!({
            "type": param.kind.json_type(),
            "description": param.description,
        });
        if let Some(choices) = param.choices {
            prop["enum"] = json!(choices);
        }
        properties.insert(param.name.to_string(), prop);
        if param.required {
            required.push(param.name);
        }
    }

    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_object_schema() {
        const PARAMS: &[ParamSpec] = &[
            ParamSpec::required("url", ParamKind::String, "Target URL"),
            ParamSpec::optional("new_tab", ParamKind::Boolean, "Open in a new tab"),
        ];

        let schema = object_schema(PARAMS);
        assert_eq!(schema["type"], "object");
        assert_eq!(schema["properties"]["url"]["type"], "string");
        assert_eq!(schema["properties"]["new_tab"]["type"], "boolean");
        assert_eq!(schema["required"], json!(["url"]));
    }

    #[test]
    fn renders_choices_as_enum() {
        const PARAMS: &[ParamSpec] = &[ParamSpec::required(
            "direction",
            ParamKind::String,
            "Scroll direction",
        )
        .with_choices(&["up", "down"])];

        let schema = object_schema(PARAMS);
        assert_eq!(schema["properties"]["direction"]["enum"], json!(["up", "down"]));
    }
}
