use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Description of a tool the reasoning capability may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique name, e.g. "create_project".
    pub name: String,
    /// Human-readable description for the LLM.
    pub description: String,
    /// Ordered parameter list. Identity is never part of it.
    pub parameters: Vec<ParamSpec>,
}

/// One typed, possibly-optional tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub required: bool,
    pub description: String,
}

/// The value shape a parameter accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParamKind {
    String,
    Integer {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<i64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<i64>,
    },
    Number,
    /// Calendar date in `YYYY-MM-DD` form.
    Date,
    StringList,
    Enum { values: Vec<String> },
}

impl ToolDefinition {
    /// Render the parameter list as a JSON Schema object.
    pub fn json_schema(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::new();

        for param in &self.parameters {
            let mut schema = match &param.kind {
                ParamKind::String => json!({ "type": "string" }),
                ParamKind::Integer { min, max } => {
                    let mut s = json!({ "type": "integer" });
                    if let Some(min) = min {
                        s["minimum"] = json!(min);
                    }
                    if let Some(max) = max {
                        s["maximum"] = json!(max);
                    }
                    s
                }
                ParamKind::Number => json!({ "type": "number" }),
                ParamKind::Date => json!({ "type": "string", "format": "date" }),
                ParamKind::StringList => json!({ "type": "array", "items": { "type": "string" } }),
                ParamKind::Enum { values } => json!({ "type": "string", "enum": values }),
            };
            schema["description"] = json!(param.description);
            properties.insert(param.name.clone(), schema);
            if param.required {
                required.push(Value::String(param.name.clone()));
            }
        }

        json!({
            "type": "object",
            "properties": properties,
            "required": required,
            "additionalProperties": false,
        })
    }

    pub fn param(&self, name: &str) -> Option<&ParamSpec> {
        self.parameters.iter().find(|p| p.name == name)
    }
}

/// A request from the reasoning step to call a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub tool_name: String,
    /// Normally a JSON object. Anything else is treated as malformed output
    /// when the call is executed.
    pub arguments: Value,
}

/// The outcome of a single tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub tool_name: String,
    pub outcome: ToolOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum ToolOutcome {
    /// Backend response body.
    Payload(Value),
    /// Error detail for the reasoning step; never shown to the user directly.
    Error(String),
}

impl ToolResult {
    pub fn success(call: &ToolCall, payload: Value) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::Payload(payload),
        }
    }

    pub fn error(call: &ToolCall, detail: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            tool_name: call.tool_name.clone(),
            outcome: ToolOutcome::Error(detail.into()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, ToolOutcome::Error(_))
    }

    /// Text form handed back to the reasoning capability.
    pub fn content(&self) -> String {
        match &self.outcome {
            ToolOutcome::Payload(value) => value.to_string(),
            ToolOutcome::Error(detail) => format!("Error: {detail}"),
        }
    }
}
