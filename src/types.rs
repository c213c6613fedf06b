use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::error::{RelayError, Result};

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: String, // "function"
    pub function: FunctionCall,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: String, // raw JSON string
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// The assistant turn that requested `call`; must precede the matching tool message.
    pub fn assistant_function_call(call: &FunctionCallRequest) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: Some(vec![call.to_tool_call()]),
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(content.into()),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    pub fn requests_call(&self, call_id: &str) -> bool {
        self.role == Role::Assistant
            && self
                .tool_calls
                .as_ref()
                .is_some_and(|calls| calls.iter().any(|c| c.id == call_id))
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Number,
    Integer,
    String,
    Boolean,
}

#[derive(Clone, Debug, PartialEq)]
pub struct ParameterSpec {
    pub name: &'static str,
    pub kind: ParamType,
    pub description: &'static str,
    pub required: bool,
}

/// A function the model may ask us to run.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionDescriptor {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterSpec>,
}

impl FunctionDescriptor {
    pub fn required_parameters(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.parameters.iter().filter(|p| p.required).map(|p| p.name)
    }

    /// Required parameters absent (or null) in `arguments`.
    pub fn missing_required(&self, arguments: &Map<String, Value>) -> Vec<&'static str> {
        self.required_parameters()
            .filter(|name| arguments.get(*name).is_none_or(Value::is_null))
            .collect()
    }

    /// Entry for the `tools` array of a chat completion request.
    pub fn to_tool_schema(&self) -> Value {
        let properties: Map<String, Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.to_string(),
                    json!({ "type": p.kind, "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self.required_parameters().collect();

        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": {
                    "type": "object",
                    "properties": properties,
                    "required": required,
                    "additionalProperties": false
                }
            }
        })
    }
}

/// A model-issued request to run one of the declared functions.
#[derive(Clone, Debug, PartialEq)]
pub struct FunctionCallRequest {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

impl FunctionCallRequest {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decodes `arguments` as a JSON object. An empty string counts as `{}`.
    pub fn parsed_arguments(&self) -> std::result::Result<Map<String, Value>, String> {
        if self.arguments.trim().is_empty() {
            return Ok(Map::new());
        }
        match serde_json::from_str::<Value>(&self.arguments) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(format!("expected a JSON object, got {}", other)),
            Err(e) => Err(e.to_string()),
        }
    }

    pub fn to_tool_call(&self) -> ToolCall {
        ToolCall {
            id: self.id.clone(),
            call_type: "function".to_string(),
            function: FunctionCall {
                name: self.name.clone(),
                arguments: self.arguments.clone(),
            },
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum CompletionResult {
    TextReply { content: String },
    FunctionCallReply { call: FunctionCallRequest },
}

/// Sampling temperatures the relay accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Temperature {
    Precise,
    Balanced,
    Creative,
}

impl Temperature {
    pub const ALLOWED: [Temperature; 3] = [
        Temperature::Precise,
        Temperature::Balanced,
        Temperature::Creative,
    ];

    pub fn as_f64(self) -> f64 {
        match self {
            Temperature::Precise => 0.2,
            Temperature::Balanced => 0.7,
            Temperature::Creative => 0.9,
        }
    }
}

impl TryFrom<f64> for Temperature {
    type Error = RelayError;

    fn try_from(value: f64) -> Result<Self> {
        Self::ALLOWED
            .into_iter()
            .find(|t| (t.as_f64() - value).abs() < 1e-9)
            .ok_or_else(|| {
                RelayError::Validation(format!(
                    "temperature must be one of 0.2, 0.7 or 0.9 (got {})",
                    value
                ))
            })
    }
}

/// Per-request knobs for one completion call.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionSettings {
    pub model: String,
    pub temperature: Temperature,
}

impl CompletionSettings {
    pub fn new(model: impl Into<String>, temperature: f64) -> Result<Self> {
        let model = model.into();
        if model.trim().is_empty() {
            return Err(RelayError::Validation("model must not be empty".to_string()));
        }
        Ok(Self {
            model,
            temperature: Temperature::try_from(temperature)?,
        })
    }
}
