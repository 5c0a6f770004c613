//! Tool declarations, the registry, and the tool-client seam.
//!
//! A [`ToolSpec`] is pure data: a name, a description, and a typed parameter
//! schema. The [`ToolRegistry`] holds the specs offered to the model and is
//! read-only once a request starts. Arguments the model sends back are
//! decoded exactly once, by [`ToolSpec::validate`], into [`ValidatedArgs`];
//! only validated values ever reach a [`ToolClient`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

use crate::error::{RegistryError, ToolError};

/// Raw argument object as sent by the model.
pub type ToolArguments = serde_json::Map<String, serde_json::Value>;

/// The declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
}

impl ParamType {
    /// Decode a JSON value against this type, or `None` on a mismatch.
    fn decode(self, value: &serde_json::Value) -> Option<ArgValue> {
        match self {
            Self::String => value.as_str().map(|s| ArgValue::String(s.to_string())),
            Self::Integer => value
                .as_i64()
                .or_else(|| {
                    // Some backends emit integers as `3.0`.
                    value
                        .as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(ArgValue::Integer),
            Self::Number => value.as_f64().map(ArgValue::Number),
            Self::Boolean => value.as_bool().map(ArgValue::Boolean),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Schema of a single tool parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamSpec {
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl ParamSpec {
    pub fn required(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(param_type: ParamType, description: impl Into<String>) -> Self {
        Self {
            param_type,
            description: description.into(),
            required: false,
        }
    }
}

/// A callable function the model may request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    name: String,
    description: String,
    parameters: BTreeMap<String, ParamSpec>,
}

impl ToolSpec {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: BTreeMap::new(),
        }
    }

    /// Add a parameter. Declaring the same name twice keeps the last one.
    pub fn with_param(mut self, name: impl Into<String>, spec: ParamSpec) -> Self {
        self.parameters.insert(name.into(), spec);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Parameters ordered by name.
    pub fn parameters(&self) -> &BTreeMap<String, ParamSpec> {
        &self.parameters
    }

    /// Names of the required parameters, in name order.
    pub fn required_params(&self) -> Vec<&str> {
        self.parameters
            .iter()
            .filter(|(_, p)| p.required)
            .map(|(n, _)| n.as_str())
            .collect()
    }

    /// Check raw model arguments against this schema.
    ///
    /// Every required parameter must be present, non-null and of the declared
    /// type; required strings must also be non-blank. Optional parameters are
    /// type-checked when present. Undeclared arguments are dropped.
    pub fn validate(&self, arguments: &ToolArguments) -> Result<ValidatedArgs, ToolError> {
        let mut values = BTreeMap::new();

        for (name, param) in &self.parameters {
            let raw = match arguments.get(name) {
                None | Some(serde_json::Value::Null) => {
                    if param.required {
                        return Err(ToolError::Validation(format!(
                            "{}: missing required parameter '{name}'",
                            self.name
                        )));
                    }
                    continue;
                }
                Some(raw) => raw,
            };

            let value = param.param_type.decode(raw).ok_or_else(|| {
                ToolError::Validation(format!(
                    "{}: parameter '{name}' must be {}, got {}",
                    self.name,
                    param.param_type.as_str(),
                    json_type_name(raw)
                ))
            })?;

            if param.required && matches!(&value, ArgValue::String(s) if s.trim().is_empty()) {
                return Err(ToolError::Validation(format!(
                    "{}: required parameter '{name}' must not be empty",
                    self.name
                )));
            }

            values.insert(name.clone(), value);
        }

        for extra in arguments.keys().filter(|k| !self.parameters.contains_key(*k)) {
            warn!(tool = %self.name, argument = %extra, "Dropping undeclared tool argument");
        }

        Ok(ValidatedArgs(values))
    }
}

/// A typed, already-validated argument value.
#[derive(Debug, Clone, PartialEq)]
pub enum ArgValue {
    String(String),
    Integer(i64),
    Number(f64),
    Boolean(bool),
}

impl ArgValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
        }
    }
}

/// Arguments that passed [`ToolSpec::validate`], ordered by parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidatedArgs(BTreeMap<String, ArgValue>);

impl ValidatedArgs {
    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArgValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Name of the requested tool
    pub name: String,

    /// Arguments exactly as the model sent them
    #[serde(default)]
    pub arguments: ToolArguments,

    /// Text the model emitted in the same response, ahead of the call
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preamble: Option<String>,

    /// Opaque backend token attached to the call. Sent back unchanged
    /// whenever the call is replayed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: ToolArguments) -> Self {
        Self {
            name: name.into(),
            arguments,
            preamble: None,
            signature: None,
        }
    }

    pub fn with_preamble(mut self, text: impl Into<String>) -> Self {
        self.preamble = Some(text.into());
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }
}

impl fmt::Display for ToolCallRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = serde_json::Value::Object(self.arguments.clone());
        write!(f, "{}({args})", self.name)
    }
}

/// The result of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    /// The tool answered; `payload` is its decoded response body.
    Success { payload: serde_json::Value },
    /// The call never produced a payload.
    Failure { error: ToolError },
}

impl ToolResult {
    pub fn success(payload: serde_json::Value) -> Self {
        Self::Success { payload }
    }

    pub fn failure(error: ToolError) -> Self {
        Self::Failure { error }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn payload(&self) -> Option<&serde_json::Value> {
        match self {
            Self::Success { payload } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&ToolError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }

    /// The object handed back to the model as the function response.
    pub fn to_response_value(&self) -> serde_json::Value {
        match self {
            Self::Success { payload } => serde_json::json!({ "result": payload }),
            Self::Failure { error } => serde_json::json!({
                "error": {
                    "kind": error.kind(),
                    "message": error.to_string(),
                }
            }),
        }
    }
}

/// Executes tool calls against wherever the tool actually lives.
///
/// Implementations validate `arguments` against `spec` before doing any I/O
/// and report every failure through [`ToolResult::Failure`]: invoking a tool
/// never fails the caller.
#[async_trait]
pub trait ToolClient: Send + Sync {
    async fn invoke(&self, spec: &ToolSpec, arguments: &ToolArguments) -> ToolResult;
}

/// What to do when the model asks for another tool after the round-trip
/// limit has been used up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExcessCallPolicy {
    /// Finish the request and hand the undispatched call back to the caller.
    #[default]
    Surface,
    /// Fail the request.
    Fail,
}

/// The set of tools offered to the model.
///
/// Built once before any request and shared read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. Names are unique.
    pub fn register(&mut self, spec: ToolSpec) -> Result<(), RegistryError> {
        if self.tools.contains_key(spec.name()) {
            return Err(RegistryError::DuplicateTool(spec.name().to_string()));
        }
        self.tools.insert(spec.name().to_string(), spec);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<&ToolSpec, RegistryError> {
        self.tools
            .get(name)
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    /// All specs, ordered by name, for inclusion in a generation request.
    pub fn describe_all(&self) -> Vec<ToolSpec> {
        self.tools.values().cloned().collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
