//! Gemini `generateContent` gateway.
//!
//! Serializes the whole conversation plus tool declarations into one
//! `POST /v1beta/models/{model}:generateContent` call and reads the first
//! candidate back. Response parts are decoded into a tagged [`Part`] at the
//! boundary, so nothing downstream inspects loosely-typed JSON.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use toolrelay_core::conversation::{ConversationState, ModelMessage, Turn};
use toolrelay_core::error::GenerationError;
use toolrelay_core::gateway::{GenerationOutcome, ModelGateway};
use toolrelay_core::tool::{ParamSpec, ParamType, ToolArguments, ToolCallRequest, ToolSpec};
use tracing::{debug, warn};

/// Google AI Studio endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// A [`ModelGateway`] backed by the Gemini REST API.
pub struct GeminiGateway {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGateway {
    /// Create a gateway against the public endpoint.
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GenerationError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            client,
        })
    }

    /// Point the gateway at a different host (proxies, tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn endpoint(&self, model: &str) -> String {
        format!("{}/v1beta/models/{model}:generateContent", self.base_url)
    }

    /// Convert the turn log to Gemini `contents`.
    fn to_api_contents(state: &ConversationState) -> Vec<ApiContent> {
        state
            .turns()
            .iter()
            .map(|turn| match turn {
                Turn::User(text) => ApiContent::new("user", Part::Text(text.clone())),
                Turn::Model(ModelMessage::Text(text)) => {
                    ApiContent::new("model", Part::Text(text.clone()))
                }
                Turn::Model(ModelMessage::Call(call)) => {
                    let mut parts: Vec<Part> =
                        call.preamble.iter().cloned().map(Part::Text).collect();
                    parts.push(Part::FunctionCall {
                        call: ApiFunctionCall {
                            name: call.name.clone(),
                            args: call.arguments.clone(),
                        },
                        signature: call.signature.clone(),
                    });
                    ApiContent {
                        role: Some("model".to_string()),
                        parts,
                    }
                }
                // Function responses travel on the user side of the exchange.
                Turn::ToolOutcome { tool_name, result } => ApiContent::new(
                    "user",
                    Part::FunctionResponse(ApiFunctionResponse {
                        name: tool_name.clone(),
                        response: result.to_response_value(),
                    }),
                ),
            })
            .collect()
    }

    /// Convert tool specs to a Gemini `tools` entry.
    fn to_api_tools(tools: &[ToolSpec]) -> Vec<ApiTool> {
        if tools.is_empty() {
            return Vec::new();
        }

        let declarations = tools
            .iter()
            .map(|spec| ApiFunctionDeclaration {
                name: spec.name().to_string(),
                description: spec.description().to_string(),
                parameters: (!spec.parameters().is_empty()).then(|| ApiSchema {
                    schema_type: "OBJECT".into(),
                    description: None,
                    properties: spec
                        .parameters()
                        .iter()
                        .map(|(name, param)| (name.clone(), ApiSchema::property(param)))
                        .collect(),
                    required: spec
                        .required_params()
                        .into_iter()
                        .map(String::from)
                        .collect(),
                }),
            })
            .collect();

        vec![ApiTool {
            function_declarations: declarations,
        }]
    }

    /// Read candidate 0: a function-call part wins, otherwise the text.
    fn interpret(response: ApiResponse) -> Result<GenerationOutcome, GenerationError> {
        let Some(candidate) = response.candidates.into_iter().next() else {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!(" (prompt blocked: {r})"))
                .unwrap_or_default();
            return Err(GenerationError::MalformedResponse(format!(
                "No candidates in response{reason}"
            )));
        };

        let parts = candidate.content.map(|c| c.parts).unwrap_or_default();

        let mut text = String::new();
        for part in parts {
            match part {
                Part::FunctionCall { call, signature } => {
                    let mut request = ToolCallRequest::new(call.name, call.args);
                    if !text.is_empty() {
                        request = request.with_preamble(text);
                    }
                    request.signature = signature;
                    return Ok(GenerationOutcome::RequestedCall(request));
                }
                Part::Text(t) => text.push_str(&t),
                Part::Thought(_) | Part::FunctionResponse(_) | Part::Other => {}
            }
        }

        if text.is_empty() {
            debug!(finish_reason = ?candidate.finish_reason, "Candidate carried no text");
        }

        Ok(GenerationOutcome::FinalAnswer(text))
    }
}

#[async_trait]
impl ModelGateway for GeminiGateway {
    fn name(&self) -> &str {
        "gemini"
    }

    async fn generate(
        &self,
        state: &ConversationState,
        tools: &[ToolSpec],
        model: &str,
    ) -> Result<GenerationOutcome, GenerationError> {
        let body = ApiRequest {
            contents: Self::to_api_contents(state),
            tools: Self::to_api_tools(tools),
        };

        debug!(
            model = %model,
            turns = state.len(),
            tools = tools.len(),
            "Sending generateContent request"
        );

        let response = self
            .client
            .post(self.endpoint(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Network(e.to_string()))?;

        let status = response.status().as_u16();

        if status == 429 {
            let retry_after_secs = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok())
                .unwrap_or(5);
            return Err(GenerationError::RateLimited { retry_after_secs });
        }

        if status == 401 || status == 403 {
            return Err(GenerationError::Authentication(
                "Invalid API key or insufficient permissions".into(),
            ));
        }

        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Model backend returned error");
            return Err(GenerationError::Api {
                status_code: status,
                message: error_body,
            });
        }

        let api_response: ApiResponse = response.json().await.map_err(|e| {
            GenerationError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        Self::interpret(api_response)
    }
}

// --- Wire types ---

#[derive(Debug, Serialize)]
struct ApiRequest {
    contents: Vec<ApiContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<ApiTool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

impl ApiContent {
    fn new(role: &str, part: Part) -> Self {
        Self {
            role: Some(role.to_string()),
            parts: vec![part],
        }
    }
}

/// One content part, as a closed set of shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "RawPart", into = "RawPart")]
enum Part {
    Text(String),
    /// Thought summary; never part of the answer.
    Thought(String),
    /// A call plus the `thoughtSignature` sent next to it.
    FunctionCall {
        call: ApiFunctionCall,
        signature: Option<String>,
    },
    FunctionResponse(ApiFunctionResponse),
    /// Inline data, code execution results, and anything newer.
    Other,
}

/// Flat JSON shape of a part. Only used to get in and out of [`Part`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_call: Option<ApiFunctionCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    function_response: Option<ApiFunctionResponse>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

impl From<RawPart> for Part {
    fn from(raw: RawPart) -> Self {
        if let Some(call) = raw.function_call {
            return Part::FunctionCall {
                call,
                signature: raw.thought_signature,
            };
        }
        if let Some(response) = raw.function_response {
            return Part::FunctionResponse(response);
        }
        match raw.text {
            Some(text) if raw.thought == Some(true) => Part::Thought(text),
            Some(text) => Part::Text(text),
            None => Part::Other,
        }
    }
}

impl From<Part> for RawPart {
    fn from(part: Part) -> Self {
        match part {
            Part::Text(text) => RawPart {
                text: Some(text),
                ..RawPart::default()
            },
            Part::Thought(text) => RawPart {
                text: Some(text),
                thought: Some(true),
                ..RawPart::default()
            },
            Part::FunctionCall { call, signature } => RawPart {
                function_call: Some(call),
                thought_signature: signature,
                ..RawPart::default()
            },
            Part::FunctionResponse(response) => RawPart {
                function_response: Some(response),
                ..RawPart::default()
            },
            Part::Other => RawPart::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiFunctionCall {
    name: String,
    #[serde(default)]
    args: ToolArguments,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ApiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiTool {
    function_declarations: Vec<ApiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct ApiFunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<ApiSchema>,
}

#[derive(Debug, Serialize)]
struct ApiSchema {
    #[serde(rename = "type")]
    schema_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    properties: BTreeMap<String, ApiSchema>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    required: Vec<String>,
}

impl ApiSchema {
    fn property(param: &ParamSpec) -> Self {
        let schema_type = match param.param_type {
            ParamType::String => "STRING",
            ParamType::Integer => "INTEGER",
            ParamType::Number => "NUMBER",
            ParamType::Boolean => "BOOLEAN",
        };
        Self {
            schema_type: schema_type.into(),
            description: Some(param.description.clone()),
            properties: BTreeMap::new(),
            required: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResponse {
    #[serde(default)]
    candidates: Vec<ApiCandidate>,
    #[serde(default)]
    prompt_feedback: Option<ApiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiCandidate {
    #[serde(default)]
    content: Option<ApiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiPromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}
