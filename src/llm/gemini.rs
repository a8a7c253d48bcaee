//! Google Gemini 后端（generateContent）
//!
//! 对话 -> `contents`（role 为 user / model），工具声明 -> `tools[].functionDeclarations`，
//! 工具往返使用 `functionCall` / `functionResponse` 片段。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::conversation::{BackendRole, Part, Turn};
use crate::llm::error::parse_retry_after;
use crate::llm::{BackendRequest, BackendResponse, GenerativeBackend, LlmError, TokenUsage};
use crate::tools::ToolCallRequest;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const GEMINI_DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Gemini 客户端：持有 HTTP Client、API Key 与模型名
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiBackend {
    pub fn new(api_key: impl Into<String>, model: &str, base_url: Option<&str>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.into(),
            model: model.to_string(),
            base_url: base_url
                .unwrap_or(GEMINI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn translate_request(request: &BackendRequest) -> GeminiRequest {
        let system_instruction = request
            .system_instruction
            .as_ref()
            .filter(|s| !s.is_empty())
            .map(|s| GeminiContent {
                role: None,
                parts: vec![GeminiPart::Text { text: s.clone() }],
            });

        let contents = request.turns.iter().map(translate_turn).collect();

        let tools = if request.tools.is_empty() {
            None
        } else {
            Some(vec![GeminiTool {
                function_declarations: request
                    .tools
                    .iter()
                    .map(|t| GeminiFunctionDeclaration {
                        name: t.name.clone(),
                        description: t.description.clone(),
                        parameters: t.parameters_schema(),
                    })
                    .collect(),
            }])
        };

        GeminiRequest {
            contents,
            system_instruction,
            tools,
        }
    }

    fn normalize_response(resp: GeminiResponse) -> Result<BackendResponse, LlmError> {
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| LlmError::MalformedResponse("No candidates in response".to_string()))?;
        let content = candidate.content.ok_or_else(|| {
            LlmError::MalformedResponse(format!(
                "Candidate has no content (finish reason: {})",
                candidate.finish_reason.as_deref().unwrap_or("unknown")
            ))
        })?;

        let mut out = BackendResponse::default();
        for part in content.parts {
            match part {
                GeminiPart::Text { text } => out.text.push_str(&text),
                GeminiPart::FunctionCall { function_call } => {
                    out.tool_calls.push(ToolCallRequest::from_value(
                        function_call.name,
                        function_call.args,
                    ));
                }
                _ => {}
            }
        }
        if let Some(u) = resp.usage_metadata {
            out.usage = Some(TokenUsage {
                prompt_tokens: u.prompt_token_count,
                completion_tokens: u.candidates_token_count,
            });
        }
        Ok(out)
    }
}

fn translate_turn(turn: &Turn) -> GeminiContent {
    let role = match turn.role {
        BackendRole::User => "user",
        BackendRole::Model => "model",
    };
    let parts = turn
        .parts
        .iter()
        .map(|p| match p {
            Part::Text { text } => GeminiPart::Text { text: text.clone() },
            Part::ToolCall { call } => GeminiPart::FunctionCall {
                function_call: GeminiFunctionCall {
                    name: call.name.clone(),
                    args: Value::Object(call.arguments.clone()),
                },
            },
            Part::ToolResult { call, result } => GeminiPart::FunctionResponse {
                function_response: GeminiFunctionResponse {
                    name: call.name.clone(),
                    response: result.to_value(),
                },
            },
        })
        .collect();
    GeminiContent {
        role: Some(role.to_string()),
        parts,
    }
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse, LlmError> {
        let body = Self::translate_request(request);
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::from_transport(&e))?;

        let status = response.status();
        let retry_after = parse_retry_after(response.headers());
        let text = response
            .text()
            .await
            .map_err(|e| LlmError::Network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            let message = serde_json::from_str::<GeminiErrorResponse>(&text)
                .map(|e| e.error.message)
                .unwrap_or(text);
            return Err(LlmError::from_status(status.as_u16(), message, retry_after));
        }

        let parsed: GeminiResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(format!("Failed to parse response: {e}")))?;
        Self::normalize_response(parsed)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// Gemini API 报文

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
    Other(Map<String, Value>),
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    #[serde(default)]
    args: Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}
