//! OpenAI 兼容 API 后端（/chat/completions）
//!
//! 可配置 base_url，支持 OpenAI、DeepSeek、自建代理等。工具往返使用 `tool_calls` 与 `role: tool` 消息，
//! 通过调用 id 关联；后端未给 id 时用 `call_<name>` 兜底。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::conversation::{BackendRole, Part, Turn};
use crate::llm::error::parse_retry_after;
use crate::llm::{BackendRequest, BackendResponse, GenerativeBackend, LlmError, TokenUsage};
use crate::tools::ToolCallRequest;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";

/// OpenAI 兼容客户端：持有 HTTP Client、base_url、API Key 与 model 名
pub struct OpenAiCompatBackend {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    label: String,
}

impl OpenAiCompatBackend {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            base_url: base_url
                .unwrap_or(OPENAI_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key: api_key.into(),
            model: model.to_string(),
            label: "openai".to_string(),
        }
    }

    /// 覆盖日志中的后端名（如 deepseek）
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    fn build_body(&self, request: &BackendRequest) -> Value {
        let mut messages = Vec::new();
        if let Some(system) = request.system_instruction.as_ref().filter(|s| !s.is_empty()) {
            messages.push(json!({"role": "system", "content": system}));
        }
        for turn in &request.turns {
            messages.extend(translate_turn(turn));
        }

        let mut body = json!({
            "model": self.model,
            "messages": messages,
        });
        if !request.tools.is_empty() {
            let tools: Vec<Value> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters_schema(),
                        }
                    })
                })
                .collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }

    fn normalize_response(resp: ChatCompletionResponse) -> Result<BackendResponse, LlmError> {
        let message = resp
            .choices
            .into_iter()
            .next()
            .map(|c| c.message)
            .ok_or_else(|| LlmError::MalformedResponse("No choices in response".to_string()))?;

        let mut out = BackendResponse::text(message.content.unwrap_or_default());
        for tc in message.tool_calls.unwrap_or_default() {
            let args: Value = if tc.function.arguments.trim().is_empty() {
                json!({})
            } else {
                serde_json::from_str(&tc.function.arguments).map_err(|e| {
                    LlmError::MalformedResponse(format!(
                        "Invalid arguments for {}: {e}",
                        tc.function.name
                    ))
                })?
            };
            let mut call = ToolCallRequest::from_value(tc.function.name, args);
            if let Some(id) = tc.id {
                call = call.with_id(id);
            }
            out.tool_calls.push(call);
        }
        if let Some(u) = resp.usage {
            out.usage = Some(TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
            });
        }
        Ok(out)
    }
}

/// 一条 Turn 可能展开为多条 OpenAI 消息（每个工具结果单独一条 tool 消息）
fn translate_turn(turn: &Turn) -> Vec<Value> {
    let text = turn.text();
    match turn.role {
        BackendRole::Model => {
            let tool_calls: Vec<Value> = turn
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::ToolCall { call } => Some(json!({
                        "id": call.call_id(),
                        "type": "function",
                        "function": {
                            "name": call.name,
                            "arguments": Value::Object(call.arguments.clone()).to_string(),
                        }
                    })),
                    _ => None,
                })
                .collect();
            if tool_calls.is_empty() {
                vec![json!({"role": "assistant", "content": text})]
            } else {
                let content = if text.is_empty() { Value::Null } else { Value::String(text) };
                vec![json!({"role": "assistant", "content": content, "tool_calls": tool_calls})]
            }
        }
        BackendRole::User => {
            let mut out: Vec<Value> = turn
                .parts
                .iter()
                .filter_map(|p| match p {
                    Part::ToolResult { call, result } => Some(json!({
                        "role": "tool",
                        "tool_call_id": call.call_id(),
                        "content": result.to_value().to_string(),
                    })),
                    _ => None,
                })
                .collect();
            let has_text = turn.parts.iter().any(|p| matches!(p, Part::Text { .. }));
            if has_text || out.is_empty() {
                out.push(json!({"role": "user", "content": text}));
            }
            out
        }
    }
}

#[async_trait]
impl GenerativeBackend for OpenAiCompatBackend {
    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse, LlmError> {
        let body = self.build_body(request);
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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
            let message = serde_json::from_str::<Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(String::from))
                .unwrap_or(text);
            return Err(LlmError::from_status(status.as_u16(), message, retry_after));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&text)
            .map_err(|e| LlmError::MalformedResponse(format!("Failed to parse response: {e}")))?;
        Self::normalize_response(parsed)
    }

    fn name(&self) -> &str {
        &self.label
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Debug, Deserialize)]
struct ChatToolCall {
    id: Option<String>,
    function: ChatFunctionCall,
}

#[derive(Debug, Deserialize)]
struct ChatFunctionCall {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::{ParamType, ToolCallResult, ToolDeclaration};

    fn backend() -> OpenAiCompatBackend {
        OpenAiCompatBackend::new(None, "test-model", "sk-test", Duration::from_secs(5))
    }

    #[test]
    fn test_build_body_with_tool_exchange() {
        let call = ToolCallRequest::from_value("orderFood", json!({"food_items": "Pizza"}))
            .with_id("call_abc");
        let request = BackendRequest {
            system_instruction: Some("Be calm.".into()),
            turns: vec![
                Turn::user_text("order me a pizza"),
                Turn::model_tool_call("", call.clone()),
                Turn::tool_result(call, ToolCallResult::success(json!({"message": "Order placed"}))),
            ],
            tools: vec![ToolDeclaration::new("orderFood", "Order food").param(
                "food_items",
                ParamType::String,
                "Dishes",
                true,
            )],
        };
        let body = backend().build_body(&request);
        let messages = body["messages"].as_array().unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["role"], "user");
        assert_eq!(messages[2]["role"], "assistant");
        assert!(messages[2]["content"].is_null());
        assert_eq!(messages[2]["tool_calls"][0]["id"], "call_abc");
        assert_eq!(messages[3]["role"], "tool");
        assert_eq!(messages[3]["tool_call_id"], "call_abc");
        assert_eq!(body["tools"][0]["function"]["name"], "orderFood");
    }

    #[test]
    fn test_normalize_parses_argument_strings() {
        let raw = json!({
            "choices": [{"message": {
                "content": null,
                "tool_calls": [{
                    "id": "call_1",
                    "type": "function",
                    "function": {"name": "bookRide", "arguments": "{\"pickup\":\"Home\",\"destination\":\"Gym\"}"}
                }]
            }}],
            "usage": {"prompt_tokens": 7, "completion_tokens": 3, "total_tokens": 10}
        });
        let resp: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        let out = OpenAiCompatBackend::normalize_response(resp).unwrap();
        assert_eq!(out.text, "");
        assert_eq!(out.tool_calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(out.tool_calls[0].arguments["destination"], "Gym");
        assert_eq!(out.usage.unwrap().total(), 10);
    }

    #[test]
    fn test_invalid_arguments_are_malformed() {
        let raw = json!({
            "choices": [{"message": {
                "content": "",
                "tool_calls": [{"id": "c", "function": {"name": "bookRide", "arguments": "{oops"}}]
            }}]
        });
        let resp: ChatCompletionResponse = serde_json::from_value(raw).unwrap();
        assert!(matches!(
            OpenAiCompatBackend::normalize_response(resp),
            Err(LlmError::MalformedResponse(_))
        ));
    }
}
