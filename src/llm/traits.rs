//! 生成式后端抽象
//!
//! 所有后端（Gemini / OpenAI 兼容 / DeepSeek / Mock）实现 GenerativeBackend：
//! 输入对话（历史 + 当前轮次 + 已有工具往返）与工具声明，输出文本或若干工具调用请求。

use async_trait::async_trait;
use serde::Serialize;

use crate::conversation::Turn;
use crate::llm::LlmError;
use crate::tools::{ToolCallRequest, ToolDeclaration};

/// 一次往返发送给后端的内容
#[derive(Clone, Debug, Default, Serialize)]
pub struct BackendRequest {
    pub system_instruction: Option<String>,
    pub turns: Vec<Turn>,
    pub tools: Vec<ToolDeclaration>,
}

/// Token 使用统计（单次响应）
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

impl TokenUsage {
    pub fn total(&self) -> u64 {
        self.prompt_tokens + self.completion_tokens
    }
}

/// 后端响应：文本与工具调用请求（可同时存在）
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BackendResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCallRequest>,
    pub usage: Option<TokenUsage>,
}

impl BackendResponse {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn tool_call(call: ToolCallRequest) -> Self {
        Self::tool_calls(vec![call])
    }

    pub fn tool_calls(calls: Vec<ToolCallRequest>) -> Self {
        Self {
            tool_calls: calls,
            ..Default::default()
        }
    }
}

/// 生成式后端 trait：单次非流式请求/响应
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse, LlmError>;

    /// 后端名称（日志用）
    fn name(&self) -> &str;
}
