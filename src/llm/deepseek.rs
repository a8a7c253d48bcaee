//! DeepSeek 后端（OpenAI 兼容格式）
//!
//! - Base URL: https://api.deepseek.com
//! - 模型: deepseek-chat（支持工具调用）

use std::time::Duration;

use crate::llm::OpenAiCompatBackend;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 创建 DeepSeek 后端；model 为 None 时使用 deepseek-chat
pub fn create_deepseek_backend(
    api_key: impl Into<String>,
    model: Option<&str>,
    timeout: Duration,
) -> OpenAiCompatBackend {
    OpenAiCompatBackend::new(
        Some(DEEPSEEK_BASE_URL),
        model.unwrap_or(DEEPSEEK_CHAT),
        api_key,
        timeout,
    )
    .with_label("deepseek")
}
