//! LLM 层：生成式后端抽象与实现（Gemini / OpenAI 兼容 / DeepSeek / Mock）与重试装饰器

pub mod deepseek;
pub mod error;
pub mod gemini;
pub mod mock;
pub mod openai;
pub mod retry;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

pub use deepseek::{create_deepseek_backend, DEEPSEEK_BASE_URL, DEEPSEEK_CHAT};
pub use error::LlmError;
pub use gemini::{GeminiBackend, GEMINI_DEFAULT_MODEL};
pub use mock::MockBackend;
pub use openai::{OpenAiCompatBackend, OPENAI_DEFAULT_MODEL};
pub use retry::{RetryConfig, RetryingBackend};
pub use traits::{BackendRequest, BackendResponse, GenerativeBackend, TokenUsage};

use crate::config::AppConfig;

/// 根据配置创建后端，API Key 从环境变量读取；缺少 Key 时回退到 Mock 并告警
pub fn create_backend_from_config(cfg: &AppConfig) -> Arc<dyn GenerativeBackend> {
    let key_var = match cfg.llm.provider.as_str() {
        "gemini" => Some("GEMINI_API_KEY"),
        "openai" => Some("OPENAI_API_KEY"),
        "deepseek" => Some("DEEPSEEK_API_KEY"),
        _ => None,
    };
    let api_key = key_var.and_then(|v| std::env::var(v).ok()).filter(|k| !k.is_empty());
    build_backend(cfg, api_key)
}

/// 由配置与显式 API Key 构建后端；retry.max_retries > 0 时包一层 RetryingBackend
pub fn build_backend(cfg: &AppConfig, api_key: Option<String>) -> Arc<dyn GenerativeBackend> {
    let timeout = Duration::from_secs(cfg.llm.timeouts.request);
    let model = cfg.llm.model.as_deref();
    let base_url = cfg.llm.base_url.as_deref();

    let backend: Arc<dyn GenerativeBackend> = match (cfg.llm.provider.as_str(), api_key) {
        ("mock", _) => return Arc::new(MockBackend::echo()),
        ("gemini", Some(key)) => Arc::new(GeminiBackend::new(
            key,
            model.unwrap_or(GEMINI_DEFAULT_MODEL),
            base_url,
            timeout,
        )),
        ("openai", Some(key)) => Arc::new(OpenAiCompatBackend::new(
            base_url,
            model.unwrap_or(OPENAI_DEFAULT_MODEL),
            key,
            timeout,
        )),
        ("deepseek", Some(key)) => Arc::new(create_deepseek_backend(key, model, timeout)),
        (provider @ ("gemini" | "openai" | "deepseek"), None) => {
            tracing::warn!(provider = %provider, "API key not set, falling back to mock backend");
            return Arc::new(MockBackend::echo());
        }
        (other, _) => {
            tracing::warn!(provider = %other, "unknown llm provider, falling back to mock backend");
            return Arc::new(MockBackend::echo());
        }
    };

    let retry = cfg.llm.retry.to_retry_config();
    if retry.max_retries > 0 {
        Arc::new(RetryingBackend::new(backend, retry))
    } else {
        backend
    }
}
