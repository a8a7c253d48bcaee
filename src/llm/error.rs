//! 后端错误分类
//!
//! 编排循环把任何 LlmError 都视为 BackendUnavailable；is_retryable 只供 RetryingBackend 使用。

use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Request timed out")]
    Timeout,

    #[error("Rate limited")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Server error {status}: {message}")]
    Server { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

impl LlmError {
    /// 按 HTTP 状态码归类非 2xx 响应
    pub fn from_status(status: u16, message: impl Into<String>, retry_after: Option<Duration>) -> Self {
        let message = message.into();
        match status {
            400 | 404 | 422 => LlmError::InvalidRequest(message),
            401 | 403 => LlmError::Auth(message),
            408 => LlmError::Timeout,
            429 => LlmError::RateLimited {
                retry_after_ms: retry_after.map(|d| d.as_millis() as u64),
            },
            _ => LlmError::Server { status, message },
        }
    }

    /// 将 reqwest 传输层错误映射为 Timeout / Network
    pub fn from_transport(e: &reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Timeout
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {e}"))
        } else {
            LlmError::Network(format!("Request failed: {e}"))
        }
    }

    /// 网络、超时、限流、5xx 可重试；鉴权、请求错误、响应格式错误不可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout | LlmError::RateLimited { .. } => true,
            LlmError::Server { status, .. } => *status >= 500,
            LlmError::Auth(_) | LlmError::InvalidRequest(_) | LlmError::MalformedResponse(_) => {
                false
            }
        }
    }
}

/// 解析 Retry-After 头（仅支持秒数）
pub fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
    headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
