//! Mock 后端（用于测试与离线运行，无需 API）
//!
//! - echo：回显最后一条用户文本；若最后一条是工具结果，则复述结果状态
//! - scripted：按顺序返回预设响应，耗尽后返回 MalformedResponse
//! - repeating：每次都返回同一响应（用于验证轮次上限）
//!
//! 所有模式都会记录收到的请求，供测试断言调用次数与内容。

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::conversation::{BackendRole, Part};
use crate::llm::{BackendRequest, BackendResponse, GenerativeBackend, LlmError};

enum MockMode {
    Echo,
    Scripted(Mutex<VecDeque<Result<BackendResponse, LlmError>>>),
    Repeating(BackendResponse),
}

pub struct MockBackend {
    mode: MockMode,
    requests: Mutex<Vec<BackendRequest>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::echo()
    }
}

impl MockBackend {
    pub fn echo() -> Self {
        Self::with_mode(MockMode::Echo)
    }

    pub fn scripted(steps: Vec<Result<BackendResponse, LlmError>>) -> Self {
        Self::with_mode(MockMode::Scripted(Mutex::new(steps.into())))
    }

    pub fn repeating(response: BackendResponse) -> Self {
        Self::with_mode(MockMode::Repeating(response))
    }

    fn with_mode(mode: MockMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// 已收到的请求数
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    /// 已收到的请求副本
    pub fn requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn echo_reply(request: &BackendRequest) -> BackendResponse {
        let Some(last) = request.turns.last() else {
            return BackendResponse::text("(no input)");
        };
        for part in last.parts.iter().rev() {
            if let Part::ToolResult { call, result } = part {
                return BackendResponse::text(format!(
                    "{} finished with {}: {}",
                    call.name,
                    serde_json::to_value(result.status)
                        .ok()
                        .and_then(|v| v.as_str().map(String::from))
                        .unwrap_or_default(),
                    result.payload
                ));
            }
        }
        let text = request
            .turns
            .iter()
            .rev()
            .find(|t| t.role == BackendRole::User)
            .map(|t| t.text())
            .unwrap_or_default();
        BackendResponse::text(format!("Echo from Mock: {text}"))
    }
}

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn generate(&self, request: &BackendRequest) -> Result<BackendResponse, LlmError> {
        if let Ok(mut reqs) = self.requests.lock() {
            reqs.push(request.clone());
        }
        match &self.mode {
            MockMode::Echo => Ok(Self::echo_reply(request)),
            MockMode::Repeating(resp) => Ok(resp.clone()),
            MockMode::Scripted(steps) => steps
                .lock()
                .ok()
                .and_then(|mut s| s.pop_front())
                .unwrap_or_else(|| {
                    Err(LlmError::MalformedResponse("mock script exhausted".to_string()))
                }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
