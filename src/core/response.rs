//! 响应组装：把编排循环的终态包装成调用方可见的形状
//!
//! 成功 -> `{ role: "assistant", content }`；失败 -> `{ error, status }`。
//! 错误文案是固定的，不携带后端原始报文或内部状态。

use serde::{Deserialize, Serialize};

use crate::conversation::{Message, Role};
use crate::core::ChatError;

const INVALID_INPUT_MESSAGE: &str = "Messages array is required and must not be empty";
const BACKEND_FAILURE_MESSAGE: &str = "Internal server error processing the chat request.";
const TOOL_LOOP_MESSAGE: &str = "The assistant could not finish this request. Please try again.";
const CANCELLED_MESSAGE: &str = "The chat request was cancelled.";

/// 成功回复
pub type ChatReply = Message;

/// 失败回复：人类可读的错误信息 + HTTP 风格状态码
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorReply {
    pub error: String,
    pub status: u16,
}

/// ResponseAssembler：无状态，仅做形状转换
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseAssembler;

impl ResponseAssembler {
    pub fn new() -> Self {
        Self
    }

    pub fn assemble(&self, outcome: Result<String, ChatError>) -> Result<ChatReply, ErrorReply> {
        match outcome {
            Ok(text) => Ok(self.reply(text)),
            Err(e) => Err(self.error(&e)),
        }
    }

    pub fn reply(&self, text: String) -> ChatReply {
        Message {
            role: Role::Assistant,
            content: text,
        }
    }

    pub fn error(&self, err: &ChatError) -> ErrorReply {
        let error = match err {
            ChatError::InvalidInput(_) => INVALID_INPUT_MESSAGE,
            ChatError::ToolLoopExceeded { .. } => TOOL_LOOP_MESSAGE,
            ChatError::BackendUnavailable(_) => BACKEND_FAILURE_MESSAGE,
            ChatError::Cancelled => CANCELLED_MESSAGE,
        };
        ErrorReply {
            error: error.to_string(),
            status: err.status_code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmError;

    #[test]
    fn test_assemble_done() {
        let reply = ResponseAssembler::new()
            .assemble(Ok("Your pizza is on the way!".to_string()))
            .unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Your pizza is on the way!");
        let json = serde_json::to_value(&reply).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "assistant", "content": "Your pizza is on the way!"})
        );
    }

    #[test]
    fn test_assemble_invalid_input_is_client_error() {
        let err = ResponseAssembler::new()
            .assemble(Err(ChatError::InvalidInput("messages is empty".into())))
            .unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.error, INVALID_INPUT_MESSAGE);
    }

    #[test]
    fn test_backend_detail_not_leaked() {
        let err = ResponseAssembler::new()
            .assemble(Err(ChatError::BackendUnavailable(LlmError::Server {
                status: 503,
                message: "secret upstream payload".into(),
            })))
            .unwrap_err();
        assert_eq!(err.status, 500);
        assert!(!err.error.contains("secret"));
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"error": BACKEND_FAILURE_MESSAGE, "status": 500})
        );
    }
}
