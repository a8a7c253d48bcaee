//! 请求级错误分类
//!
//! ChatError 只覆盖会让整个请求提前结束的错误；未知工具、工具执行失败等由 ToolError 表示，
//! 在循环内部折叠为 error 状态的 ToolCallResult，不会中止请求。

use thiserror::Error;

use crate::llm::LlmError;

/// 请求级错误：输入非法、工具轮次超限、后端不可用、被取消
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Tool loop exceeded after {rounds} rounds")]
    ToolLoopExceeded { rounds: usize },

    #[error("Backend unavailable: {0}")]
    BackendUnavailable(#[from] LlmError),

    #[error("Cancelled")]
    Cancelled,
}

impl ChatError {
    /// 分类名（日志与事件中使用）
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::InvalidInput(_) => "invalid_input",
            ChatError::ToolLoopExceeded { .. } => "tool_loop_exceeded",
            ChatError::BackendUnavailable(_) => "backend_unavailable",
            ChatError::Cancelled => "cancelled",
        }
    }

    /// 由传输层使用的 HTTP 风格状态码：非法输入 400，其余 500
    pub fn status_code(&self) -> u16 {
        match self {
            ChatError::InvalidInput(_) => 400,
            _ => 500,
        }
    }
}

/// 工具层错误：不会终止请求，由 ToolExecutor 转为 error 状态的结果回灌给后端
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Missing required arguments for {tool}: {}", missing.join(", "))]
    MissingArguments { tool: String, missing: Vec<String> },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    Timeout(String),

    #[error("Tool panicked: {0}")]
    Panicked(String),
}

impl ToolError {
    pub fn kind(&self) -> &'static str {
        match self {
            ToolError::UnknownTool(_) => "unknown_tool",
            ToolError::MissingArguments { .. }
            | ToolError::ExecutionFailed(_)
            | ToolError::Timeout(_)
            | ToolError::Panicked(_) => "tool_execution_error",
        }
    }
}

/// 注册表构建错误（配置期）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("Invalid tool declaration for {tool}: {reason}")]
    InvalidDeclaration { tool: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ChatError::InvalidInput("empty".into()).status_code(), 400);
        assert_eq!(ChatError::ToolLoopExceeded { rounds: 8 }.status_code(), 500);
        assert_eq!(ChatError::Cancelled.status_code(), 500);
        let backend = ChatError::from(LlmError::Timeout);
        assert_eq!(backend.status_code(), 500);
        assert_eq!(backend.kind(), "backend_unavailable");
    }

    #[test]
    fn test_tool_error_kinds() {
        assert_eq!(ToolError::UnknownTool("x".into()).kind(), "unknown_tool");
        let missing = ToolError::MissingArguments {
            tool: "orderFood".into(),
            missing: vec!["food_items".into(), "restaurant".into()],
        };
        assert_eq!(missing.kind(), "tool_execution_error");
        assert!(missing.to_string().contains("food_items, restaurant"));
    }
}
