//! 后端原生的对话表示与单请求对话状态
//!
//! 后端只区分两种角色：用户、模型的先前输出。ConversationState 是只追加的不可变日志，
//! 每一轮往返都生成新的状态值，不在原地修改。

use std::sync::Arc;

use serde::Serialize;

use crate::tools::{ToolCallRequest, ToolCallResult};

/// 后端角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendRole {
    User,
    Model,
}

/// 一条后端消息中的片段
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Part {
    Text { text: String },
    ToolCall { call: ToolCallRequest },
    ToolResult { call: ToolCallRequest, result: ToolCallResult },
}

/// 一条后端消息
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Turn {
    pub role: BackendRole,
    pub parts: Vec<Part>,
}

impl Turn {
    pub fn user_text(text: impl Into<String>) -> Self {
        Self {
            role: BackendRole::User,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    pub fn model_text(text: impl Into<String>) -> Self {
        Self {
            role: BackendRole::Model,
            parts: vec![Part::Text { text: text.into() }],
        }
    }

    /// 模型发起的工具调用（可附带同一响应中的文本）
    pub fn model_tool_call(text: &str, call: ToolCallRequest) -> Self {
        let mut parts = Vec::with_capacity(2);
        if !text.is_empty() {
            parts.push(Part::Text {
                text: text.to_string(),
            });
        }
        parts.push(Part::ToolCall { call });
        Self {
            role: BackendRole::Model,
            parts,
        }
    }

    /// 工具结果以用户侧消息回灌
    pub fn tool_result(call: ToolCallRequest, result: ToolCallResult) -> Self {
        Self {
            role: BackendRole::User,
            parts: vec![Part::ToolResult { call, result }],
        }
    }

    /// 拼接所有文本片段
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }
}

/// 单请求对话状态：共享前缀、只追加
#[derive(Clone, Debug, Default)]
pub struct ConversationState {
    turns: Arc<Vec<Turn>>,
}

impl ConversationState {
    pub fn new(turns: Vec<Turn>) -> Self {
        Self {
            turns: Arc::new(turns),
        }
    }

    /// 由历史与当前轮次构造初始状态
    pub fn seed(history: Vec<Turn>, current_turn: &str) -> Self {
        let mut turns = history;
        turns.push(Turn::user_text(current_turn));
        Self::new(turns)
    }

    /// 追加若干消息，返回新状态；原状态保持不变
    pub fn append(&self, new_turns: impl IntoIterator<Item = Turn>) -> Self {
        let mut turns = self.turns.as_ref().clone();
        turns.extend(new_turns);
        Self::new(turns)
    }

    /// 追加一次工具往返：模型的调用 + 工具结果
    pub fn with_tool_exchange(
        &self,
        model_text: &str,
        call: ToolCallRequest,
        result: ToolCallResult,
    ) -> Self {
        self.append([
            Turn::model_tool_call(model_text, call.clone()),
            Turn::tool_result(call, result),
        ])
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
