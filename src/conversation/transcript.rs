//! TranscriptNormalizer：调用方消息列表 -> (后端历史, 当前轮次)
//!
//! 最后一条为当前轮次，其余为历史；`assistant` 映射为模型角色，其它任何 role 均视为用户。
//! 纯函数，无副作用。

use serde_json::Value;

use crate::conversation::{InboundMessage, Turn};
use crate::core::ChatError;

/// 规整后的对话输入
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedTranscript {
    pub history: Vec<Turn>,
    pub current_turn: String,
}

/// 规整调用方提交的消息列表；None 表示字段缺失
pub fn normalize(messages: Option<&[InboundMessage]>) -> Result<NormalizedTranscript, ChatError> {
    let messages =
        messages.ok_or_else(|| ChatError::InvalidInput("messages is required".to_string()))?;
    let (last, rest) = messages
        .split_last()
        .ok_or_else(|| ChatError::InvalidInput("messages must not be empty".to_string()))?;

    let history = rest
        .iter()
        .map(|m| {
            if m.is_assistant() {
                Turn::model_text(m.content_or_empty())
            } else {
                Turn::user_text(m.content_or_empty())
            }
        })
        .collect();

    Ok(NormalizedTranscript {
        history,
        current_turn: last.content_or_empty().to_string(),
    })
}

/// 直接从原始请求体规整：校验 `messages` 存在、为数组、非空
pub fn normalize_request_body(body: &Value) -> Result<NormalizedTranscript, ChatError> {
    let raw = match body.get("messages") {
        None | Some(Value::Null) => return normalize(None),
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ChatError::InvalidInput(
                "messages must be an array".to_string(),
            ))
        }
    };
    let messages = raw
        .iter()
        .map(inbound_from_value)
        .collect::<Result<Vec<_>, _>>()?;
    normalize(Some(messages.as_slice()))
}

fn inbound_from_value(item: &Value) -> Result<InboundMessage, ChatError> {
    let obj = item
        .as_object()
        .ok_or_else(|| ChatError::InvalidInput("each message must be an object".to_string()))?;
    let role = obj
        .get("role")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let content = match obj.get("content") {
        Some(Value::String(s)) => Some(s.clone()),
        None | Some(Value::Null) => None,
        Some(other) => Some(other.to_string()),
    };
    Ok(InboundMessage { role, content })
}
