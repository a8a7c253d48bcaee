//! 工具调用请求与结果

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::core::ToolError;

/// 后端发出的工具调用请求；id 仅由按 id 关联结果的后端（OpenAI 兼容）填写
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// 从任意 JSON 构造参数表；非对象参数视为空表
    pub fn from_value(name: impl Into<String>, args: Value) -> Self {
        let arguments = match args {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self::new(name, arguments)
    }

    /// 参数是否存在（JSON null 视为缺失）
    pub fn has_argument(&self, key: &str) -> bool {
        matches!(self.arguments.get(key), Some(v) if !v.is_null())
    }

    /// 后端要求 id 时的兜底值
    pub fn call_id(&self) -> String {
        self.id
            .clone()
            .unwrap_or_else(|| format!("call_{}", self.name))
    }
}

/// 结果状态
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolStatus {
    Success,
    Error,
}

/// 工具执行结果，作为对应请求的输出回灌给后端
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub status: ToolStatus,
    pub payload: Value,
}

impl ToolCallResult {
    pub fn success(payload: Value) -> Self {
        Self {
            status: ToolStatus::Success,
            payload,
        }
    }

    pub fn error(payload: Value) -> Self {
        Self {
            status: ToolStatus::Error,
            payload,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ToolStatus::Success
    }

    /// 序列化为回灌给后端的 JSON：`{status, payload}`
    pub fn to_value(&self) -> Value {
        json!({
            "status": self.status,
            "payload": self.payload,
        })
    }
}

impl From<&ToolError> for ToolCallResult {
    fn from(e: &ToolError) -> Self {
        let mut payload = json!({
            "error": e.kind(),
            "message": e.to_string(),
        });
        if let ToolError::MissingArguments { missing, .. } = e {
            payload["missing"] = json!(missing);
        }
        ToolCallResult::error(payload)
    }
}
