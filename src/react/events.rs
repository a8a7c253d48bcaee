//! 编排过程事件：供终端 / 前端展示轮次、工具调用与结果

use serde::Serialize;

/// 单步过程事件（可序列化为 JSON）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LoopEvent {
    /// 进入 AWAITING_MODEL（第几轮）
    RoundStarted { round: usize, max_rounds: usize },
    /// 后端请求调用工具；deferred 为同一响应中被推迟的其余调用数
    ToolCall {
        tool: String,
        args: serde_json::Value,
        deferred: usize,
    },
    /// 工具结果（已回灌给后端）
    ToolResult {
        tool: String,
        status: String,
        payload: serde_json::Value,
    },
    /// 最终回复
    Done { rounds: usize, tool_calls: usize },
    /// 失败（分类名）
    Failed { kind: String },
}
