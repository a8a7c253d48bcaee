//! 工具执行器
//!
//! 持有只读 ToolRegistry 与全局超时。execute 依次：按名查找 -> 校验必填参数 -> 在超时内调用，
//! 未知工具、缺参、执行错误、超时、panic 一律转为 error 状态的 ToolCallResult，绝不向上抛出；
//! 每次调用输出结构化审计日志（JSON）。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::FutureExt;
use serde_json::{json, Value};
use tokio::time::timeout;

use crate::core::ToolError;
use crate::tools::{ToolCallRequest, ToolCallResult, ToolDeclaration, ToolRegistry};

/// 审计日志中参数预览的最大字符数
const ARGS_PREVIEW_CHARS: usize = 200;

/// 工具执行器：校验、超时与错误归一化
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>, timeout_secs: u64) -> Self {
        Self::with_timeout(registry, Duration::from_secs(timeout_secs))
    }

    pub fn with_timeout(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    pub fn registry(&self) -> Arc<ToolRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn declarations(&self) -> Vec<ToolDeclaration> {
        self.registry.list_declarations()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    /// 执行一次工具调用；总是返回结果，失败以 error 状态表示
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolCallResult {
        let start = Instant::now();
        let outcome = self.try_execute(call).await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let (ok, label) = match &outcome {
            Ok(_) => (true, "ok"),
            Err(ToolError::UnknownTool(_)) => (false, "unknown_tool"),
            Err(ToolError::MissingArguments { .. }) => (false, "missing_arguments"),
            Err(ToolError::Timeout(_)) => (false, "timeout"),
            Err(ToolError::Panicked(_)) => (false, "panic"),
            Err(ToolError::ExecutionFailed(_)) => (false, "error"),
        };
        let audit = json!({
            "event": "tool_audit",
            "tool": call.name,
            "ok": ok,
            "outcome": label,
            "duration_ms": duration_ms,
            "args_preview": args_preview(&Value::Object(call.arguments.clone())),
        });
        tracing::info!(audit = %audit, "tool");

        match outcome {
            Ok(payload) => ToolCallResult::success(payload),
            Err(e) => {
                tracing::warn!(tool = %call.name, error = %e, "tool call folded into error result");
                let mut result = ToolCallResult::from(&e);
                if matches!(e, ToolError::UnknownTool(_)) {
                    result.payload["available_tools"] = json!(self.registry.tool_names());
                }
                result
            }
        }
    }

    async fn try_execute(&self, call: &ToolCallRequest) -> Result<Value, ToolError> {
        let entry = self.registry.lookup(&call.name)?;

        let missing: Vec<String> = entry
            .declaration
            .required_parameters()
            .filter(|p| !call.has_argument(p))
            .map(String::from)
            .collect();
        if !missing.is_empty() {
            return Err(ToolError::MissingArguments {
                tool: call.name.clone(),
                missing,
            });
        }

        let fut = entry.tool.execute(call.arguments.clone());
        match timeout(self.timeout, AssertUnwindSafe(fut).catch_unwind()).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(e))) => Err(ToolError::ExecutionFailed(e)),
            Ok(Err(panic)) => Err(ToolError::Panicked(panic_message(panic.as_ref()))),
            Err(_) => Err(ToolError::Timeout(call.name.clone())),
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > ARGS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(ARGS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}
