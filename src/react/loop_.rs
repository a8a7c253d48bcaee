//! 工具增强对话主循环
//!
//! AWAITING_MODEL -> (文本) DONE
//!                -> (工具调用) EXECUTING_TOOL -> AWAITING_MODEL -> ...
//! 任一后端故障 -> FAILED(BackendUnavailable)；轮次超过上限 -> FAILED(ToolLoopExceeded)。
//!
//! 每轮最多执行一个工具：后端同时提出多个调用时只执行第一个，其余留给后端在下一轮重新决定。
//! 循环内不做重试，重试只属于后端调用本身（见 RetryingBackend）。

use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;

use crate::conversation::{ConversationState, NormalizedTranscript};
use crate::core::ChatError;
use crate::llm::{BackendRequest, BackendResponse, GenerativeBackend, LlmError};
use crate::react::LoopEvent;
use crate::tools::{ToolCallRequest, ToolDeclaration, ToolExecutor};

/// 默认最大往返次数
pub const DEFAULT_MAX_ROUNDS: usize = 8;
/// 默认单轮后端调用超时
pub const DEFAULT_ROUND_TIMEOUT: Duration = Duration::from_secs(180);

/// 循环参数
#[derive(Debug, Clone, Copy)]
pub struct LoopSettings {
    pub max_rounds: usize,
    pub round_timeout: Duration,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            round_timeout: DEFAULT_ROUND_TIMEOUT,
        }
    }
}

/// 循环成功结束时的结果：最终文本与过程统计
#[derive(Debug, Clone)]
pub struct LoopResult {
    pub response: String,
    pub rounds: usize,
    pub tool_calls: usize,
    pub conversation: ConversationState,
}

enum LoopState {
    AwaitingModel,
    ExecutingTool {
        model_text: String,
        call: ToolCallRequest,
    },
    Done(String),
    Failed(ChatError),
}

/// 单请求编排循环；借用共享的后端与执行器，本身不持有跨请求状态
pub struct OrchestrationLoop<'a> {
    backend: &'a dyn GenerativeBackend,
    executor: &'a ToolExecutor,
    settings: LoopSettings,
    system_instruction: Option<&'a str>,
    event_tx: Option<&'a UnboundedSender<LoopEvent>>,
    cancel_token: Option<CancellationToken>,
}

impl<'a> OrchestrationLoop<'a> {
    pub fn new(backend: &'a dyn GenerativeBackend, executor: &'a ToolExecutor) -> Self {
        Self {
            backend,
            executor,
            settings: LoopSettings::default(),
            system_instruction: None,
            event_tx: None,
            cancel_token: None,
        }
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_system_instruction(mut self, system: &'a str) -> Self {
        self.system_instruction = Some(system);
        self
    }

    pub fn with_event_tx(mut self, tx: &'a UnboundedSender<LoopEvent>) -> Self {
        self.event_tx = Some(tx);
        self
    }

    pub fn with_cancel_token(mut self, token: CancellationToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    fn send_event(&self, ev: LoopEvent) {
        if let Some(tx) = self.event_tx {
            let _ = tx.send(ev);
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancel_token
            .as_ref()
            .map(|t| t.is_cancelled())
            .unwrap_or(false)
    }

    /// 运行循环直到 DONE 或 FAILED
    pub async fn run(&self, transcript: NormalizedTranscript) -> Result<LoopResult, ChatError> {
        let declarations = self.executor.declarations();
        let mut conversation =
            ConversationState::seed(transcript.history, &transcript.current_turn);
        let mut state = LoopState::AwaitingModel;
        let mut rounds = 0usize;
        let mut tool_calls = 0usize;

        loop {
            if self.is_cancelled() && !matches!(state, LoopState::Done(_) | LoopState::Failed(_)) {
                state = LoopState::Failed(ChatError::Cancelled);
            }

            state = match state {
                LoopState::AwaitingModel => {
                    rounds += 1;
                    if rounds > self.settings.max_rounds {
                        LoopState::Failed(ChatError::ToolLoopExceeded {
                            rounds: self.settings.max_rounds,
                        })
                    } else {
                        self.send_event(LoopEvent::RoundStarted {
                            round: rounds,
                            max_rounds: self.settings.max_rounds,
                        });
                        self.await_model(&conversation, &declarations, rounds).await
                    }
                }
                LoopState::ExecutingTool { model_text, call } => {
                    let result = self.executor.execute(&call).await;
                    tool_calls += 1;
                    let status = if result.is_success() { "success" } else { "error" };
                    self.send_event(LoopEvent::ToolResult {
                        tool: call.name.clone(),
                        status: status.to_string(),
                        payload: result.payload.clone(),
                    });
                    conversation = conversation.with_tool_exchange(&model_text, call, result);
                    LoopState::AwaitingModel
                }
                LoopState::Done(text) => {
                    tracing::info!(
                        backend = %self.backend.name(),
                        rounds,
                        tool_calls,
                        "chat completed"
                    );
                    self.send_event(LoopEvent::Done { rounds, tool_calls });
                    return Ok(LoopResult {
                        response: text,
                        rounds,
                        tool_calls,
                        conversation,
                    });
                }
                LoopState::Failed(e) => {
                    match &e {
                        ChatError::BackendUnavailable(inner) => tracing::error!(
                            backend = %self.backend.name(),
                            rounds,
                            error = %inner,
                            "backend unavailable"
                        ),
                        other => tracing::warn!(rounds, tool_calls, error = %other, "chat failed"),
                    }
                    self.send_event(LoopEvent::Failed {
                        kind: e.kind().to_string(),
                    });
                    return Err(e);
                }
            };
        }
    }

    /// AWAITING_MODEL：发送累计对话，决定 DONE / EXECUTING_TOOL / FAILED
    async fn await_model(
        &self,
        conversation: &ConversationState,
        declarations: &[ToolDeclaration],
        round: usize,
    ) -> LoopState {
        let request = BackendRequest {
            system_instruction: self.system_instruction.map(String::from),
            turns: conversation.turns().to_vec(),
            tools: declarations.to_vec(),
        };
        tracing::debug!(round, turns = request.turns.len(), "calling backend");

        match self.call_backend(&request).await {
            Ok(response) => self.next_state(response),
            Err(e) => LoopState::Failed(e),
        }
    }

    async fn call_backend(&self, request: &BackendRequest) -> Result<BackendResponse, ChatError> {
        let call = tokio::time::timeout(self.settings.round_timeout, self.backend.generate(request));
        let outcome = match &self.cancel_token {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(ChatError::Cancelled),
                r = call => r,
            },
            None => call.await,
        };
        match outcome {
            Ok(Ok(response)) => Ok(response),
            Ok(Err(e)) => Err(ChatError::BackendUnavailable(e)),
            Err(_) => Err(ChatError::BackendUnavailable(LlmError::Timeout)),
        }
    }

    fn next_state(&self, response: BackendResponse) -> LoopState {
        if let Some(usage) = response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "backend usage"
            );
        }
        let BackendResponse {
            text, tool_calls, ..
        } = response;
        let mut calls = tool_calls.into_iter();
        let Some(first) = calls.next() else {
            return LoopState::Done(text);
        };
        let deferred = calls.count();
        if deferred > 0 {
            tracing::debug!(tool = %first.name, deferred, "executing first tool call only");
        }
        self.send_event(LoopEvent::ToolCall {
            tool: first.name.clone(),
            args: serde_json::Value::Object(first.arguments.clone()),
            deferred,
        });
        LoopState::ExecutingTool {
            model_text: text,
            call: first,
        }
    }
}
