//! Headless 对话运行时
//!
//! 供终端、HTTP 等前端调用：ChatService 持有共享的后端与只读工具注册表，
//! 每个请求独立走 TranscriptNormalizer -> OrchestrationLoop -> ResponseAssembler。

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::config::AppConfig;
use crate::conversation::{normalize, normalize_request_body, ChatRequest, InboundMessage, NormalizedTranscript};
use crate::core::{ChatError, ChatReply, ErrorReply, RegistryError, ResponseAssembler};
use crate::llm::{create_backend_from_config, GenerativeBackend};
use crate::react::{LoopEvent, LoopResult, LoopSettings, OrchestrationLoop};
use crate::tools::{default_registry, ToolExecutor, ToolRegistry};

/// 对话服务：可在并发请求间共享（内部只有只读状态）
#[derive(Clone)]
pub struct ChatService {
    backend: Arc<dyn GenerativeBackend>,
    executor: ToolExecutor,
    settings: LoopSettings,
    system_prompt: Option<String>,
    assembler: ResponseAssembler,
}

impl ChatService {
    pub fn new(backend: Arc<dyn GenerativeBackend>, registry: Arc<ToolRegistry>) -> Self {
        Self {
            backend,
            executor: ToolExecutor::new(registry, 30),
            settings: LoopSettings::default(),
            system_prompt: None,
            assembler: ResponseAssembler::new(),
        }
    }

    /// 从配置创建：后端按 [llm] 选择，工具为默认注册表
    pub fn from_config(cfg: &AppConfig) -> Result<Self, RegistryError> {
        let registry = Arc::new(default_registry()?);
        Ok(Self::with_backend_and_config(
            create_backend_from_config(cfg),
            registry,
            cfg,
        ))
    }

    /// 用指定后端与注册表，其余参数取自配置
    pub fn with_backend_and_config(
        backend: Arc<dyn GenerativeBackend>,
        registry: Arc<ToolRegistry>,
        cfg: &AppConfig,
    ) -> Self {
        Self::new(backend, registry)
            .with_tool_timeout(Duration::from_secs(cfg.tools.tool_timeout_secs))
            .with_settings(LoopSettings {
                max_rounds: cfg.orchestrator.max_rounds,
                round_timeout: Duration::from_secs(cfg.orchestrator.round_timeout_secs),
            })
            .with_system_prompt(cfg.app.system_prompt.clone())
    }

    pub fn with_settings(mut self, settings: LoopSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = if prompt.trim().is_empty() { None } else { Some(prompt) };
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.executor = ToolExecutor::with_timeout(self.registry_handle(), timeout);
        self
    }

    fn registry_handle(&self) -> Arc<ToolRegistry> {
        self.executor.registry()
    }

    pub fn backend_name(&self) -> &str {
        self.backend.name()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    /// 对调用方消息列表跑一次完整循环；None 表示 messages 字段缺失
    pub async fn chat(&self, messages: Option<&[InboundMessage]>) -> Result<LoopResult, ChatError> {
        self.chat_inner(messages, None, None).await
    }

    /// 同 chat，过程事件推送到 event_tx
    pub async fn chat_with_events(
        &self,
        messages: Option<&[InboundMessage]>,
        event_tx: &UnboundedSender<LoopEvent>,
    ) -> Result<LoopResult, ChatError> {
        self.chat_inner(messages, Some(event_tx), None).await
    }

    /// 可取消的对话：cancel 触发后循环以 Cancelled 结束，不再发起后端调用或执行工具
    pub async fn chat_cancellable(
        &self,
        messages: Option<&[InboundMessage]>,
        event_tx: Option<&UnboundedSender<LoopEvent>>,
        cancel: CancellationToken,
    ) -> Result<LoopResult, ChatError> {
        self.chat_inner(messages, event_tx, Some(cancel)).await
    }

    async fn chat_inner(
        &self,
        messages: Option<&[InboundMessage]>,
        event_tx: Option<&UnboundedSender<LoopEvent>>,
        cancel: Option<CancellationToken>,
    ) -> Result<LoopResult, ChatError> {
        let transcript = normalize(messages)?;
        self.run(transcript, event_tx, cancel).await
    }

    async fn run(
        &self,
        transcript: NormalizedTranscript,
        event_tx: Option<&UnboundedSender<LoopEvent>>,
        cancel: Option<CancellationToken>,
    ) -> Result<LoopResult, ChatError> {
        let request_id = uuid::Uuid::new_v4().to_string();
        let span = tracing::info_span!("chat", request_id = %request_id);
        async {
            tracing::info!(history = transcript.history.len(), "chat request");
            let mut orchestration = OrchestrationLoop::new(self.backend.as_ref(), &self.executor)
                .with_settings(self.settings);
            if let Some(system) = self.system_prompt.as_deref() {
                orchestration = orchestration.with_system_instruction(system);
            }
            if let Some(tx) = event_tx {
                orchestration = orchestration.with_event_tx(tx);
            }
            if let Some(token) = cancel {
                orchestration = orchestration.with_cancel_token(token);
            }
            orchestration.run(transcript).await
        }
        .instrument(span)
        .await
    }

    /// 处理类型化请求，返回调用方形状的回复
    pub async fn handle(&self, request: &ChatRequest) -> Result<ChatReply, ErrorReply> {
        let outcome = self.chat(request.messages.as_deref()).await;
        self.assembler.assemble(outcome.map(|r| r.response))
    }

    /// 处理原始 JSON 请求体（校验 messages 存在且为数组）
    pub async fn handle_value(&self, body: &Value) -> Result<ChatReply, ErrorReply> {
        let outcome = match normalize_request_body(body) {
            Ok(transcript) => self.run(transcript, None, None).await.map(|r| r.response),
            Err(e) => Err(e),
        };
        self.assembler.assemble(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Role;
    use crate::llm::{BackendResponse, MockBackend};
    use serde_json::json;

    fn service(backend: Arc<MockBackend>) -> ChatService {
        ChatService::new(backend, Arc::new(default_registry().unwrap()))
    }

    #[tokio::test]
    async fn test_handle_value_round_trip() {
        let backend = Arc::new(MockBackend::scripted(vec![Ok(BackendResponse::text("Breathe in."))]));
        let reply = service(backend.clone())
            .handle_value(&json!({"messages": [{"role": "user", "content": "I feel stressed"}]}))
            .await
            .unwrap();
        assert_eq!(reply.role, Role::Assistant);
        assert_eq!(reply.content, "Breathe in.");
    }

    #[tokio::test]
    async fn test_invalid_body_never_reaches_backend() {
        let backend = Arc::new(MockBackend::echo());
        let svc = service(backend.clone());
        for body in [json!({}), json!({"messages": 5}), json!({"messages": []})] {
            let err = svc.handle_value(&body).await.unwrap_err();
            assert_eq!(err.status, 400);
        }
        let err = svc.handle(&ChatRequest::default()).await.unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_system_prompt_from_config() {
        let backend = Arc::new(MockBackend::scripted(vec![Ok(BackendResponse::text("ok"))]));
        let cfg = AppConfig::default();
        let svc = ChatService::with_backend_and_config(
            backend.clone(),
            Arc::new(default_registry().unwrap()),
            &cfg,
        );
        svc.chat(Some(&[InboundMessage::new("user", "hi")][..])).await.unwrap();
        let req = &backend.requests()[0];
        assert_eq!(req.system_instruction.as_deref(), Some(cfg.app.system_prompt.as_str()));
    }

    #[tokio::test]
    async fn test_cancelled_request_skips_backend() {
        let backend = Arc::new(MockBackend::echo());
        let token = CancellationToken::new();
        token.cancel();
        let err = service(backend.clone())
            .chat_cancellable(Some(&[InboundMessage::new("user", "hi")][..]), None, token)
            .await
            .unwrap_err();
        assert!(matches!(err, ChatError::Cancelled));
        assert_eq!(backend.call_count(), 0);
    }

    #[test]
    fn test_blank_system_prompt_is_omitted() {
        let svc = service(Arc::new(MockBackend::echo())).with_system_prompt("   ");
        assert!(svc.system_prompt.is_none());
    }
}
