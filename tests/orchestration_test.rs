//! 编排集成测试：ChatService + MockBackend + 计数工具

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use serene::conversation::{InboundMessage, Message, Part, Role};
use serene::core::ChatError;
use serene::llm::{BackendResponse, LlmError, MockBackend};
use serene::react::{LoopEvent, LoopSettings};
use serene::tools::{ParamType, Tool, ToolCallRequest, ToolDeclaration, ToolRegistry, ToolStatus};
use serene::ChatService;

/// 记录每次执行的参数，以及执行时后端已被调用的次数
struct CountingOrderTool {
    backend: Arc<MockBackend>,
    calls: AtomicUsize,
    seen_args: Mutex<Vec<Map<String, Value>>>,
    backend_calls_at_exec: Mutex<Vec<usize>>,
}

impl CountingOrderTool {
    fn new(backend: Arc<MockBackend>) -> Self {
        Self {
            backend,
            calls: AtomicUsize::new(0),
            seen_args: Mutex::new(Vec::new()),
            backend_calls_at_exec: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Tool for CountingOrderTool {
    fn declaration(&self) -> ToolDeclaration {
        ToolDeclaration::new("orderFood", "Order food for delivery").param(
            "food_items",
            ParamType::String,
            "Comma-separated dishes",
            true,
        )
    }

    async fn execute(&self, args: Map<String, Value>) -> Result<Value, String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.backend_calls_at_exec
            .lock()
            .unwrap()
            .push(self.backend.call_count());
        self.seen_args.lock().unwrap().push(args);
        Ok(json!({ "message": "Order placed", "order_id": "ord_test" }))
    }
}

fn order_call() -> ToolCallRequest {
    ToolCallRequest::from_value("orderFood", json!({ "food_items": "Pizza" }))
}

fn service_with(backend: Arc<MockBackend>, tool: Arc<CountingOrderTool>) -> ChatService {
    let registry = ToolRegistry::builder().register_arc(tool).build().unwrap();
    ChatService::new(backend, Arc::new(registry))
}

fn user(text: &str) -> InboundMessage {
    InboundMessage::new("user", text)
}

#[tokio::test]
async fn test_pizza_order_single_tool_round() {
    let backend = Arc::new(MockBackend::scripted(vec![
        Ok(BackendResponse::tool_call(order_call())),
        Ok(BackendResponse::text("Your pizza is on the way!")),
    ]));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool.clone());

    let reply = service
        .handle_value(&json!({ "messages": [{ "role": "user", "content": "order me a pizza" }] }))
        .await
        .unwrap();

    assert_eq!(reply, Message::assistant("Your pizza is on the way!"));
    assert_eq!(
        serde_json::to_value(&reply).unwrap(),
        json!({ "role": "assistant", "content": "Your pizza is on the way!" })
    );

    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    assert_eq!(tool.seen_args.lock().unwrap()[0], order_call().arguments);
    // 工具在第一次后端调用之后、第二次之前执行
    assert_eq!(*tool.backend_calls_at_exec.lock().unwrap(), vec![1]);
    assert_eq!(backend.call_count(), 2);

    let second = &backend.requests()[1];
    let last = second.turns.last().unwrap();
    match &last.parts[0] {
        Part::ToolResult { call, result } => {
            assert_eq!(call.name, "orderFood");
            assert_eq!(result.status, ToolStatus::Success);
            assert_eq!(result.payload["message"], "Order placed");
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_plain_greeting_no_tools() {
    let backend = Arc::new(MockBackend::scripted(vec![Ok(BackendResponse::text(
        "Hello! How are you feeling today?",
    ))]));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool.clone());

    let result = service.chat(Some(&[user("hi")][..])).await.unwrap();

    assert_eq!(result.response, "Hello! How are you feeling today?");
    assert_eq!(result.rounds, 1);
    assert_eq!(result.tool_calls, 0);
    assert_eq!(backend.call_count(), 1);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_or_empty_messages_is_invalid_input() {
    let backend = Arc::new(MockBackend::echo());
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool);

    assert!(matches!(
        service.chat(None).await,
        Err(ChatError::InvalidInput(_))
    ));
    assert!(matches!(
        service.chat(Some(&[][..])).await,
        Err(ChatError::InvalidInput(_))
    ));

    let err = service.handle_value(&json!({})).await.unwrap_err();
    assert_eq!(err.status, 400);
    assert_eq!(err.error, "Messages array is required and must not be empty");
    assert_eq!(
        serde_json::to_value(&err).unwrap(),
        json!({ "error": "Messages array is required and must not be empty", "status": 400 })
    );
    assert_eq!(backend.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_tool_is_reported_back_and_request_completes() {
    let backend = Arc::new(MockBackend::scripted(vec![
        Ok(BackendResponse::tool_call(ToolCallRequest::from_value(
            "launchRocket",
            json!({ "target": "moon" }),
        ))),
        Ok(BackendResponse::text("I can't do that, but I can order food.")),
    ]));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool.clone());

    let result = service
        .chat(Some(&[user("launch a rocket")][..]))
        .await
        .unwrap();

    assert_eq!(result.response, "I can't do that, but I can order food.");
    assert_eq!(tool.calls.load(Ordering::SeqCst), 0);

    let second = &backend.requests()[1];
    match &second.turns.last().unwrap().parts[0] {
        Part::ToolResult { result, .. } => {
            assert_eq!(result.status, ToolStatus::Error);
            assert_eq!(result.payload["error"], "unknown_tool");
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_required_argument_is_not_executed() {
    let backend = Arc::new(MockBackend::scripted(vec![
        Ok(BackendResponse::tool_call(ToolCallRequest::from_value(
            "orderFood",
            json!({}),
        ))),
        Ok(BackendResponse::text("What would you like to eat?")),
    ]));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool.clone());

    let result = service.chat(Some(&[user("order food")][..])).await.unwrap();

    assert_eq!(result.response, "What would you like to eat?");
    assert_eq!(tool.calls.load(Ordering::SeqCst), 0);
    match &backend.requests()[1].turns.last().unwrap().parts[0] {
        Part::ToolResult { result, .. } => {
            assert_eq!(result.payload["error"], "tool_execution_error");
        }
        other => panic!("expected tool result, got {other:?}"),
    }
}

#[tokio::test]
async fn test_runaway_tool_loop_is_bounded() {
    let backend = Arc::new(MockBackend::repeating(BackendResponse::tool_call(
        order_call(),
    )));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool.clone()).with_settings(LoopSettings {
        max_rounds: 3,
        ..LoopSettings::default()
    });

    let err = service.chat(Some(&[user("order forever")][..])).await.unwrap_err();

    assert!(matches!(err, ChatError::ToolLoopExceeded { rounds: 3 }));
    assert_eq!(err.status_code(), 500);
    assert_eq!(backend.call_count(), 3);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_backend_failure_maps_to_generic_500() {
    let backend = Arc::new(MockBackend::scripted(vec![Err(LlmError::Server {
        status: 503,
        message: "upstream secret detail".to_string(),
    })]));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool);

    let err = service
        .handle_value(&json!({ "messages": [{ "role": "user", "content": "hi" }] }))
        .await
        .unwrap_err();

    assert_eq!(err.status, 500);
    assert_eq!(err.error, "Internal server error processing the chat request.");
    assert!(!err.error.contains("secret"));
    assert_eq!(backend.call_count(), 1);
}

#[tokio::test]
async fn test_history_becomes_context_and_last_message_is_current_turn() {
    for n in 1..=5usize {
        let backend = Arc::new(MockBackend::scripted(vec![Ok(BackendResponse::text("ok"))]));
        let tool = Arc::new(CountingOrderTool::new(backend.clone()));
        let service = service_with(backend.clone(), tool);

        let messages: Vec<InboundMessage> = (0..n)
            .map(|i| {
                let role = if i % 2 == 0 { "user" } else { "assistant" };
                InboundMessage::new(role, format!("message {i}"))
            })
            .collect();
        service.chat(Some(messages.as_slice())).await.unwrap();

        let request = &backend.requests()[0];
        // n-1 条历史 + 当前轮
        assert_eq!(request.turns.len(), n);
        assert_eq!(request.turns[n - 1].text(), format!("message {}", n - 1));
        let occurrences = request
            .turns
            .iter()
            .filter(|t| t.text() == format!("message {}", n - 1))
            .count();
        assert_eq!(occurrences, 1);
    }
}

#[tokio::test]
async fn test_events_follow_tool_round() {
    let backend = Arc::new(MockBackend::scripted(vec![
        Ok(BackendResponse::tool_calls(vec![
            order_call(),
            ToolCallRequest::from_value("orderFood", json!({ "food_items": "Salad" })),
        ])),
        Ok(BackendResponse::text("Done.")),
    ]));
    let tool = Arc::new(CountingOrderTool::new(backend.clone()));
    let service = service_with(backend.clone(), tool.clone());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let result = service
        .chat_with_events(Some(&[user("pizza and salad")][..]), &tx)
        .await
        .unwrap();
    drop(tx);

    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }

    assert_eq!(result.tool_calls, 1);
    assert_eq!(tool.calls.load(Ordering::SeqCst), 1);
    assert!(events.contains(&LoopEvent::ToolCall {
        tool: "orderFood".to_string(),
        args: json!({ "food_items": "Pizza" }),
        deferred: 1,
    }));
    assert!(matches!(
        events.last(),
        Some(LoopEvent::Done {
            rounds: 2,
            tool_calls: 1
        })
    ));
}

#[tokio::test]
async fn test_default_registry_with_echo_backend() {
    let backend = Arc::new(MockBackend::echo());
    let service = ChatService::new(
        backend.clone(),
        Arc::new(serene::tools::default_registry().unwrap()),
    );

    let reply = service
        .handle_value(&json!({ "messages": [
            { "role": "user", "content": "hello" },
            { "role": "assistant", "content": "hi there" },
            { "role": "user", "content": "how are you" }
        ] }))
        .await
        .unwrap();

    assert_eq!(reply.role, Role::Assistant);
    assert_eq!(reply.content, "Echo from Mock: how are you");
    let declared: Vec<String> = backend.requests()[0]
        .tools
        .iter()
        .map(|t| t.name.clone())
        .collect();
    assert_eq!(declared, vec!["orderFood", "bookRide"]);
}
