//! Serene - 终端对话
//!
//! 入口：加载配置、初始化日志、创建 ChatService，从标准输入逐行读取用户消息。
//! 对话历史只保存在进程内存中；`/clear` 清空，`/exit` 退出；
//! Ctrl-C 在请求进行中取消该请求，在提示符处退出。

use anyhow::Context;
use serene::config::load_config;
use serene::conversation::{InboundMessage, Message};
use serene::react::LoopEvent;
use serene::{observability, ChatService};
use std::future::Future;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let cfg = load_config(None).context("Failed to load config")?;
    let service = ChatService::from_config(&cfg).context("Failed to build tool registry")?;
    tracing::info!(
        backend = service.backend_name(),
        tools = ?service.tool_names(),
        "serene ready"
    );

    let mut transcript: Vec<Message> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
        let Some(line) = next_input(&mut lines, tokio::signal::ctrl_c())
            .await
            .context("Failed to read stdin")?
        else {
            break;
        };
        let input = line.trim();
        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                transcript.clear();
                println!("(history cleared)");
                continue;
            }
            _ => {}
        }

        let mut messages: Vec<InboundMessage> =
            transcript.iter().cloned().map(InboundMessage::from).collect();
        messages.push(InboundMessage::new("user", input));

        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let printer = tokio::spawn(async move {
            while let Some(ev) = event_rx.recv().await {
                print_event(&ev);
            }
        });

        let cancel = CancellationToken::new();
        let outcome = tokio::select! {
            r = service.chat_cancellable(Some(messages.as_slice()), Some(&event_tx), cancel.clone()) => r,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                Err(serene::core::ChatError::Cancelled)
            }
        };
        drop(event_tx);
        let _ = printer.await;

        match outcome {
            Ok(result) => {
                println!("{}\n", result.response);
                transcript.push(Message::user(input));
                transcript.push(Message::assistant(result.response));
            }
            Err(e) => eprintln!("[{}] {}\n", e.kind(), e),
        }
    }

    Ok(())
}

/// 读取下一行输入；输入结束或 interrupt 先完成（Ctrl-C）时返回 None
async fn next_input<R, F>(lines: &mut Lines<R>, interrupt: F) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
    F: Future,
{
    tokio::select! {
        line = lines.next_line() => line,
        _ = interrupt => Ok(None),
    }
}

fn print_event(ev: &LoopEvent) {
    match ev {
        LoopEvent::ToolCall { tool, args, deferred } => {
            if *deferred > 0 {
                println!("  -> {tool} {args} (+{deferred} deferred)");
            } else {
                println!("  -> {tool} {args}");
            }
        }
        LoopEvent::ToolResult { tool, status, payload } => {
            println!("  <- {tool} [{status}] {payload}");
        }
        _ => {}
    }
}
