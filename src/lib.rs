//! Serene - 带工具调用的对话编排
//!
//! 模块划分：
//! - **agent**: 无头对话服务 ChatService（供终端 / HTTP 调用）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **conversation**: 调用方消息、后端对话轮次与历史规范化
//! - **core**: 错误分类与回复组装
//! - **llm**: 生成式后端抽象与实现（Gemini / OpenAI 兼容 / DeepSeek / Mock）与重试
//! - **observability**: 日志初始化
//! - **react**: 编排主循环（模型 -> 工具 -> 模型）与过程事件
//! - **tools**: 工具声明、注册表、执行器与内置工具（orderFood、bookRide）

pub mod agent;
pub mod config;
pub mod conversation;
pub mod core;
pub mod llm;
pub mod observability;
pub mod react;
pub mod tools;

pub use agent::ChatService;
