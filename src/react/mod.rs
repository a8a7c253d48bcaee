//! 编排层：工具增强对话的主循环与过程事件

pub mod events;
pub mod loop_;

pub use events::LoopEvent;
pub use loop_::{LoopResult, LoopSettings, OrchestrationLoop};
