//! 核心类型：错误分类与回复组装

pub mod error;
pub mod response;

pub use error::{ChatError, RegistryError, ToolError};
pub use response::{ChatReply, ErrorReply, ResponseAssembler};
