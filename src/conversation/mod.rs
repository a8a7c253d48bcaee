//! 对话层：调用方消息、后端原生对话状态、TranscriptNormalizer

pub mod message;
pub mod state;
pub mod transcript;

pub use message::{ChatRequest, InboundMessage, Message, Role};
pub use state::{BackendRole, ConversationState, Part, Turn};
pub use transcript::{normalize, normalize_request_body, NormalizedTranscript};
