//! LLM 层：对话客户端（OpenAI 兼容 / Ollama）、生成后端与工具调用协议解析

pub mod message;
pub mod mock;
pub mod ollama;
pub mod openai;
pub mod prompted;
pub mod protocol;
pub mod traits;

pub use message::{Message, Role};
pub use mock::{MockBackend, ScriptedBackend};
pub use ollama::{OllamaBackend, OllamaClient};
pub use openai::OpenAiClient;
pub use prompted::PromptedBackend;
pub use protocol::{ParsedOutput, ProtocolParser, ToolCallRequest, TOOL_CALL_MARKER};
pub use traits::{GenerativeBackend, LlmClient, ModelReply, ModelToolCall, ReplyKind};
