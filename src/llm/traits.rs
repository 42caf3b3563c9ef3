//! LLM 抽象
//!
//! LlmClient：纯文本对话补全（OpenAI 兼容 / Ollama）。
//! GenerativeBackend：编排层看到的生成后端，带工具目录回答、根据工具结果组织回复、直接回答。

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ServiceError;
use crate::llm::Message;
use crate::tools::{CapabilityDescriptor, Parameters, ToolResult};

/// 对话补全客户端
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, messages: &[Message]) -> Result<String, ServiceError>;
}

/// 后端对自身输出的分类
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyKind {
    ToolCall,
    Text,
}

/// 后端识别出的工具调用（参数可能缺失）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelToolCall {
    pub name: String,
    pub parameters: Option<Parameters>,
}

/// respond_with_tools 的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelReply {
    pub kind: ReplyKind,
    pub raw_text: String,
    pub tool: Option<ModelToolCall>,
}

impl ModelReply {
    pub fn text(raw_text: impl Into<String>) -> Self {
        Self {
            kind: ReplyKind::Text,
            raw_text: raw_text.into(),
            tool: None,
        }
    }

    pub fn tool_call(raw_text: impl Into<String>, name: &str, parameters: Option<Parameters>) -> Self {
        Self {
            kind: ReplyKind::ToolCall,
            raw_text: raw_text.into(),
            tool: Some(ModelToolCall {
                name: name.to_string(),
                parameters,
            }),
        }
    }
}

/// 生成后端；模型输出格式错误时降级为 Text，不返回错误
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// 携带工具目录回答用户消息
    async fn respond_with_tools(
        &self,
        message: &str,
        catalogue: &[CapabilityDescriptor],
    ) -> Result<ModelReply, ServiceError>;

    /// 基于工具结果组织最终回复
    async fn phrase_followup(&self, result: &ToolResult, original: &str) -> Result<String, ServiceError>;

    /// 不带工具的直接回答
    async fn answer(&self, message: &str) -> Result<String, ServiceError>;
}
