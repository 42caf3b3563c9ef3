//! 离线后端（无需模型）
//!
//! MockBackend：从不发起工具调用，追问直接返回工具摘要；用于未配置模型时跑通关键词与检索回退。
//! ScriptedBackend：按顺序返回预设回复，并记录调用次数，供测试编排流程使用。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::core::ServiceError;
use crate::llm::{GenerativeBackend, ModelReply};
use crate::tools::{CapabilityDescriptor, ToolResult};

const MOCK_ANSWER: &str = "Ich bin Ihr TravelGuide. Fragen Sie mich nach dem Wetter, nach Unterkünften \
                           oder nach Sehenswürdigkeiten an Ihrem Reiseziel.";

/// 无模型后端
#[derive(Debug, Default)]
pub struct MockBackend;

#[async_trait]
impl GenerativeBackend for MockBackend {
    async fn respond_with_tools(
        &self,
        _message: &str,
        _catalogue: &[CapabilityDescriptor],
    ) -> Result<ModelReply, ServiceError> {
        Ok(ModelReply::text(""))
    }

    async fn phrase_followup(&self, result: &ToolResult, _original: &str) -> Result<String, ServiceError> {
        Ok(result.summary.clone())
    }

    async fn answer(&self, _message: &str) -> Result<String, ServiceError> {
        Ok(MOCK_ANSWER.to_string())
    }
}

/// 预设回复的后端
pub struct ScriptedBackend {
    replies: Mutex<VecDeque<Result<ModelReply, ServiceError>>>,
    followup: Mutex<Option<Result<String, ServiceError>>>,
    answer: String,
    tool_queries: AtomicUsize,
    followups: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new(replies: Vec<ModelReply>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            followup: Mutex::new(None),
            answer: "Gern geschehen.".to_string(),
            tool_queries: AtomicUsize::new(0),
            followups: AtomicUsize::new(0),
        }
    }

    /// 下一次 respond_with_tools 返回错误
    pub fn push_failure(self, detail: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(ServiceError::Unavailable(detail.to_string())));
        }
        self
    }

    /// 固定追问结果；未设置时返回 "Antwort: <summary>"
    pub fn with_followup(self, followup: Result<String, ServiceError>) -> Self {
        if let Ok(mut slot) = self.followup.lock() {
            *slot = Some(followup);
        }
        self
    }

    pub fn with_answer(mut self, answer: &str) -> Self {
        self.answer = answer.to_string();
        self
    }

    pub fn tool_queries(&self) -> usize {
        self.tool_queries.load(Ordering::SeqCst)
    }

    pub fn followups(&self) -> usize {
        self.followups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerativeBackend for ScriptedBackend {
    async fn respond_with_tools(
        &self,
        _message: &str,
        _catalogue: &[CapabilityDescriptor],
    ) -> Result<ModelReply, ServiceError> {
        self.tool_queries.fetch_add(1, Ordering::SeqCst);
        self.replies
            .lock()
            .map_err(|_| ServiceError::Unavailable("script poisoned".into()))?
            .pop_front()
            .unwrap_or_else(|| Ok(ModelReply::text("")))
    }

    async fn phrase_followup(&self, result: &ToolResult, _original: &str) -> Result<String, ServiceError> {
        self.followups.fetch_add(1, Ordering::SeqCst);
        let fixed = self
            .followup
            .lock()
            .map_err(|_| ServiceError::Unavailable("script poisoned".into()))?
            .take();
        match fixed {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(e),
            None => Ok(format!("Antwort: {}", result.summary)),
        }
    }

    async fn answer(&self, _message: &str) -> Result<String, ServiceError> {
        Ok(self.answer.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_followup_is_summary() {
        let result = ToolResult::unknown("x");
        let text = MockBackend.phrase_followup(&result, "?").await.unwrap();
        assert_eq!(text, result.summary);
        assert!(!MockBackend.answer("Hallo").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_scripted_replies_in_order_then_text() {
        let backend = ScriptedBackend::new(vec![ModelReply::text("eins")]).push_failure("down");
        assert_eq!(backend.respond_with_tools("", &[]).await.unwrap().raw_text, "eins");
        assert!(backend.respond_with_tools("", &[]).await.is_err());
        assert_eq!(backend.respond_with_tools("", &[]).await.unwrap().raw_text, "");
        assert_eq!(backend.tool_queries(), 3);
    }
}
