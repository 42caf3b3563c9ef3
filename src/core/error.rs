//! 错误类型
//!
//! ServiceError 由外部协作方（LLM、天气、住宿、知识库、意图识别）返回；
//! GuideError 是编排层错误，在 Orchestrator 边界统一转为 ERROR 响应，不向外传播。

use thiserror::Error;

/// 协作方调用失败（网络、服务不可用、响应无法解析）
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// 编排过程中的错误：超时、协作方失败、不变量被破坏
#[derive(Error, Debug)]
pub enum GuideError {
    #[error("{collaborator} timed out after {secs}s")]
    Timeout {
        collaborator: &'static str,
        secs: u64,
    },

    #[error("{collaborator} failed: {detail}")]
    Collaborator {
        collaborator: &'static str,
        detail: String,
    },

    #[error("Invariant violated: {0}")]
    Invariant(String),
}

impl GuideError {
    pub fn collaborator(collaborator: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Collaborator {
            collaborator,
            detail: err.to_string(),
        }
    }
}
