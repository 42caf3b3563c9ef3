//! 工具调用结果
//!
//! ToolResult 的 summary 永远有值：成功时是结果摘要，失败时是可以直接展示给用户的说明。

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// 工具参数（有序，便于日志与响应稳定）
pub type Parameters = BTreeMap<String, String>;

/// 工具失败原因
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolFailure {
    #[error("missing parameter: {parameter}")]
    MissingParameter { parameter: String },

    #[error("unknown capability: {name}")]
    UnknownCapability { name: String },

    #[error("collaborator failure: {detail}")]
    Collaborator { detail: String },
}

/// 单次工具调用的统一结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default)]
    pub payload: Value,
    pub summary: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolFailure>,
}

impl ToolResult {
    pub fn ok(tool: &str, location: &str, payload: Value, summary: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            location: Some(location.to_string()),
            payload,
            summary: summary.into(),
            success: true,
            error: None,
        }
    }

    /// 缺少必填参数：summary 是提示用户补充的话
    pub fn missing_parameter(tool: &str, parameter: &str, prompt: impl Into<String>) -> Self {
        Self {
            tool: tool.to_string(),
            location: None,
            payload: Value::Null,
            summary: prompt.into(),
            success: false,
            error: Some(ToolFailure::MissingParameter {
                parameter: parameter.to_string(),
            }),
        }
    }

    pub fn unknown(tool: &str) -> Self {
        Self {
            tool: tool.to_string(),
            location: None,
            payload: Value::Null,
            summary: format!("Das Werkzeug \"{}\" ist mir unbekannt.", tool),
            success: false,
            error: Some(ToolFailure::UnknownCapability {
                name: tool.to_string(),
            }),
        }
    }

    pub fn failed(
        tool: &str,
        location: &str,
        detail: impl std::fmt::Display,
        summary: impl Into<String>,
    ) -> Self {
        Self {
            tool: tool.to_string(),
            location: Some(location.to_string()),
            payload: Value::Null,
            summary: summary.into(),
            success: false,
            error: Some(ToolFailure::Collaborator {
                detail: detail.to_string(),
            }),
        }
    }

    pub fn is_missing_parameter(&self) -> bool {
        matches!(self.error, Some(ToolFailure::MissingParameter { .. }))
    }

    pub fn is_collaborator_failure(&self) -> bool {
        matches!(self.error, Some(ToolFailure::Collaborator { .. }))
    }
}
