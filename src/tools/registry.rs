//! 能力注册表
//!
//! 每个能力实现 Capability trait（descriptor / execute），由 CapabilityRegistry 按注册顺序保存。
//! descriptor 只是声明（名称、描述、参数文档），整体作为工具目录交给 LLM；执行由 CapabilityDispatcher 完成。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::session::Session;
use crate::tools::{Parameters, ToolResult};

/// 参数文档
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterDoc {
    pub name: String,
    pub description: String,
    pub required: bool,
}

/// 能力描述（启动时确定，之后不变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    /// 有序参数列表
    pub parameters: Vec<ParameterDoc>,
}

impl CapabilityDescriptor {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: Vec::new(),
        }
    }

    pub fn required(mut self, name: &str, description: &str) -> Self {
        self.parameters.push(ParameterDoc {
            name: name.to_string(),
            description: description.to_string(),
            required: true,
        });
        self
    }

    pub fn optional(mut self, name: &str, description: &str) -> Self {
        self.parameters.push(ParameterDoc {
            name: name.to_string(),
            description: description.to_string(),
            required: false,
        });
        self
    }

    /// OpenAI / Ollama 原生 tools 所用的 JSON Schema
    pub fn parameters_schema(&self) -> serde_json::Value {
        let properties: serde_json::Map<String, serde_json::Value> = self
            .parameters
            .iter()
            .map(|p| {
                (
                    p.name.clone(),
                    serde_json::json!({ "type": "string", "description": p.description }),
                )
            })
            .collect();
        let required: Vec<&str> = self
            .parameters
            .iter()
            .filter(|p| p.required)
            .map(|p| p.name.as_str())
            .collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// 可调用的能力
#[async_trait]
pub trait Capability: Send + Sync {
    fn descriptor(&self) -> &CapabilityDescriptor;

    /// 执行；协作方失败也以 ToolResult{success=false} 返回
    async fn execute(&self, params: &Parameters, session: &mut Session) -> ToolResult;
}

/// 能力注册表：保持注册顺序，按名查找
#[derive(Default, Clone)]
pub struct CapabilityRegistry {
    capabilities: Vec<Arc<dyn Capability>>,
    index: HashMap<String, usize>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册；同名能力覆盖旧的，但保留原位置
    pub fn register(&mut self, capability: Arc<dyn Capability>) {
        let name = capability.descriptor().name.clone();
        match self.index.get(&name) {
            Some(&i) => self.capabilities[i] = capability,
            None => {
                self.index.insert(name, self.capabilities.len());
                self.capabilities.push(capability);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Capability>> {
        self.index.get(name).map(|&i| self.capabilities[i].clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// 按注册顺序的全部描述
    pub fn list(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities
            .iter()
            .map(|c| c.descriptor().clone())
            .collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.capabilities
            .iter()
            .map(|c| c.descriptor().name.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.capabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }
}

/// 取非空参数（去首尾空白）
pub fn param<'a>(params: &'a Parameters, name: &str) -> Option<&'a str> {
    params
        .get(name)
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
}
