//! TravelGuide - 旅行助手意图分发与工具编排引擎
//!
//! 模块划分：
//! - **agent**: 组装根，按配置构建协作方、能力注册表与 Orchestrator
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 会话存储、状态机主控、响应生成、超时守卫、关键词回退
//! - **llm**: 生成后端抽象与实现（Ollama / OpenAI 兼容 / Mock）及 TOOL_CALL 协议解析
//! - **observability**: tracing 订阅器初始化
//! - **services**: 外部协作方（意图识别、天气、住宿、知识检索）
//! - **tools**: 能力注册表、分发器与四个旅行能力

pub mod agent;
pub mod config;
pub mod core;
pub mod llm;
pub mod observability;
pub mod services;
pub mod tools;

pub use crate::agent::{build_orchestrator, build_orchestrator_with};
pub use crate::core::{DispatchResponse, Orchestrator, ResponseKind};
