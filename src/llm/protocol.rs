//! 工具调用协议解析
//!
//! 从生成后端的输出中提取 (tool, parameters)。按顺序尝试若干解析策略，第一个命中者生效：
//! 1. StructuredReply：后端自己已将输出分类为工具调用（名称与参数齐全）
//! 2. MarkerFragment：`TOOL_CALL:` 之后到行尾的 JSON 片段（多个标记时第一个合法者生效）
//! 3. EmbeddedFragment：文本中出现已注册工具名，其后跟 `"location": "..."` 片段
//!
//! 都未命中即为直接回答。标记存在但 JSON 无法解析时同样降级为直接回答，从不报错。

use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::llm::{ModelReply, ReplyKind};
use crate::tools::{CapabilityRegistry, Parameters};

/// 工具调用标记
pub const TOOL_CALL_MARKER: &str = "TOOL_CALL:";

/// 解析得到的工具调用请求
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub tool: String,
    pub parameters: Parameters,
}

/// 解析结果
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedOutput {
    /// 已注册工具
    ToolCall(ToolCallRequest),
    /// 提取到的工具名为空或未注册
    UnknownTool { name: String },
    /// 直接回答（已去掉标记行）
    DirectAnswer(String),
}

/// 单个解析策略
pub trait ParseStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, reply: &ModelReply, registry: &CapabilityRegistry) -> Option<ToolCallRequest>;
}

/// 后端已给出结构化工具调用
pub struct StructuredReply;

impl ParseStrategy for StructuredReply {
    fn name(&self) -> &'static str {
        "structured_reply"
    }

    fn extract(&self, reply: &ModelReply, _registry: &CapabilityRegistry) -> Option<ToolCallRequest> {
        if reply.kind != ReplyKind::ToolCall {
            return None;
        }
        let call = reply.tool.as_ref()?;
        let parameters = call.parameters.clone()?;
        Some(ToolCallRequest {
            tool: call.name.trim().to_string(),
            parameters,
        })
    }
}

/// `TOOL_CALL: {...}` 标记
pub struct MarkerFragment;

impl ParseStrategy for MarkerFragment {
    fn name(&self) -> &'static str {
        "marker_fragment"
    }

    fn extract(&self, reply: &ModelReply, _registry: &CapabilityRegistry) -> Option<ToolCallRequest> {
        let text = &reply.raw_text;
        text.match_indices(TOOL_CALL_MARKER).find_map(|(pos, _)| {
            let rest = &text[pos + TOOL_CALL_MARKER.len()..];
            let fragment = rest.split(['\n', '\r']).next().unwrap_or_default();
            parse_call_fragment(fragment)
        })
    }
}

/// 工具名后跟 `"location": "..."`
pub struct EmbeddedFragment;

impl ParseStrategy for EmbeddedFragment {
    fn name(&self) -> &'static str {
        "embedded_fragment"
    }

    fn extract(&self, reply: &ModelReply, registry: &CapabilityRegistry) -> Option<ToolCallRequest> {
        // 标记行交给 MarkerFragment；解析失败的标记行不能在这里被“救回”
        let text = strip_marker_lines(&reply.raw_text);
        let names = registry.names();
        names.iter().find_map(|name| {
            let pos = text.find(name.as_str())?;
            let after = &text[pos + name.len()..];
            let captures = location_pattern().captures(after)?;
            let fragment = captures.get(0)?;
            // 片段之前出现了另一个工具名：片段属于那个工具
            let between = &after[..fragment.start()];
            if names.iter().any(|other| other != name && between.contains(other.as_str())) {
                return None;
            }
            let location = captures.get(1)?.as_str().trim().to_string();
            if location.is_empty() {
                return None;
            }
            let mut parameters = Parameters::new();
            parameters.insert("location".to_string(), location);
            Some(ToolCallRequest {
                tool: name.clone(),
                parameters,
            })
        })
    }
}

fn location_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#""location"\s*:\s*"([^"]*)""#).expect("static location pattern")
    })
}

/// 有序策略链
pub struct ProtocolParser {
    strategies: Vec<Box<dyn ParseStrategy>>,
}

impl ProtocolParser {
    pub fn new(strategies: Vec<Box<dyn ParseStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn parse(&self, reply: &ModelReply, registry: &CapabilityRegistry) -> ParsedOutput {
        for strategy in &self.strategies {
            if let Some(request) = strategy.extract(reply, registry) {
                tracing::debug!("tool call extracted by {}: {}", strategy.name(), request.tool);
                if request.tool.is_empty() || !registry.contains(&request.tool) {
                    return ParsedOutput::UnknownTool { name: request.tool };
                }
                return ParsedOutput::ToolCall(request);
            }
        }
        if reply.raw_text.contains(TOOL_CALL_MARKER) {
            tracing::warn!("tool call marker present but unparsable, treating as direct answer");
        }
        ParsedOutput::DirectAnswer(strip_marker_lines(&reply.raw_text))
    }
}

impl Default for ProtocolParser {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StructuredReply),
            Box::new(MarkerFragment),
            Box::new(EmbeddedFragment),
        ])
    }
}

/// 解析 `{"tool": ..., "parameters": {...}}`；允许 JSON 后跟随文字
pub fn parse_call_fragment(fragment: &str) -> Option<ToolCallRequest> {
    let mut stream = serde_json::Deserializer::from_str(fragment.trim()).into_iter::<Value>();
    let Some(Ok(Value::Object(map))) = stream.next() else {
        return None;
    };
    let tool = map
        .get("tool")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .trim()
        .to_string();
    let parameters = map
        .get("parameters")
        .and_then(Value::as_object)
        .map(stringify_parameters)
        .unwrap_or_default();
    Some(ToolCallRequest { tool, parameters })
}

/// 整段输出恰好是一个工具调用 JSON（可带 ```json 围栏）时返回 (tool, parameters)
pub fn whole_reply_call(output: &str) -> Option<(String, Option<Parameters>)> {
    let trimmed = output.trim();
    let body = if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        rest.find("```").map(|end| rest[..end].trim()).unwrap_or(rest.trim())
    } else {
        trimmed
    };
    if !body.starts_with('{') {
        return None;
    }
    let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) else {
        return None;
    };
    let tool = map.get("tool").and_then(Value::as_str)?.trim().to_string();
    let parameters = map
        .get("parameters")
        .and_then(Value::as_object)
        .map(stringify_parameters);
    Some((tool, parameters))
}

/// JSON 参数统一转为字符串；null 丢弃
pub fn stringify_parameters(map: &serde_json::Map<String, Value>) -> Parameters {
    map.iter()
        .filter_map(|(k, v)| {
            let value = match v {
                Value::Null => return None,
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            Some((k.clone(), value))
        })
        .collect()
}

/// 去掉所有包含标记的行
pub fn strip_marker_lines(text: &str) -> String {
    text.lines()
        .filter(|line| !line.contains(TOOL_CALL_MARKER))
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}
