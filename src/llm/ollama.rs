//! Ollama 客户端与原生工具调用后端
//!
//! OllamaClient：`POST {base_url}/api/chat`（stream=false），实现 LlmClient。
//! OllamaBackend：把工具目录作为原生 `tools` 发给模型，message.tool_calls 直接映射为结构化工具调用；
//! 模型未使用原生工具时仍按 TOOL_CALL 协议解析文本。追问与直接回答复用 PromptedBackend。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;

use crate::core::ServiceError;
use crate::llm::prompted::{tool_system_prompt, PromptedBackend};
use crate::llm::protocol::{stringify_parameters, whole_reply_call};
use crate::llm::{GenerativeBackend, LlmClient, Message, ModelReply};
use crate::tools::{CapabilityDescriptor, ToolResult};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<NativeToolCall>,
}

#[derive(Debug, Deserialize)]
struct NativeToolCall {
    function: NativeFunction,
}

#[derive(Debug, Deserialize)]
struct NativeFunction {
    name: String,
    #[serde(default)]
    arguments: Value,
}

/// Ollama /api/chat 客户端
pub struct OllamaClient {
    http: Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaClient {
    pub fn new(base_url: Option<&str>, model: &str, timeout_secs: u64) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            http,
            base_url: base_url
                .unwrap_or(OLLAMA_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model: model.to_string(),
            temperature: 0.7,
        }
    }

    async fn chat(&self, messages: &[Message], tools: Option<Value>) -> Result<ResponseMessage, ServiceError> {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": messages,
            "stream": false,
            "options": { "temperature": self.temperature, "top_p": 0.9 },
        });
        if let Some(tools) = tools {
            body["tools"] = tools;
        }
        let response: ChatResponse = self
            .http
            .post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.message)
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, ServiceError> {
        Ok(self.chat(messages, None).await?.content)
    }
}

/// 原生 tools 定义
pub fn native_tools(catalogue: &[CapabilityDescriptor]) -> Value {
    Value::Array(
        catalogue
            .iter()
            .map(|d| {
                serde_json::json!({
                    "type": "function",
                    "function": {
                        "name": d.name,
                        "description": d.description,
                        "parameters": d.parameters_schema(),
                    }
                })
            })
            .collect(),
    )
}

/// 使用 Ollama 原生工具调用的后端
pub struct OllamaBackend {
    client: Arc<OllamaClient>,
    prompted: PromptedBackend,
}

impl OllamaBackend {
    pub fn new(client: Arc<OllamaClient>) -> Self {
        Self {
            prompted: PromptedBackend::new(client.clone()),
            client,
        }
    }
}

#[async_trait]
impl GenerativeBackend for OllamaBackend {
    async fn respond_with_tools(
        &self,
        message: &str,
        catalogue: &[CapabilityDescriptor],
    ) -> Result<ModelReply, ServiceError> {
        let messages = [
            Message::system(tool_system_prompt(catalogue)),
            Message::user(message),
        ];
        let reply = self.client.chat(&messages, Some(native_tools(catalogue))).await?;

        if let Some(call) = reply.tool_calls.first() {
            // arguments 可能是对象，也可能是 JSON 字符串
            let arguments = match &call.function.arguments {
                Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or(Value::Null),
                other => other.clone(),
            };
            let parameters = arguments.as_object().map(stringify_parameters);
            return Ok(ModelReply::tool_call(reply.content, &call.function.name, parameters));
        }

        Ok(match whole_reply_call(&reply.content) {
            Some((tool, parameters)) => ModelReply::tool_call(reply.content.clone(), &tool, parameters),
            None => ModelReply::text(reply.content),
        })
    }

    async fn phrase_followup(&self, result: &ToolResult, original: &str) -> Result<String, ServiceError> {
        self.prompted.phrase_followup(result, original).await
    }

    async fn answer(&self, message: &str) -> Result<String, ServiceError> {
        self.prompted.answer(message).await
    }
}
