//! 提示词驱动的生成后端
//!
//! 在 system prompt 中列出工具目录并教授 `TOOL_CALL:` 协议（附 schemars 生成的 JSON Schema），
//! 适用于任何只会输出文本的 LlmClient。整段输出恰好是一个工具调用 JSON 时直接归类为 tool_call。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::ServiceError;
use crate::llm::protocol::{whole_reply_call, TOOL_CALL_MARKER};
use crate::llm::{GenerativeBackend, LlmClient, Message, ModelReply};
use crate::tools::{tool_call_schema_json, CapabilityDescriptor, ToolResult};

const ANSWER_SYSTEM_PROMPT: &str =
    "Du bist ein hilfreicher Reiseassistent. Antworte kurz, freundlich und auf Deutsch.";

/// 基于 LlmClient 的后端
pub struct PromptedBackend {
    llm: Arc<dyn LlmClient>,
}

impl PromptedBackend {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }
}

/// 带工具目录的 system prompt
pub fn tool_system_prompt(catalogue: &[CapabilityDescriptor]) -> String {
    let mut prompt = String::from(
        "Du bist ein Reiseassistent. Du kannst verschiedene Tools verwenden, um Reiseinformationen zu finden.\n\nVerfügbare Tools:\n",
    );
    for tool in catalogue {
        let params: Vec<String> = tool
            .parameters
            .iter()
            .map(|p| {
                let flag = if p.required { "Pflicht" } else { "optional" };
                format!("{} ({}, {})", p.name, p.description, flag)
            })
            .collect();
        prompt.push_str(&format!("- {}: {}", tool.name, tool.description));
        if !params.is_empty() {
            prompt.push_str(&format!(" | Parameter: {}", params.join("; ")));
        }
        prompt.push('\n');
    }
    prompt.push_str(&format!(
        "\nWenn du eine Frage beantworten kannst, ohne ein Tool zu verwenden, tue das.\n\
         Wenn du ein Tool benötigst, antworte in genau einer Zeile im folgenden Format:\n\
         {} {{\"tool\": \"tool_name\", \"parameters\": {{\"param1\": \"value1\"}}}}\n\n\
         JSON-Schema des Aufrufs:\n{}\n",
        TOOL_CALL_MARKER,
        tool_call_schema_json()
    ));
    prompt
}

#[async_trait]
impl GenerativeBackend for PromptedBackend {
    async fn respond_with_tools(
        &self,
        message: &str,
        catalogue: &[CapabilityDescriptor],
    ) -> Result<ModelReply, ServiceError> {
        let messages = [
            Message::system(tool_system_prompt(catalogue)),
            Message::user(message),
        ];
        let raw = self.llm.complete(&messages).await?;
        Ok(match whole_reply_call(&raw) {
            Some((tool, parameters)) => ModelReply::tool_call(raw.clone(), &tool, parameters),
            None => ModelReply::text(raw),
        })
    }

    async fn phrase_followup(&self, result: &ToolResult, original: &str) -> Result<String, ServiceError> {
        let tool_json = serde_json::to_string_pretty(result)
            .map_err(|e| ServiceError::InvalidResponse(e.to_string()))?;
        let context = format!(
            "Originale Frage: {}\nTool-Ergebnis: {}\n\nAntworte auf die ursprüngliche Frage basierend auf den Tool-Ergebnissen.",
            original, tool_json
        );
        let text = self.llm.complete(&[Message::user(context)]).await?;
        let text = text.trim();
        if text.is_empty() {
            return Err(ServiceError::InvalidResponse("empty follow-up".into()));
        }
        Ok(text.to_string())
    }

    async fn answer(&self, message: &str) -> Result<String, ServiceError> {
        let messages = [Message::system(ANSWER_SYSTEM_PROMPT), Message::user(message)];
        Ok(self.llm.complete(&messages).await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::llm::ReplyKind;

    /// 按顺序返回预设输出，并记录收到的消息
    struct CannedClient {
        outputs: Mutex<Vec<String>>,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    impl CannedClient {
        fn new(outputs: &[&str]) -> Self {
            Self {
                outputs: Mutex::new(outputs.iter().rev().map(|s| s.to_string()).collect()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl LlmClient for CannedClient {
        async fn complete(&self, messages: &[Message]) -> Result<String, ServiceError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            self.outputs
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| ServiceError::Unavailable("no output left".into()))
        }
    }

    fn catalogue() -> Vec<CapabilityDescriptor> {
        vec![CapabilityDescriptor::new("get_weather", "Wetter").required("location", "Ort")]
    }

    #[test]
    fn test_system_prompt_lists_tools_and_marker() {
        let prompt = tool_system_prompt(&catalogue());
        assert!(prompt.contains("- get_weather: Wetter | Parameter: location (Ort, Pflicht)"));
        assert!(prompt.contains("TOOL_CALL: {\"tool\""));
        assert!(prompt.contains("\"parameters\""));
    }

    #[tokio::test]
    async fn test_bare_json_is_classified_as_tool_call() {
        let client = Arc::new(CannedClient::new(&[
            r#"{"tool": "get_weather", "parameters": {"location": "Rom"}}"#,
        ]));
        let backend = PromptedBackend::new(client.clone());
        let reply = backend.respond_with_tools("Wetter Rom?", &catalogue()).await.unwrap();
        assert_eq!(reply.kind, ReplyKind::ToolCall);
        assert_eq!(reply.tool.unwrap().name, "get_weather");
        let seen = client.seen.lock().unwrap();
        assert!(seen[0][0].content.contains("Verfügbare Tools"));
    }

    #[tokio::test]
    async fn test_prose_stays_text() {
        let backend = PromptedBackend::new(Arc::new(CannedClient::new(&[
            "Gerne.\nTOOL_CALL: {\"tool\": \"get_weather\", \"parameters\": {}}",
        ])));
        let reply = backend.respond_with_tools("Wetter?", &catalogue()).await.unwrap();
        assert_eq!(reply.kind, ReplyKind::Text);
        assert!(reply.raw_text.contains("TOOL_CALL:"));
    }

    #[tokio::test]
    async fn test_empty_followup_is_an_error() {
        let backend = PromptedBackend::new(Arc::new(CannedClient::new(&["   "])));
        let result = ToolResult::unknown("x");
        assert!(backend.phrase_followup(&result, "Frage").await.is_err());
    }
}
