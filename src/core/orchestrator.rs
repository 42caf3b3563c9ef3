//! 编排主控：每轮对话的状态机
//!
//! ENTITY_EXTRACTION → INTENT_SHORTCUT? → MODEL_QUERY → PROTOCOL_PARSE →
//! {TOOL_EXECUTION, KEYWORD_FALLBACK, RETRIEVAL_FALLBACK, DIRECT_ANSWER} → FOLLOWUP_COMPOSE → RESPOND，
//! 任一步骤出错进入 ERROR。
//!
//! 每轮持有该用户的会话锁，在会话副本上运行；只有成功结束才写回，出错或 panic 时会话保持原样。

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::Instrument;
use uuid::Uuid;

use crate::core::fallback::KeywordRouter;
use crate::core::guard::CallGuard;
use crate::core::response::{DispatchResponse, ResponseComposer};
use crate::core::session::{Session, SessionStore};
use crate::core::GuideError;
use crate::llm::{GenerativeBackend, ParsedOutput, ProtocolParser, ToolCallRequest};
use crate::services::{Intent, IntentClassifier, KnowledgeRetriever};
use crate::tools::{CapabilityDispatcher, ToolFailure};

/// 编排所需的协作方
pub struct Collaborators {
    pub sessions: Arc<dyn SessionStore>,
    pub classifier: Arc<dyn IntentClassifier>,
    pub backend: Arc<dyn GenerativeBackend>,
    pub retriever: Arc<dyn KnowledgeRetriever>,
}

/// 超时与检索参数
#[derive(Debug, Clone, Copy)]
pub struct OrchestratorSettings {
    /// 生成后端调用
    pub llm_guard: CallGuard,
    /// 意图识别、知识检索调用
    pub data_guard: CallGuard,
    pub retrieval_top_k: usize,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        Self {
            llm_guard: CallGuard::new(60),
            data_guard: CallGuard::new(30),
            retrieval_top_k: 3,
        }
    }
}

/// 对话编排器
pub struct Orchestrator {
    sessions: Arc<dyn SessionStore>,
    classifier: Arc<dyn IntentClassifier>,
    backend: Arc<dyn GenerativeBackend>,
    retriever: Arc<dyn KnowledgeRetriever>,
    dispatcher: CapabilityDispatcher,
    parser: ProtocolParser,
    keywords: KeywordRouter,
    settings: OrchestratorSettings,
}

impl Orchestrator {
    pub fn new(
        collaborators: Collaborators,
        dispatcher: CapabilityDispatcher,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            sessions: collaborators.sessions,
            classifier: collaborators.classifier,
            backend: collaborators.backend,
            retriever: collaborators.retriever,
            dispatcher,
            parser: ProtocolParser::default(),
            keywords: KeywordRouter::default(),
            settings,
        }
    }

    pub fn sessions(&self) -> &Arc<dyn SessionStore> {
        &self.sessions
    }

    pub fn dispatcher(&self) -> &CapabilityDispatcher {
        &self.dispatcher
    }

    /// 处理一条消息；永不返回错误，失败统一为 type=error 的响应
    pub async fn handle(&self, message: &str, user_id: &str) -> DispatchResponse {
        let turn_id = Uuid::new_v4();
        let span = tracing::info_span!("turn", turn_id = %turn_id, user_id = %user_id);
        async move {
            let mut slot = self.sessions.lock(user_id).await;
            let mut working = slot.clone();

            let outcome = AssertUnwindSafe(self.run_turn(message, user_id, &mut working))
                .catch_unwind()
                .await;

            match outcome {
                Ok(Ok(response)) => {
                    *slot = working;
                    tracing::info!(kind = ?response.kind, tool = ?response.tool_used, "turn completed");
                    response
                }
                Ok(Err(e)) => {
                    tracing::error!("turn failed: {}", e);
                    ResponseComposer::error()
                }
                Err(panic) => {
                    let detail = panic
                        .downcast_ref::<&str>()
                        .map(|s| s.to_string())
                        .or_else(|| panic.downcast_ref::<String>().cloned())
                        .unwrap_or_else(|| "unknown panic".to_string());
                    tracing::error!("{}", GuideError::Invariant(format!("turn panicked: {}", detail)));
                    ResponseComposer::error()
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_turn(
        &self,
        message: &str,
        user_id: &str,
        session: &mut Session,
    ) -> Result<DispatchResponse, GuideError> {
        let message = message.trim();
        if message.is_empty() {
            return Ok(ResponseComposer::general(
                "Bitte geben Sie eine Nachricht ein.".to_string(),
                None,
            ));
        }

        tracing::debug!(state = "entity_extraction");
        let classification = self
            .settings
            .data_guard
            .call("intent", self.classifier.classify(message, user_id))
            .await?;
        session.merge_entities(&classification.entities);

        tracing::debug!(state = "intent_shortcut", intent = ?classification.intent, confidence = classification.confidence);
        match classification.intent {
            Intent::Greet => return Ok(ResponseComposer::greeting()),
            Intent::ResetSession => {
                *session = Session::default();
                return Ok(ResponseComposer::session_reset());
            }
            Intent::Goodbye => return Ok(ResponseComposer::goodbye()),
            _ => {}
        }

        tracing::debug!(state = "model_query");
        let catalogue = self.dispatcher.registry().list();
        let reply = self
            .settings
            .llm_guard
            .call("llm", self.backend.respond_with_tools(message, &catalogue))
            .await?;

        tracing::debug!(state = "protocol_parse", kind = ?reply.kind);
        match self.parser.parse(&reply, self.dispatcher.registry()) {
            ParsedOutput::ToolCall(request) => self.execute_tool(request, message, session).await,
            ParsedOutput::UnknownTool { name } => {
                tracing::warn!("model requested unknown capability {:?}", name);
                Ok(ResponseComposer::unknown_capability(&name))
            }
            ParsedOutput::DirectAnswer(text) => self.fallback(message, text, session).await,
        }
    }

    /// TOOL_EXECUTION → FOLLOWUP_COMPOSE
    async fn execute_tool(
        &self,
        request: ToolCallRequest,
        message: &str,
        session: &mut Session,
    ) -> Result<DispatchResponse, GuideError> {
        tracing::debug!(state = "tool_execution", tool = %request.tool);
        let ToolCallRequest { tool, mut parameters } = request;

        let has_location = parameters
            .get("location")
            .is_some_and(|l| !l.trim().is_empty());
        if !has_location {
            if let Some(destination) = session.preferences.destination.clone() {
                parameters.insert("location".to_string(), destination);
            }
        }

        let result = self.dispatcher.execute(&tool, &parameters, session).await;
        match &result.error {
            Some(ToolFailure::MissingParameter { .. }) => {
                return Ok(ResponseComposer::missing_info(&result, parameters));
            }
            Some(ToolFailure::UnknownCapability { name }) => {
                return Ok(ResponseComposer::unknown_capability(name));
            }
            Some(ToolFailure::Collaborator { detail }) => {
                return Err(GuideError::Collaborator {
                    collaborator: "capability",
                    detail: format!("{}: {}", tool, detail),
                });
            }
            None => {}
        }

        if let Some(location) = &result.location {
            session.preferences.destination = Some(location.clone());
        }

        tracing::debug!(state = "followup_compose");
        let text = match self
            .settings
            .llm_guard
            .call("llm", self.backend.phrase_followup(&result, message))
            .await
        {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => result.summary.clone(),
            Err(e) => {
                tracing::warn!("follow-up phrasing failed, using summary: {}", e);
                result.summary.clone()
            }
        };

        Ok(ResponseComposer::tool_response(&result, parameters, text))
    }

    /// KEYWORD_FALLBACK → RETRIEVAL_FALLBACK → DIRECT_ANSWER
    async fn fallback(
        &self,
        message: &str,
        model_text: String,
        session: &mut Session,
    ) -> Result<DispatchResponse, GuideError> {
        tracing::debug!(state = "keyword_fallback");
        if let Some(request) = self
            .keywords
            .route(message, session.preferences.destination.as_deref())
        {
            tracing::info!("keyword fallback selected {}", request.tool);
            return self.execute_tool(request, message, session).await;
        }

        tracing::debug!(state = "retrieval_fallback");
        if let Some(place) = self.keywords.gazetteer().find(message) {
            let hits = self
                .settings
                .data_guard
                .call("knowledge", self.retriever.search(message, self.settings.retrieval_top_k))
                .await?;
            let wanted = place.to_lowercase();
            if hits.iter().any(|h| h.city == wanted) {
                let answer = self
                    .settings
                    .data_guard
                    .call("knowledge", self.retriever.answer(message, Some(&place)))
                    .await?;
                return Ok(ResponseComposer::rag(answer, &place));
            }
        }

        tracing::debug!(state = "direct_answer");
        let text = if model_text.trim().is_empty() {
            self.settings
                .llm_guard
                .call("llm", self.backend.answer(message))
                .await?
        } else {
            model_text
        };
        Ok(ResponseComposer::general(
            text,
            session.preferences.destination.as_deref(),
        ))
    }
}
