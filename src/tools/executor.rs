//! 能力分发器
//!
//! 持有 CapabilityRegistry，execute(tool_name, params, session) 查找能力并执行；未注册的名称直接返回
//! unknown_capability 结果，不触碰任何协作方。每次调用输出结构化审计日志（JSON）。

use std::time::Instant;

use crate::core::session::Session;
use crate::tools::{CapabilityRegistry, Parameters, ToolResult};

/// 审计日志中参数预览的最大字符数
const PARAMS_PREVIEW_CHARS: usize = 200;

/// 能力分发器
#[derive(Clone)]
pub struct CapabilityDispatcher {
    registry: CapabilityRegistry,
}

impl CapabilityDispatcher {
    pub fn new(registry: CapabilityRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CapabilityRegistry {
        &self.registry
    }

    /// 执行指定能力；未知名称返回 success=false 的 ToolResult
    pub async fn execute(&self, tool_name: &str, params: &Parameters, session: &mut Session) -> ToolResult {
        let start = Instant::now();
        let result = match self.registry.get(tool_name) {
            Some(capability) => capability.execute(params, session).await,
            None => {
                tracing::warn!("unknown capability requested: {}", tool_name);
                ToolResult::unknown(tool_name)
            }
        };

        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": result.success,
            "error": result.error.as_ref().map(|e| e.to_string()),
            "duration_ms": start.elapsed().as_millis() as u64,
            "params_preview": params_preview(params),
        });
        tracing::info!(audit = %audit, "tool");

        result
    }
}

fn params_preview(params: &Parameters) -> String {
    let s = serde_json::to_string(params).unwrap_or_default();
    if s.chars().count() > PARAMS_PREVIEW_CHARS {
        format!("{}...", s.chars().take(PARAMS_PREVIEW_CHARS).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::tools::registry::tests::EchoCapability;
    use crate::tools::ToolFailure;

    fn dispatcher() -> CapabilityDispatcher {
        let mut registry = CapabilityRegistry::new();
        registry.register(Arc::new(EchoCapability::new("get_weather")));
        CapabilityDispatcher::new(registry)
    }

    #[tokio::test]
    async fn test_dispatches_registered_capability() {
        let mut session = Session::default();
        let mut params = Parameters::new();
        params.insert("location".into(), "Rom".into());
        let result = dispatcher().execute("get_weather", &params, &mut session).await;
        assert!(result.success);
        assert_eq!(result.summary, "Rom");
    }

    #[tokio::test]
    async fn test_unknown_capability_is_reported() {
        let mut session = Session::default();
        let result = dispatcher()
            .execute("book_flight", &Parameters::new(), &mut session)
            .await;
        assert!(!result.success);
        assert_eq!(
            result.error,
            Some(ToolFailure::UnknownCapability {
                name: "book_flight".into()
            })
        );
        assert_eq!(session, Session::default());
    }

    #[test]
    fn test_params_preview_truncates() {
        let mut params = Parameters::new();
        params.insert("location".into(), "x".repeat(500));
        let preview = params_preview(&params);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PARAMS_PREVIEW_CHARS + 3);
    }
}
