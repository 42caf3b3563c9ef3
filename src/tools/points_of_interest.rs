//! search_points_of_interest：景点推荐
//!
//! 以「Sehenswürdigkeiten <Ort>」检索知识库，优先本地条目（最多 cap 条）；
//! 没有本地条目时明确说明并退回通用旅行建议。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::guard::CallGuard;
use crate::core::session::Session;
use crate::services::{KnowledgeHit, KnowledgeRetriever};
use crate::tools::registry::param;
use crate::tools::{Capability, CapabilityDescriptor, Parameters, ToolResult};

pub const NAME: &str = "search_points_of_interest";

pub struct PointsOfInterestTool {
    descriptor: CapabilityDescriptor,
    retriever: Arc<dyn KnowledgeRetriever>,
    guard: CallGuard,
    cap: usize,
}

impl PointsOfInterestTool {
    pub fn new(retriever: Arc<dyn KnowledgeRetriever>, guard: CallGuard, cap: usize) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                NAME,
                "Empfiehlt Sehenswürdigkeiten und Reisetipps für einen Ort",
            )
            .required("location", "Stadt oder Ort"),
            retriever,
            guard,
            cap: cap.max(1),
        }
    }
}

#[async_trait]
impl Capability for PointsOfInterestTool {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, params: &Parameters, _session: &mut Session) -> ToolResult {
        let Some(location) = param(params, "location") else {
            return ToolResult::missing_parameter(
                NAME,
                "location",
                "Bitte geben Sie einen Ort an, für den Sie Sehenswürdigkeiten suchen.",
            );
        };

        let query = format!("Sehenswürdigkeiten {}", location);
        // 多取一些再按地点划分
        let hits = match self
            .guard
            .call("knowledge", self.retriever.search(&query, self.cap * 3))
            .await
        {
            Ok(hits) => hits,
            Err(e) => {
                tracing::warn!("points of interest for {} failed: {}", location, e);
                return ToolResult::failed(
                    NAME,
                    location,
                    e,
                    format!(
                        "Entschuldigung, ich konnte keine Sehenswürdigkeiten für {} abrufen.",
                        location
                    ),
                );
            }
        };

        let wanted = location.to_lowercase();
        let (local, other): (Vec<KnowledgeHit>, Vec<KnowledgeHit>) =
            hits.into_iter().partition(|h| h.city == wanted);

        let (summary, shown, specific) = if !local.is_empty() {
            let shown: Vec<KnowledgeHit> = local.into_iter().take(self.cap).collect();
            (
                format!("Sehenswürdigkeiten in {}:\n\n{}", location, bullets(&shown)),
                shown,
                true,
            )
        } else if !other.is_empty() {
            let shown: Vec<KnowledgeHit> = other.into_iter().take(self.cap).collect();
            (
                format!(
                    "Keine spezifischen Daten für {} gefunden. Allgemeine Reisetipps:\n\n{}",
                    location,
                    bullets(&shown)
                ),
                shown,
                false,
            )
        } else {
            (
                format!("Keine Informationen zu Sehenswürdigkeiten in {} verfügbar.", location),
                Vec::new(),
                false,
            )
        };

        let payload = serde_json::json!({
            "specific": specific,
            "entries": shown,
        });
        ToolResult::ok(NAME, location, payload, summary)
    }
}

fn bullets(hits: &[KnowledgeHit]) -> String {
    hits.iter()
        .map(|h| format!("• {}", h.content))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::LexicalKnowledgeBase;

    fn tool() -> PointsOfInterestTool {
        PointsOfInterestTool::new(
            Arc::new(LexicalKnowledgeBase::with_default_corpus()),
            CallGuard::new(5),
            3,
        )
    }

    fn params(location: &str) -> Parameters {
        let mut p = Parameters::new();
        p.insert("location".into(), location.into());
        p
    }

    #[tokio::test]
    async fn test_prefers_local_entries() {
        let result = tool().execute(&params("Paris"), &mut Session::default()).await;
        assert!(result.success);
        assert!(result.summary.starts_with("Sehenswürdigkeiten in Paris:"));
        assert_eq!(result.payload["specific"], true);
        let entries = result.payload["entries"].as_array().unwrap();
        assert!(!entries.is_empty() && entries.len() <= 3);
        assert!(entries.iter().all(|e| e["city"] == "paris"));
    }

    #[tokio::test]
    async fn test_unknown_city_falls_back_to_general_tips() {
        let result = tool().execute(&params("Reykjavik"), &mut Session::default()).await;
        assert!(result.success);
        assert_eq!(result.payload["specific"], false);
        assert!(result.summary.contains("Reykjavik"));
        assert!(
            result.summary.starts_with("Keine spezifischen Daten")
                || result.summary.starts_with("Keine Informationen")
        );
    }

    #[tokio::test]
    async fn test_missing_location() {
        let result = tool().execute(&Parameters::new(), &mut Session::default()).await;
        assert!(result.is_missing_parameter());
    }
}
