//! get_destination_report：目的地综合报告
//!
//! 依次调用天气、住宿、景点三个能力；任一部分失败只在对应小节写「Daten nicht verfügbar」，
//! 至少一部分成功即整体成功。

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::session::Session;
use crate::tools::registry::param;
use crate::tools::{Capability, CapabilityDescriptor, Parameters, ToolResult};

pub const NAME: &str = "get_destination_report";

const NOT_AVAILABLE: &str = "Daten nicht verfügbar";

pub struct DestinationReportTool {
    descriptor: CapabilityDescriptor,
    weather: Arc<dyn Capability>,
    accommodations: Arc<dyn Capability>,
    points_of_interest: Arc<dyn Capability>,
}

impl DestinationReportTool {
    pub fn new(
        weather: Arc<dyn Capability>,
        accommodations: Arc<dyn Capability>,
        points_of_interest: Arc<dyn Capability>,
    ) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                NAME,
                "Erstellt einen Reisebericht mit Wetter, Unterkünften und Sehenswürdigkeiten",
            )
            .required("location", "Reiseziel"),
            weather,
            accommodations,
            points_of_interest,
        }
    }
}

#[async_trait]
impl Capability for DestinationReportTool {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, params: &Parameters, session: &mut Session) -> ToolResult {
        let Some(location) = param(params, "location") else {
            return ToolResult::missing_parameter(
                NAME,
                "location",
                "Bitte geben Sie ein Reiseziel für den Reisebericht an.",
            );
        };

        let mut sub_params = Parameters::new();
        sub_params.insert("location".to_string(), location.to_string());

        let sections = [
            ("Wetter", &self.weather),
            ("Unterkünfte", &self.accommodations),
            ("Sehenswürdigkeiten", &self.points_of_interest),
        ];

        let mut summary = format!("Reisebericht für {}", location);
        let mut payload = serde_json::Map::new();
        let mut any_success = false;

        for (title, capability) in sections {
            let result = capability.execute(&sub_params, session).await;
            let name = capability.descriptor().name.clone();
            summary.push_str(&format!("\n\n=== {} ===\n", title));
            if result.success {
                any_success = true;
                summary.push_str(&result.summary);
                payload.insert(name, result.payload);
            } else {
                tracing::warn!(
                    "report section {} for {} unavailable: {:?}",
                    title,
                    location,
                    result.error
                );
                summary.push_str(NOT_AVAILABLE);
                payload.insert(name, serde_json::Value::Null);
            }
        }

        if any_success {
            ToolResult::ok(NAME, location, serde_json::Value::Object(payload), summary)
        } else {
            ToolResult::failed(
                NAME,
                location,
                "all report sections failed",
                format!("Entschuldigung, für {} sind derzeit keine Daten verfügbar.", location),
            )
        }
    }
}
