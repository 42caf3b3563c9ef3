//! get_weather：当前天气与预报摘要

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::guard::CallGuard;
use crate::core::session::Session;
use crate::services::WeatherService;
use crate::tools::registry::param;
use crate::tools::{Capability, CapabilityDescriptor, Parameters, ToolResult};

pub const NAME: &str = "get_weather";

pub struct WeatherTool {
    descriptor: CapabilityDescriptor,
    service: Arc<dyn WeatherService>,
    guard: CallGuard,
}

impl WeatherTool {
    pub fn new(service: Arc<dyn WeatherService>, guard: CallGuard) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                NAME,
                "Liefert das aktuelle Wetter und eine Vorhersage für einen Ort",
            )
            .required("location", "Stadt oder Ort"),
            service,
            guard,
        }
    }
}

#[async_trait]
impl Capability for WeatherTool {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, params: &Parameters, session: &mut Session) -> ToolResult {
        let Some(location) = param(params, "location") else {
            return ToolResult::missing_parameter(
                NAME,
                "location",
                "Bitte geben Sie einen Ort für die Wetterabfrage an.",
            );
        };

        let fetched = async {
            let record = self.guard.call("weather", self.service.current(location)).await?;
            let summary = self.guard.call("weather", self.service.summarize(location)).await?;
            Ok::<_, crate::core::GuideError>((record, summary))
        }
        .await;

        match fetched {
            Ok((record, summary)) => {
                let payload = serde_json::to_value(&record).unwrap_or_default();
                session.last_results.weather = Some(record);
                ToolResult::ok(NAME, location, payload, summary)
            }
            Err(e) => {
                tracing::warn!("weather lookup for {} failed: {}", location, e);
                ToolResult::failed(
                    NAME,
                    location,
                    e,
                    format!(
                        "Entschuldigung, ich konnte keine Wetterinformationen für {} finden.",
                        location
                    ),
                )
            }
        }
    }
}
