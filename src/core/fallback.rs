//! 关键词回退
//!
//! 模型没有给出任何工具调用时的最后手段：消息含天气 / 住宿 / 景点关键词，且能确定地点
//! （地名词典命中，或会话中已有目的地）时合成一次工具调用。

use crate::core::gazetteer::Gazetteer;
use crate::llm::ToolCallRequest;
use crate::tools::{accommodations, points_of_interest, weather, Parameters};

const WEATHER_KEYWORDS: &[&str] = &["wetter", "temperatur", "vorhersage", "klima", "regen", "sonnig"];

const ACCOMMODATION_KEYWORDS: &[&str] = &[
    "hotel", "unterkunft", "unterkünfte", "übernacht", "hostel", "pension", "zimmer",
];

const POI_KEYWORDS: &[&str] = &[
    "sehenswürdigkeit", "besichtigen", "attraktion", "museum", "sehen", "empfehlung",
];

/// 关键词路由
#[derive(Debug, Clone, Default)]
pub struct KeywordRouter {
    gazetteer: Gazetteer,
}

impl KeywordRouter {
    pub fn new(gazetteer: Gazetteer) -> Self {
        Self { gazetteer }
    }

    pub fn gazetteer(&self) -> &Gazetteer {
        &self.gazetteer
    }

    /// 按 天气 → 住宿 → 景点 的顺序匹配关键词；无法确定地点时返回 None
    pub fn route(&self, message: &str, session_destination: Option<&str>) -> Option<ToolCallRequest> {
        let lower = message.to_lowercase();
        let tool = [
            (weather::NAME, WEATHER_KEYWORDS),
            (accommodations::NAME, ACCOMMODATION_KEYWORDS),
            (points_of_interest::NAME, POI_KEYWORDS),
        ]
        .into_iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(tool, _)| tool)?;

        let location = self
            .gazetteer
            .find(message)
            .or_else(|| session_destination.map(str::to_string))
            .filter(|l| !l.trim().is_empty())?;

        let mut parameters = Parameters::new();
        parameters.insert("location".to_string(), location);
        Some(ToolCallRequest {
            tool: tool.to_string(),
            parameters,
        })
    }
}
