//! 意图识别：基于正则的关键词分类器
//!
//! 分析用户输入，给出意图、置信度（匹配片段长度 / 消息长度）与实体（destination / start_date / end_date）。
//! 置信度低于 MIN_CONFIDENCE 时视为 unknown。

use std::collections::HashMap;
use std::sync::OnceLock;

use async_trait::async_trait;
use regex::Regex;

use crate::core::gazetteer::title_case;
use crate::core::ServiceError;
use crate::services::{Classification, Intent, IntentClassifier};

/// 低于此置信度视为 unknown
const MIN_CONFIDENCE: f32 = 0.1;

/// 地点捕获到这些词为止（动词、日期介词、时间词）
const PLACE_TERMINATORS: &[&str] = &[
    "finden", "suchen", "buchen", "abfragen", "checken", "prüfen", "vom", "ab", "bis", "für",
    "am", "im", "morgen", "heute", "übermorgen", "mit", "und", "bitte", "reisen",
];

struct Patterns {
    intents: Vec<(Intent, Regex)>,
    place: Regex,
    dates: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("static intent pattern");
        Patterns {
            intents: vec![
                (
                    Intent::Greet,
                    re(r"(?i)\b(?:hallo|hi|hey|servus|moin|guten\s+(?:tag|morgen|abend))\b"),
                ),
                (
                    Intent::Goodbye,
                    re(r"(?i)\b(?:tschüss|tschüs|auf\s+wiedersehen|bye|danke)\b"),
                ),
                (
                    Intent::ResetSession,
                    re(r"(?i)\b(?:alles\s+zurücksetzen|zurücksetzen|neu\s+starten|neue\s+reise)\b"),
                ),
                (
                    Intent::GetWeather,
                    re(r"(?i)\b(?:wie\s+ist\s+das\s+)?(?:wetter|wettervorhersage|temperatur|klima)\b(?:\s+(?:in|für|von)\s+\p{L}[\p{L}\-]*)?"),
                ),
                (
                    Intent::SearchAccommodations,
                    re(r"(?i)\b(?:hotels?|unterkunft|unterkünfte|übernachtung(?:en)?|hostels?|pension)\b(?:\s+(?:in|für)\s+\p{L}[\p{L}\-]*)?(?:\s+(?:finden|suchen|buchen))?"),
                ),
                (
                    Intent::ProvideDates,
                    re(r"(?i)(?:\b(?:vom|ab)\s+)?\d{1,2}\.\d{1,2}\.?(?:\d{4})?\s*(?:bis(?:\s+zum)?|-)\s*\d{1,2}\.\d{1,2}\.?(?:\d{4})?"),
                ),
            ],
            place: re(r"(?i)\b(?:wetter|wettervorhersage|temperatur|klima|hotels?|unterkunft|unterkünfte|übernachtung(?:en)?|hostels?|pension|sehenswürdigkeiten|urlaub|reise)\s+(?:in|für|von|nach)\s+(?P<place>\p{L}[\p{L}\-]*(?:\s+\p{L}[\p{L}\-]*)*)"),
            dates: re(r"(?i)(?P<start>\d{1,2}\.\d{1,2}(?:\.\d{4})?)\.?\s*(?:bis(?:\s+zum)?|-)\s*(?P<end>\d{1,2}\.\d{1,2}(?:\.\d{4})?)"),
        }
    })
}

/// 关键词意图识别器（不调用 LLM）
#[derive(Debug, Default, Clone)]
pub struct KeywordClassifier;

impl KeywordClassifier {
    pub fn new() -> Self {
        Self
    }

    /// 同步分类：取置信度最高的意图
    pub fn classify_text(&self, message: &str) -> Classification {
        let message = message.trim();
        let total = message.chars().count();
        if total == 0 {
            return Classification::unknown();
        }

        let mut best = (Intent::Unknown, 0.0_f32);
        for (intent, pattern) in &patterns().intents {
            if let Some(m) = pattern.find(message) {
                let confidence = m.as_str().chars().count() as f32 / total as f32;
                if confidence > best.1 {
                    best = (intent.clone(), confidence.min(1.0));
                }
            }
        }
        if best.1 < MIN_CONFIDENCE {
            best = (Intent::Unknown, 0.0);
        }

        let classification = Classification {
            intent: best.0,
            confidence: best.1,
            entities: extract_entities(message),
        };
        tracing::debug!(
            "intent {:?} (confidence {:.2}), entities {:?}",
            classification.intent,
            classification.confidence,
            classification.entities
        );
        classification
    }
}

/// 提取 destination / start_date / end_date
fn extract_entities(message: &str) -> HashMap<String, String> {
    let mut entities = HashMap::new();
    let p = patterns();

    if let Some(place) = p
        .place
        .captures(message)
        .and_then(|c| c.name("place"))
        .map(|m| trim_place(m.as_str()))
        .filter(|s| !s.is_empty())
    {
        entities.insert("destination".to_string(), title_case(&place));
    }

    if let Some(c) = p.dates.captures(message) {
        if let (Some(start), Some(end)) = (c.name("start"), c.name("end")) {
            entities.insert("start_date".to_string(), start.as_str().to_string());
            entities.insert("end_date".to_string(), end.as_str().to_string());
        }
    }

    entities
}

/// 截到第一个终止词为止
fn trim_place(raw: &str) -> String {
    raw.split_whitespace()
        .take_while(|w| !PLACE_TERMINATORS.contains(&w.to_lowercase().as_str()))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl IntentClassifier for KeywordClassifier {
    async fn classify(&self, message: &str, _user_id: &str) -> Result<Classification, ServiceError> {
        Ok(self.classify_text(message))
    }
}
