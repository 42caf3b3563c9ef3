//! 对外响应与建议生成
//!
//! DispatchResponse 是编排核心唯一的对外对象（序列化为 JSON）。除 ERROR 外建议列表永不为空：
//! 用过工具时推荐同一地点的其他能力，没有上下文时给固定的通用建议。

use serde::{Deserialize, Serialize};

use crate::tools::{accommodations, destination_report, points_of_interest, weather};
use crate::tools::{Parameters, ToolResult};

/// 响应类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    Greeting,
    SessionReset,
    Goodbye,
    ToolResponse,
    General,
    RagResponse,
    MissingInfo,
    Error,
}

/// 对外响应
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    #[serde(rename = "type")]
    pub kind: ResponseKind,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_used: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_parameters: Option<Parameters>,
    pub suggestions: Vec<String>,
}

const GENERIC_SUGGESTIONS: &[&str] = &[
    "Wie ist das Wetter in Wien?",
    "Hotels in Barcelona finden",
    "Hotels in Kopenhagen finden",
    "Wetter in London abfragen",
    "Wo finde ich die schönsten Sehenswürdigkeiten in Paris?",
    "Was kann ich in Rom besichtigen?",
    "Empfehlungen für Amsterdam",
    "Was sollte ich in Berlin sehen?",
];

const ERROR_SUGGESTIONS: &[&str] = &["Versuchen Sie es erneut", "Formulieren Sie Ihre Anfrage anders"];

const RESET_SUGGESTION: &str = "Alles zurücksetzen";

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn weather_hint(location: &str) -> String {
    format!("Wie ist das Wetter in {}?", location)
}

fn hotels_hint(location: &str) -> String {
    format!("Hotels in {} finden", location)
}

fn sights_hint(location: &str) -> String {
    format!("Sehenswürdigkeiten in {}", location)
}

fn report_hint(location: &str) -> String {
    format!("Reisebericht für {}", location)
}

/// 用过某个工具后的建议：同一地点的其他能力
pub fn suggestions_after(tool: &str, location: Option<&str>) -> Vec<String> {
    let Some(location) = location.filter(|l| !l.trim().is_empty()) else {
        return owned(GENERIC_SUGGESTIONS);
    };
    let mut list = match tool {
        weather::NAME => vec![hotels_hint(location), sights_hint(location), report_hint(location)],
        accommodations::NAME => vec![weather_hint(location), sights_hint(location), report_hint(location)],
        points_of_interest::NAME => vec![weather_hint(location), hotels_hint(location), report_hint(location)],
        destination_report::NAME => vec![weather_hint(location), hotels_hint(location), sights_hint(location)],
        _ => return suggestions_for_place(Some(location)),
    };
    list.push(RESET_SUGGESTION.to_string());
    list
}

/// 无工具上下文时：有地点则推荐该地点的能力，否则通用建议
pub fn suggestions_for_place(location: Option<&str>) -> Vec<String> {
    match location.filter(|l| !l.trim().is_empty()) {
        Some(location) => vec![weather_hint(location), hotels_hint(location), sights_hint(location)],
        None => owned(GENERIC_SUGGESTIONS),
    }
}

/// 缺少参数时的示例输入
fn missing_info_examples(tool: &str) -> Vec<String> {
    let examples: &[&str] = match tool {
        weather::NAME => &[
            "Wie ist das Wetter in Berlin?",
            "Wetter in München",
            "Temperatur in Hamburg",
            "Klima in Wien",
        ],
        accommodations::NAME => &[
            "Hotels in Berlin finden",
            "Hotels in Paris vom 1.11 bis 5.11",
            "Unterkünfte in Wien",
        ],
        points_of_interest::NAME => &[
            "Sehenswürdigkeiten in Rom",
            "Was kann ich in Paris besichtigen?",
            "Was sollte ich in Berlin sehen?",
        ],
        destination_report::NAME => &["Reisebericht für Paris", "Reisebericht für Barcelona"],
        _ => GENERIC_SUGGESTIONS,
    };
    owned(examples)
}

/// 各类响应的构造
pub struct ResponseComposer;

impl ResponseComposer {
    pub fn greeting() -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::Greeting,
            message: "Hallo! Ich bin Ihr TravelGuide. Wie kann ich Ihnen helfen?".to_string(),
            tool_used: None,
            tool_parameters: None,
            suggestions: owned(GENERIC_SUGGESTIONS),
        }
    }

    pub fn session_reset() -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::SessionReset,
            message: "Perfekt! Lassen Sie uns eine neue Reise planen!\n\nIch helfe Ihnen gerne bei der Reiseplanung! Hier sind einige Möglichkeiten:".to_string(),
            tool_used: None,
            tool_parameters: None,
            suggestions: owned(GENERIC_SUGGESTIONS),
        }
    }

    pub fn goodbye() -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::Goodbye,
            message: "Vielen Dank für die Nutzung des TravelGuide! Ich wünsche Ihnen eine wundervolle Reise! 🌍".to_string(),
            tool_used: None,
            tool_parameters: None,
            suggestions: vec!["Neue Reise planen".to_string()],
        }
    }

    pub fn tool_response(result: &ToolResult, parameters: Parameters, message: String) -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::ToolResponse,
            message,
            tool_used: Some(result.tool.clone()),
            tool_parameters: Some(parameters),
            suggestions: suggestions_after(&result.tool, result.location.as_deref()),
        }
    }

    /// 缺少必填参数：提示用户补充
    pub fn missing_info(result: &ToolResult, parameters: Parameters) -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::MissingInfo,
            message: result.summary.clone(),
            tool_used: Some(result.tool.clone()),
            tool_parameters: Some(parameters),
            suggestions: missing_info_examples(&result.tool),
        }
    }

    pub fn unknown_capability(name: &str) -> DispatchResponse {
        let name = if name.is_empty() { "ohne Namen" } else { name };
        DispatchResponse {
            kind: ResponseKind::General,
            message: format!(
                "Diese Funktion ist mir unbekannt ({}). Ich kann Wetter, Unterkünfte, Sehenswürdigkeiten und Reiseberichte abrufen.",
                name
            ),
            tool_used: None,
            tool_parameters: None,
            suggestions: owned(GENERIC_SUGGESTIONS),
        }
    }

    pub fn general(message: String, location: Option<&str>) -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::General,
            message,
            tool_used: None,
            tool_parameters: None,
            suggestions: suggestions_for_place(location),
        }
    }

    pub fn rag(message: String, location: &str) -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::RagResponse,
            message,
            tool_used: None,
            tool_parameters: None,
            suggestions: suggestions_for_place(Some(location)),
        }
    }

    pub fn error() -> DispatchResponse {
        DispatchResponse {
            kind: ResponseKind::Error,
            message: "Entschuldigung, es gab einen Fehler bei der Verarbeitung Ihrer Anfrage.".to_string(),
            tool_used: None,
            tool_parameters: None,
            suggestions: owned(ERROR_SUGGESTIONS),
        }
    }
}
