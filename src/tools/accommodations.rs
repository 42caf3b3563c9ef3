//! search_accommodations：住宿搜索
//!
//! 日期依次取参数、会话偏好，否则默认今天 ~ 今天 + stay_days；人数取参数或会话（至少 1）。
//! 原始结果写入 session.last_results.accommodations，摘要按价格升序列出最便宜的 max_listed 条。

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Datelike, Duration, Local, NaiveDate};

use crate::core::guard::CallGuard;
use crate::core::session::Session;
use crate::services::AccommodationSearch;
use crate::tools::registry::param;
use crate::tools::{Capability, CapabilityDescriptor, Parameters, ToolResult};

pub const NAME: &str = "search_accommodations";

pub struct AccommodationSearchTool {
    descriptor: CapabilityDescriptor,
    service: Arc<dyn AccommodationSearch>,
    guard: CallGuard,
    stay_days: i64,
    max_listed: usize,
}

impl AccommodationSearchTool {
    pub fn new(
        service: Arc<dyn AccommodationSearch>,
        guard: CallGuard,
        stay_days: i64,
        max_listed: usize,
    ) -> Self {
        Self {
            descriptor: CapabilityDescriptor::new(
                NAME,
                "Sucht Hotels und Unterkünfte an einem Ort, sortiert nach Preis",
            )
            .required("location", "Stadt oder Ort der Unterkunft")
            .optional("check_in", "Anreisedatum (YYYY-MM-DD)")
            .optional("check_out", "Abreisedatum (YYYY-MM-DD)")
            .optional("travelers", "Anzahl der Reisenden"),
            service,
            guard,
            stay_days,
            max_listed,
        }
    }
}

#[async_trait]
impl Capability for AccommodationSearchTool {
    fn descriptor(&self) -> &CapabilityDescriptor {
        &self.descriptor
    }

    async fn execute(&self, params: &Parameters, session: &mut Session) -> ToolResult {
        let Some(location) = param(params, "location") else {
            return ToolResult::missing_parameter(
                NAME,
                "location",
                "Bitte geben Sie einen Ort für die Unterkunftssuche an.",
            );
        };

        let today = Local::now().date_naive();
        let (check_in, check_out) = resolve_stay(params, session, today, self.stay_days);
        let travelers = param(params, "travelers")
            .and_then(|t| t.parse::<u32>().ok())
            .unwrap_or(session.preferences.travelers)
            .max(1);

        let found = self
            .guard
            .call(
                "accommodations",
                self.service.search(location, &check_in, &check_out, travelers),
            )
            .await;
        let accommodations = match found {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!("accommodation search for {} failed: {}", location, e);
                return ToolResult::failed(
                    NAME,
                    location,
                    e,
                    "Entschuldigung, bei der Hotelsuche ist ein Fehler aufgetreten.",
                );
            }
        };

        let summary = self.service.summarize(
            &accommodations,
            location,
            &check_in,
            &check_out,
            travelers,
            self.max_listed,
        );
        let payload = serde_json::json!({
            "check_in": check_in,
            "check_out": check_out,
            "travelers": travelers,
            "accommodations": accommodations,
        });
        session.last_results.accommodations = Some(accommodations);
        ToolResult::ok(NAME, location, payload, summary)
    }
}

/// (check_in, check_out)，格式 YYYY-MM-DD
fn resolve_stay(params: &Parameters, session: &Session, today: NaiveDate, stay_days: i64) -> (String, String) {
    let prefs = &session.preferences;
    let check_in = param(params, "check_in")
        .or(prefs.start_date.as_deref())
        .and_then(|d| parse_date(d, today))
        .unwrap_or(today);
    let check_out = param(params, "check_out")
        .or(prefs.end_date.as_deref())
        .and_then(|d| parse_date(d, today))
        .filter(|d| *d > check_in)
        .unwrap_or(check_in + Duration::days(stay_days));
    (
        check_in.format("%Y-%m-%d").to_string(),
        check_out.format("%Y-%m-%d").to_string(),
    )
}

/// 支持 YYYY-MM-DD、D.M.YYYY、D.M（缺年份取今年）
fn parse_date(raw: &str, today: NaiveDate) -> Option<NaiveDate> {
    let raw = raw.trim().trim_end_matches('.');
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%d.%m.%Y") {
        return Some(d);
    }
    let mut parts = raw.split('.');
    let day = parts.next()?.parse::<u32>().ok()?;
    let month = parts.next()?.parse::<u32>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(today.year(), month, day)
}
