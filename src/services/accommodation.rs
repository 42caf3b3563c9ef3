//! 住宿：示例目录与按价格排序的摘要
//!
//! 真实的住宿数据源（抓取 / 第三方 API）不在本 crate 内；SampleAccommodations 按地点生成确定性的示例数据，
//! 供控制台与 Web 前端在无外部数据源时跑通完整流程。

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::ServiceError;
use crate::services::{Accommodation, AccommodationSearch};

/// 示例住宿目录：(名称后缀, 基础价格, 评分, 设施)
const SAMPLE_LISTINGS: &[(&str, f64, f32, &[&str])] = &[
    ("Altstadt Hotel", 129.0, 4.5, &["WLAN", "Frühstück", "Bar"]),
    ("City Hostel", 39.0, 4.0, &["WLAN", "Gemeinschaftsküche"]),
    ("Bahnhof Inn", 89.0, 4.1, &["WLAN", "24h-Rezeption"]),
    ("Grand Palace", 249.0, 4.8, &["Spa", "Restaurant", "Fitness", "Parkplatz"]),
    ("Pension am Park", 89.0, 4.3, &["Frühstück", "Garten"]),
    ("Design Apartments", 115.0, 4.4, &["Küche", "WLAN", "Waschmaschine"]),
    ("Boutique Loft", 159.0, 4.6, &["WLAN", "Dachterrasse"]),
];

/// 示例住宿数据源
#[derive(Debug, Default, Clone)]
pub struct SampleAccommodations;

#[async_trait]
impl AccommodationSearch for SampleAccommodations {
    async fn search(
        &self,
        location: &str,
        _check_in: &str,
        _check_out: &str,
        travelers: u32,
    ) -> Result<Vec<Accommodation>, ServiceError> {
        let location = location.trim();
        if location.is_empty() {
            return Err(ServiceError::InvalidResponse("empty location".into()));
        }
        // 人数越多价格越高；按地点名长度做微小偏移，保证不同城市结果不同但可复现
        let surcharge = 1.0 + 0.25 * travelers.saturating_sub(1) as f64;
        let offset = (location.chars().count() % 5) as f64 * 3.0;
        let slug = location.to_lowercase().replace(' ', "-");
        Ok(SAMPLE_LISTINGS
            .iter()
            .map(|(suffix, price, rating, amenities)| Accommodation {
                name: format!("{} {}", location, suffix),
                price: ((price + offset) * surcharge).round(),
                rating: Some(*rating),
                address: Some(format!("Zentrum, {}", location)),
                amenities: amenities.iter().map(|a| a.to_string()).collect(),
                booking_url: Some(format!(
                    "https://example.org/hotels/{}/{}",
                    slug,
                    suffix.to_lowercase().replace(' ', "-")
                )),
            })
            .collect())
    }
}

/// 按价格升序（稳定排序：同价保持原顺序）生成摘要，最多列出 max_listed 条
pub fn accommodation_summary(
    accommodations: &[Accommodation],
    location: &str,
    check_in: &str,
    check_out: &str,
    travelers: u32,
    max_listed: usize,
) -> String {
    if accommodations.is_empty() {
        return format!("Keine Unterkünfte in {} gefunden.", location);
    }

    let mut ranked: Vec<&Accommodation> = accommodations.iter().collect();
    ranked.sort_by(|a, b| a.price.total_cmp(&b.price));

    let shown = ranked.len().min(max_listed);
    let mut summary = format!(
        "Zeitraum: {} bis {}\nPersonen: {}\n\nGefunden: {} Unterkünfte in {} (sortiert nach Preis)\n\n",
        display_date(check_in),
        display_date(check_out),
        travelers,
        shown,
        location
    );

    for (i, acc) in ranked.iter().take(max_listed).enumerate() {
        summary.push_str(&format!("{}. {}\n", i + 1, acc.name));
        summary.push_str(&format!("   Preis: {:.0} EUR pro Nacht\n", acc.price));
        if let Some(address) = &acc.address {
            summary.push_str(&format!("   Adresse: {}\n", address));
        }
        if !acc.amenities.is_empty() {
            let amenities: Vec<&str> = acc.amenities.iter().take(3).map(String::as_str).collect();
            summary.push_str(&format!("   Ausstattung: {}\n", amenities.join(", ")));
        }
        if let Some(url) = &acc.booking_url {
            summary.push_str(&format!("   Buchung: {}\n", url));
        }
        summary.push('\n');
    }

    summary.trim_end().to_string()
}

/// YYYY-MM-DD -> DD.MM.YYYY；其他格式原样返回
fn display_date(date: &str) -> String {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .map(|d| d.format("%d.%m.%Y").to_string())
        .unwrap_or_else(|_| date.to_string())
}
