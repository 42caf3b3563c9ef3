//! 天气：OpenWeatherMap 客户端
//!
//! 地理编码 -> 当前天气（公制、德语描述）；摘要附带 5 天预报。
//! 未配置 API Key 时返回明确标注的模拟数据，便于离线运行。
//! 地理编码结果按地名缓存，current 与 summarize 共用同一次查询。

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::RwLock;

use crate::core::ServiceError;
use crate::services::{WeatherRecord, WeatherService};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// 预报摘要中列出的天数
const FORECAST_DAYS: usize = 5;

/// 坐标缓存上限，超出时整体清空
const GEO_CACHE_LIMIT: usize = 256;

#[derive(Debug, Deserialize)]
struct GeoEntry {
    lat: f64,
    lon: f64,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    #[serde(default)]
    feels_like: f64,
}

#[derive(Debug, Deserialize)]
struct ConditionBlock {
    description: String,
    #[serde(default)]
    icon: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct ForecastItem {
    dt: i64,
    main: MainBlock,
    weather: Vec<ConditionBlock>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    list: Vec<ForecastItem>,
}

/// OpenWeatherMap 客户端：api_key 为空时走模拟数据
pub struct OpenWeatherClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    geo_cache: RwLock<HashMap<String, (f64, f64)>>,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>, base_url: Option<&str>, timeout_secs: u64) -> Self {
        let api_key = api_key
            .filter(|k| !k.trim().is_empty())
            .or_else(|| std::env::var("OPENWEATHER_API_KEY").ok());
        if api_key.is_none() {
            tracing::warn!("OpenWeatherMap API key not set, weather data will be simulated");
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: base_url
                .unwrap_or(OPENWEATHER_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            api_key,
            geo_cache: RwLock::new(HashMap::new()),
        }
    }

    async fn coordinates(&self, key: &str, location: &str) -> Result<(f64, f64), ServiceError> {
        let cache_key = location.trim().to_lowercase();
        if let Some(coords) = self.geo_cache.read().await.get(&cache_key) {
            return Ok(*coords);
        }
        let coords = self.geocode(key, location).await?;
        let mut cache = self.geo_cache.write().await;
        if cache.len() >= GEO_CACHE_LIMIT {
            cache.clear();
        }
        cache.insert(cache_key, coords);
        Ok(coords)
    }

    async fn geocode(&self, key: &str, location: &str) -> Result<(f64, f64), ServiceError> {
        let entries: Vec<GeoEntry> = self
            .client
            .get(format!("{}/geo/1.0/direct", self.base_url))
            .query(&[("q", location), ("limit", "1"), ("appid", key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        entries
            .first()
            .map(|e| (e.lat, e.lon))
            .ok_or_else(|| ServiceError::InvalidResponse(format!("unknown location: {}", location)))
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(
        &self,
        endpoint: &str,
        key: &str,
        (lat, lon): (f64, f64),
    ) -> Result<T, ServiceError> {
        let lat = lat.to_string();
        let lon = lon.to_string();
        let body = self
            .client
            .get(format!("{}/data/2.5/{}", self.base_url, endpoint))
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", key),
                ("units", "metric"),
                ("lang", "de"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(body)
    }

    /// 每天取第一条预报，最多 FORECAST_DAYS 天
    async fn forecast_lines(&self, key: &str, coords: (f64, f64)) -> Result<Vec<String>, ServiceError> {
        let forecast: ForecastResponse = self.fetch("forecast", key, coords).await?;
        let mut seen = BTreeSet::new();
        let mut lines = Vec::new();
        for item in forecast.list {
            let Some(when) = DateTime::from_timestamp(item.dt, 0) else {
                continue;
            };
            let day = when.with_timezone(&Local).format("%d.%m").to_string();
            if seen.len() >= FORECAST_DAYS || !seen.insert(day.clone()) {
                continue;
            }
            let description = item
                .weather
                .first()
                .map(|w| w.description.as_str())
                .unwrap_or("-");
            lines.push(format!("• {}: {:.0}°C, {}", day, item.main.temp, description));
        }
        Ok(lines)
    }
}

/// 无 API Key 时的模拟天气
fn simulated(location: &str) -> WeatherRecord {
    WeatherRecord {
        location: location.to_string(),
        temperature: 20.0,
        feels_like: 22.0,
        description: "Leicht bewölkt".to_string(),
        icon: Some("02d".to_string()),
        observed_at: Local::now().to_rfc3339(),
        simulated: true,
    }
}

/// 单条天气记录的一行描述
pub fn describe(record: &WeatherRecord) -> String {
    if record.simulated {
        return format!(
            "Wetter in {}: {} bei {:.0}°C (Simulation)",
            record.location, record.description, record.temperature
        );
    }
    format!(
        "Wetter in {}:\n• Temperatur: {:.0}°C (gefühlt {:.0}°C)\n• Beschreibung: {}",
        record.location, record.temperature, record.feels_like, record.description
    )
}

#[async_trait]
impl WeatherService for OpenWeatherClient {
    async fn current(&self, location: &str) -> Result<WeatherRecord, ServiceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Ok(simulated(location));
        };
        let coords = self.coordinates(key, location).await?;
        let current: CurrentResponse = self.fetch("weather", key, coords).await?;
        let condition = current
            .weather
            .first()
            .ok_or_else(|| ServiceError::InvalidResponse("missing weather block".into()))?;
        Ok(WeatherRecord {
            location: location.to_string(),
            temperature: current.main.temp.round(),
            feels_like: current.main.feels_like.round(),
            description: condition.description.clone(),
            icon: condition.icon.clone(),
            observed_at: Local::now().to_rfc3339(),
            simulated: false,
        })
    }

    async fn summarize(&self, location: &str) -> Result<String, ServiceError> {
        let record = self.current(location).await?;
        let mut summary = describe(&record);
        if let Some(key) = self.api_key.as_deref() {
            // 预报失败不影响当前天气摘要
            let forecast = match self.coordinates(key, location).await {
                Ok(coords) => self.forecast_lines(key, coords).await,
                Err(e) => Err(e),
            };
            match forecast {
                Ok(lines) if !lines.is_empty() => {
                    summary.push_str("\n\n5-Tage Vorhersage:\n");
                    summary.push_str(&lines.join("\n"));
                }
                Ok(_) => {}
                Err(e) => tracing::warn!("forecast for {} unavailable: {}", location, e),
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_without_key_returns_simulated_record() {
        let client = OpenWeatherClient {
            client: Client::new(),
            base_url: OPENWEATHER_BASE_URL.to_string(),
            api_key: None,
            geo_cache: RwLock::new(HashMap::new()),
        };
        let record = client.current("Wien").await.unwrap();
        assert!(record.simulated);
        let summary = client.summarize("Wien").await.unwrap();
        assert!(summary.contains("Wien"));
        assert!(summary.contains("Simulation"));
    }

    #[test]
    fn test_describe_real_record() {
        let record = WeatherRecord {
            location: "Berlin".into(),
            temperature: 14.0,
            feels_like: 12.0,
            description: "Klarer Himmel".into(),
            icon: None,
            observed_at: "2026-10-19T12:00:00+02:00".into(),
            simulated: false,
        };
        let text = describe(&record);
        assert!(text.contains("Temperatur: 14°C (gefühlt 12°C)"));
        assert!(text.contains("Klarer Himmel"));
    }

    /// 本地 HTTP 桩：统计地理编码请求次数
    async fn spawn_owm_stub(geo_hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            loop {
                let Ok((mut socket, _)) = listener.accept().await else {
                    break;
                };
                let geo_hits = geo_hits.clone();
                tokio::spawn(async move {
                    let mut request = Vec::new();
                    let mut buf = [0u8; 1024];
                    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => return,
                            Ok(n) => request.extend_from_slice(&buf[..n]),
                        }
                    }
                    let head = String::from_utf8_lossy(&request);
                    let body = if head.starts_with("GET /geo/") {
                        geo_hits.fetch_add(1, Ordering::SeqCst);
                        r#"[{"lat": 48.2, "lon": 16.37}]"#
                    } else if head.starts_with("GET /data/2.5/weather") {
                        r#"{"main": {"temp": 14.2, "feels_like": 12.0}, "weather": [{"description": "klarer Himmel", "icon": "01d"}]}"#
                    } else {
                        r#"{"list": [{"dt": 1760868000, "main": {"temp": 15.0}, "weather": [{"description": "sonnig"}]}]}"#
                    };
                    let response = format!(
                        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                        body.len(),
                        body
                    );
                    let _ = socket.write_all(response.as_bytes()).await;
                });
            }
        });
        format!("http://{}", addr)
    }

    #[tokio::test]
    async fn test_current_and_summary_share_one_geocode() {
        let geo_hits = Arc::new(AtomicUsize::new(0));
        let base_url = spawn_owm_stub(geo_hits.clone()).await;
        let client = OpenWeatherClient::new(Some("test-key".into()), Some(&base_url), 5);

        let record = client.current("Wien").await.unwrap();
        assert!(!record.simulated);
        assert_eq!(record.temperature, 14.0);

        let summary = client.summarize("Wien").await.unwrap();
        assert!(summary.contains("klarer Himmel"));
        assert!(summary.contains("5-Tage Vorhersage"));
        assert_eq!(geo_hits.load(Ordering::SeqCst), 1);
    }
}
