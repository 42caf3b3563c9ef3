//! 外部协作方：契约（trait）与默认实现
//!
//! 编排核心只依赖这里的 trait；具体实现（OpenWeatherMap、示例住宿目录、本地知识库、关键词意图识别）
//! 由 agent 模块在启动时装配，可整体替换。

pub mod accommodation;
pub mod intent;
pub mod knowledge;
pub mod weather;

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ServiceError;

pub use accommodation::{accommodation_summary, SampleAccommodations};
pub use intent::KeywordClassifier;
pub use knowledge::{KnowledgeDoc, LexicalKnowledgeBase};
pub use weather::OpenWeatherClient;

/// 单条住宿结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Accommodation {
    pub name: String,
    /// 每晚价格（EUR）
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub amenities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_url: Option<String>,
}

/// 天气记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location: String,
    pub temperature: f64,
    pub feels_like: f64,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    pub observed_at: String,
    /// 未配置 API Key 时为 true（模拟数据）
    #[serde(default)]
    pub simulated: bool,
}

/// 知识库检索命中
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeHit {
    pub content: String,
    pub city: String,
    pub category: String,
    pub score: f32,
}

/// 意图识别器能识别的意图
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Greet,
    Goodbye,
    ResetSession,
    GetWeather,
    SearchAccommodations,
    ProvideDates,
    Unknown,
}

/// 意图识别结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub intent: Intent,
    /// 0..1
    pub confidence: f32,
    pub entities: HashMap<String, String>,
}

impl Classification {
    pub fn unknown() -> Self {
        Self {
            intent: Intent::Unknown,
            confidence: 0.0,
            entities: HashMap::new(),
        }
    }
}

/// 意图识别协作方
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, message: &str, user_id: &str) -> Result<Classification, ServiceError>;
}

/// 天气协作方
#[async_trait]
pub trait WeatherService: Send + Sync {
    /// 当前天气
    async fn current(&self, location: &str) -> Result<WeatherRecord, ServiceError>;

    /// 面向用户的天气摘要
    async fn summarize(&self, location: &str) -> Result<String, ServiceError>;
}

/// 住宿搜索协作方
#[async_trait]
pub trait AccommodationSearch: Send + Sync {
    async fn search(
        &self,
        location: &str,
        check_in: &str,
        check_out: &str,
        travelers: u32,
    ) -> Result<Vec<Accommodation>, ServiceError>;

    /// 按价格排序的摘要（最多 max_listed 条）
    fn summarize(
        &self,
        accommodations: &[Accommodation],
        location: &str,
        check_in: &str,
        check_out: &str,
        travelers: u32,
        max_listed: usize,
    ) -> String {
        accommodation_summary(accommodations, location, check_in, check_out, travelers, max_listed)
    }
}

/// 知识检索协作方
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<KnowledgeHit>, ServiceError>;

    async fn answer(&self, question: &str, city: Option<&str>) -> Result<String, ServiceError>;
}
