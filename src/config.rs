//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `TRAVELGUIDE__*` 覆盖（双下划线表示嵌套，如 `TRAVELGUIDE__LLM__PROVIDER=ollama`）。
//! 每个段都有默认值，没有配置文件也能直接运行。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub tools: ToolsSection,
    pub weather: WeatherSection,
    pub retrieval: RetrievalSection,
    pub web: WebSection,
}

/// [app] 段：应用名与控制台默认用户
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub default_user: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "TravelGuide".to_string(),
            default_user: "cli".to_string(),
        }
    }
}

/// [llm] 段：后端选择与超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// 后端：ollama / openai / mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// ollama 是否使用原生 tools（否则只用 TOOL_CALL 文本协议）
    pub native_tools: bool,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "mock".to_string(),
            model: "llama3.1".to_string(),
            base_url: None,
            api_key: None,
            native_tools: true,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    /// 单次生成请求超时（秒）
    pub request: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self { request: 60 }
    }
}

/// [tools] 段：工具超时与各能力的默认值
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// 单次协作方调用超时（秒）
    pub tool_timeout_secs: u64,
    /// 未给日期时的默认住宿天数
    pub default_stay_days: i64,
    /// 住宿摘要最多列出的条数
    pub max_listed_accommodations: usize,
    /// 景点摘要最多列出的条数
    pub points_of_interest_cap: usize,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: 30,
            default_stay_days: 7,
            max_listed_accommodations: 5,
            points_of_interest_cap: 3,
        }
    }
}

/// [weather] 段：OpenWeatherMap
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WeatherSection {
    /// 未设置时读 OPENWEATHER_API_KEY；都没有则返回模拟数据
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WeatherSection {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: None,
            timeout_secs: 10,
        }
    }
}

/// [retrieval] 段：知识检索
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrievalSection {
    pub top_k: usize,
    /// 低于此相似度的命中被丢弃
    pub min_score: f32,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_score: 0.1,
        }
    }
}

/// [web] 段
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebSection {
    pub port: u16,
}

impl Default for WebSection {
    fn default() -> Self {
        Self { port: 5001 }
    }
}

/// 从 config 目录加载配置，环境变量 TRAVELGUIDE__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 TRAVELGUIDE__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("TRAVELGUIDE")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
