//! 组装根：按配置构建协作方、能力注册表与 Orchestrator
//!
//! 控制台与 Web 前端都通过 build_orchestrator 得到同一套编排器；
//! 生成后端按 [llm].provider 选择（ollama / openai / mock），provider 不可用时退回 Mock。

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{load_config, AppConfig};
use crate::core::{
    CallGuard, Collaborators, MemorySessionStore, Orchestrator, OrchestratorSettings,
};
use crate::llm::{
    GenerativeBackend, MockBackend, OllamaBackend, OllamaClient, OpenAiClient, PromptedBackend,
};
use crate::services::{
    AccommodationSearch, KeywordClassifier, KnowledgeRetriever, LexicalKnowledgeBase,
    OpenWeatherClient, SampleAccommodations, WeatherService,
};
use crate::tools::{
    AccommodationSearchTool, Capability, CapabilityDispatcher, CapabilityRegistry,
    DestinationReportTool, PointsOfInterestTool, WeatherTool,
};

/// 按配置选择生成后端
pub fn create_backend_from_config(cfg: &AppConfig) -> Arc<dyn GenerativeBackend> {
    let provider = cfg.llm.provider.to_lowercase();
    let base = cfg.llm.base_url.as_deref();
    let use_openai = provider == "openai"
        && (cfg.llm.api_key.is_some() || std::env::var("OPENAI_API_KEY").is_ok());

    if provider == "ollama" {
        let client = Arc::new(OllamaClient::new(base, &cfg.llm.model, cfg.llm.timeouts.request));
        if cfg.llm.native_tools {
            tracing::info!("Using Ollama ({}) with native tool calling", cfg.llm.model);
            Arc::new(OllamaBackend::new(client))
        } else {
            tracing::info!("Using Ollama ({}) with TOOL_CALL prompting", cfg.llm.model);
            Arc::new(PromptedBackend::new(client))
        }
    } else if use_openai {
        tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
        let client = OpenAiClient::new(base, &cfg.llm.model, cfg.llm.api_key.as_deref());
        Arc::new(PromptedBackend::new(Arc::new(client)))
    } else {
        if provider != "mock" {
            tracing::warn!("LLM provider {:?} unavailable (no API key?), using Mock backend", provider);
        }
        Arc::new(MockBackend)
    }
}

/// 默认数据协作方
pub struct DataServices {
    pub weather: Arc<dyn WeatherService>,
    pub accommodations: Arc<dyn AccommodationSearch>,
    pub knowledge: Arc<dyn KnowledgeRetriever>,
}

impl DataServices {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            weather: Arc::new(OpenWeatherClient::new(
                cfg.weather.api_key.clone(),
                cfg.weather.base_url.as_deref(),
                cfg.weather.timeout_secs,
            )),
            accommodations: Arc::new(SampleAccommodations),
            knowledge: Arc::new(
                LexicalKnowledgeBase::with_default_corpus().with_min_score(cfg.retrieval.min_score),
            ),
        }
    }
}

/// 注册四个旅行能力（顺序即呈现给 LLM 的顺序）
pub fn create_registry(cfg: &AppConfig, services: &DataServices) -> CapabilityRegistry {
    let guard = CallGuard::new(cfg.tools.tool_timeout_secs);

    let accommodations: Arc<dyn Capability> = Arc::new(AccommodationSearchTool::new(
        services.accommodations.clone(),
        guard,
        cfg.tools.default_stay_days,
        cfg.tools.max_listed_accommodations,
    ));
    let weather: Arc<dyn Capability> = Arc::new(WeatherTool::new(services.weather.clone(), guard));
    let points_of_interest: Arc<dyn Capability> = Arc::new(PointsOfInterestTool::new(
        services.knowledge.clone(),
        guard,
        cfg.tools.points_of_interest_cap,
    ));
    let report: Arc<dyn Capability> = Arc::new(DestinationReportTool::new(
        weather.clone(),
        accommodations.clone(),
        points_of_interest.clone(),
    ));

    let mut registry = CapabilityRegistry::new();
    registry.register(accommodations);
    registry.register(weather);
    registry.register(points_of_interest);
    registry.register(report);
    registry
}

/// 用给定配置与后端构建 Orchestrator
pub fn build_orchestrator_with(cfg: &AppConfig, backend: Arc<dyn GenerativeBackend>) -> Orchestrator {
    let services = DataServices::from_config(cfg);
    let registry = create_registry(cfg, &services);
    tracing::info!("Registered capabilities: {:?}", registry.names());

    Orchestrator::new(
        Collaborators {
            sessions: Arc::new(MemorySessionStore::new()),
            classifier: Arc::new(KeywordClassifier::new()),
            backend,
            retriever: services.knowledge,
        },
        CapabilityDispatcher::new(registry),
        OrchestratorSettings {
            llm_guard: CallGuard::new(cfg.llm.timeouts.request),
            data_guard: CallGuard::new(cfg.tools.tool_timeout_secs),
            retrieval_top_k: cfg.retrieval.top_k,
        },
    )
}

/// 从配置文件加载并构建；配置加载失败时使用默认配置
pub fn build_orchestrator(config_path: Option<PathBuf>) -> (AppConfig, Orchestrator) {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let backend = create_backend_from_config(&cfg);
    let orchestrator = build_orchestrator_with(&cfg, backend);
    (cfg, orchestrator)
}
