//! 编排集成测试：真实能力 + 桩协作方 + 预设后端

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use travelguide::core::{
        CallGuard, Collaborators, MemorySessionStore, Orchestrator, OrchestratorSettings,
        ResponseKind, ServiceError, Session,
    };
    use travelguide::llm::{GenerativeBackend, ModelReply, ScriptedBackend};
    use travelguide::services::{
        Accommodation, AccommodationSearch, KeywordClassifier, LexicalKnowledgeBase, WeatherRecord,
        WeatherService,
    };
    use travelguide::tools::{
        AccommodationSearchTool, Capability, CapabilityDescriptor, CapabilityDispatcher,
        CapabilityRegistry, DestinationReportTool, Parameters, PointsOfInterestTool, ToolResult,
        WeatherTool,
    };

    #[derive(Debug, Clone, PartialEq)]
    struct SearchCall {
        location: String,
        check_in: String,
        check_out: String,
        travelers: u32,
    }

    /// 记录调用参数与并发峰值的住宿桩
    #[derive(Default)]
    struct RecordingSearch {
        calls: Mutex<Vec<SearchCall>>,
        delay: Option<Duration>,
        fail: bool,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
    }

    impl RecordingSearch {
        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Default::default()
            }
        }

        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn calls(&self) -> Vec<SearchCall> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl AccommodationSearch for RecordingSearch {
        async fn search(
            &self,
            location: &str,
            check_in: &str,
            check_out: &str,
            travelers: u32,
        ) -> Result<Vec<Accommodation>, ServiceError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            self.calls.lock().unwrap().push(SearchCall {
                location: location.to_string(),
                check_in: check_in.to_string(),
                check_out: check_out.to_string(),
                travelers,
            });
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail {
                return Err(ServiceError::Unavailable("booking site down".into()));
            }
            Ok(vec![Accommodation {
                name: format!("Hotel {}", location),
                price: 89.0,
                rating: Some(4.2),
                address: None,
                amenities: vec!["WLAN".to_string()],
                booking_url: None,
            }])
        }
    }

    struct DownWeather;

    #[async_trait]
    impl WeatherService for DownWeather {
        async fn current(&self, _location: &str) -> Result<WeatherRecord, ServiceError> {
            Err(ServiceError::Unavailable("weather api down".into()))
        }

        async fn summarize(&self, _location: &str) -> Result<String, ServiceError> {
            Err(ServiceError::Unavailable("weather api down".into()))
        }
    }

    struct ClearWeather;

    #[async_trait]
    impl WeatherService for ClearWeather {
        async fn current(&self, location: &str) -> Result<WeatherRecord, ServiceError> {
            Ok(WeatherRecord {
                location: location.to_string(),
                temperature: 18.0,
                feels_like: 17.0,
                description: "Klarer Himmel".to_string(),
                icon: None,
                observed_at: "2026-10-19T12:00:00+02:00".to_string(),
                simulated: false,
            })
        }

        async fn summarize(&self, location: &str) -> Result<String, ServiceError> {
            Ok(format!("Wetter in {}: Klarer Himmel bei 18°C", location))
        }
    }

    /// 消息含 stall_on 时模型查询一直挂起，否则请求 Berlin 的住宿
    struct StallingBackend {
        stall_on: &'static str,
    }

    #[async_trait]
    impl GenerativeBackend for StallingBackend {
        async fn respond_with_tools(
            &self,
            message: &str,
            _catalogue: &[CapabilityDescriptor],
        ) -> Result<ModelReply, ServiceError> {
            if message.contains(self.stall_on) {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            Ok(hotels_in("Berlin"))
        }

        async fn phrase_followup(&self, result: &ToolResult, _original: &str) -> Result<String, ServiceError> {
            Ok(result.summary.clone())
        }

        async fn answer(&self, _message: &str) -> Result<String, ServiceError> {
            Ok(String::new())
        }
    }

    fn params(pairs: &[(&str, &str)]) -> Parameters {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(search: Arc<RecordingSearch>, backend: Arc<ScriptedBackend>) -> Orchestrator {
        build_with(search, Arc::new(DownWeather), backend, OrchestratorSettings::default())
    }

    fn build_with(
        search: Arc<RecordingSearch>,
        weather_service: Arc<dyn WeatherService>,
        backend: Arc<dyn GenerativeBackend>,
        settings: OrchestratorSettings,
    ) -> Orchestrator {
        let guard = CallGuard::new(5);
        let knowledge = Arc::new(LexicalKnowledgeBase::with_default_corpus());

        let accommodations: Arc<dyn Capability> =
            Arc::new(AccommodationSearchTool::new(search, guard, 7, 5));
        let weather: Arc<dyn Capability> = Arc::new(WeatherTool::new(weather_service, guard));
        let points_of_interest: Arc<dyn Capability> =
            Arc::new(PointsOfInterestTool::new(knowledge.clone(), guard, 3));
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

        Orchestrator::new(
            Collaborators {
                sessions: Arc::new(MemorySessionStore::new()),
                classifier: Arc::new(KeywordClassifier::new()),
                backend,
                retriever: knowledge,
            },
            CapabilityDispatcher::new(registry),
            settings,
        )
    }

    fn hotels_in(city: &str) -> ModelReply {
        ModelReply::tool_call(
            "",
            "search_accommodations",
            Some(params(&[("location", city)])),
        )
    }

    #[tokio::test]
    async fn test_hotel_search_defaults_stay_and_records_destination() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(ScriptedBackend::new(vec![hotels_in("Berlin")]));
        let orchestrator = build(search.clone(), backend.clone());

        let response = orchestrator.handle("Hotels in Berlin", "u1").await;

        assert_eq!(response.kind, ResponseKind::ToolResponse);
        assert_eq!(response.tool_used.as_deref(), Some("search_accommodations"));
        assert!(response.message.starts_with("Antwort: "));
        assert!(!response.suggestions.is_empty());

        let today = chrono::Local::now().date_naive();
        let calls = search.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].location, "Berlin");
        assert_eq!(calls[0].check_in, today.format("%Y-%m-%d").to_string());
        assert_eq!(
            calls[0].check_out,
            (today + chrono::Duration::days(7)).format("%Y-%m-%d").to_string()
        );
        assert_eq!(calls[0].travelers, 1);

        let session = orchestrator.sessions().get_or_create("u1").await;
        assert_eq!(session.preferences.destination.as_deref(), Some("Berlin"));
        assert_eq!(
            session.last_results.accommodations.map(|a| a.len()),
            Some(1)
        );
        assert_eq!(backend.followups(), 1);
    }

    #[tokio::test]
    async fn test_greeting_and_reset_shortcuts() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(ScriptedBackend::new(vec![hotels_in("Berlin")]));
        let orchestrator = build(search, backend.clone());

        let greeting = orchestrator.handle("Hallo", "u1").await;
        assert_eq!(greeting.kind, ResponseKind::Greeting);
        assert!(!greeting.suggestions.is_empty());
        assert_eq!(backend.tool_queries(), 0);

        orchestrator.handle("Hotels in Berlin", "u1").await;
        let reset = orchestrator.handle("Alles zurücksetzen", "u1").await;
        assert_eq!(reset.kind, ResponseKind::SessionReset);
        assert_eq!(
            orchestrator.sessions().get_or_create("u1").await,
            Session::default()
        );
    }

    #[tokio::test]
    async fn test_weather_without_any_location_asks_for_it() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(ScriptedBackend::new(vec![ModelReply::tool_call(
            "",
            "get_weather",
            Some(Parameters::new()),
        )]));
        let orchestrator = build(search, backend.clone());

        let response = orchestrator.handle("Wie ist das Wetter?", "u1").await;

        assert_eq!(response.kind, ResponseKind::MissingInfo);
        assert_eq!(response.tool_used.as_deref(), Some("get_weather"));
        assert!(response.message.contains("Ort"));
        assert_eq!(backend.followups(), 0);
    }

    #[tokio::test]
    async fn test_report_survives_failed_weather_section() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(
            ScriptedBackend::new(vec![ModelReply::tool_call(
                "",
                "get_destination_report",
                Some(params(&[("location", "Paris")])),
            )])
            .with_followup(Ok(String::new())),
        );
        let orchestrator = build(search.clone(), backend);

        let response = orchestrator.handle("Reisebericht für Paris", "u1").await;

        assert_eq!(response.kind, ResponseKind::ToolResponse);
        assert_eq!(response.tool_used.as_deref(), Some("get_destination_report"));
        assert!(response.message.contains("=== Wetter ===\nDaten nicht verfügbar"));
        assert!(response.message.contains("Hotel Paris"));
        assert_eq!(search.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_capability_touches_no_collaborator() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(ScriptedBackend::new(vec![ModelReply::tool_call(
            "",
            "book_flight",
            Some(params(&[("location", "Rom")])),
        )]));
        let orchestrator = build(search.clone(), backend.clone());

        let response = orchestrator.handle("Buche mir einen Flug", "u1").await;

        assert_eq!(response.kind, ResponseKind::General);
        assert!(response.message.contains("book_flight"));
        assert!(response.tool_used.is_none());
        assert!(search.calls().is_empty());
        assert_eq!(backend.followups(), 0);
    }

    #[tokio::test]
    async fn test_malformed_marker_becomes_general_answer() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(
            ScriptedBackend::new(vec![ModelReply::text(
                "TOOL_CALL: {\"tool\": \"get_weather\", \"parameters\": ",
            )])
            .with_answer("Wie kann ich helfen?"),
        );
        let orchestrator = build(search.clone(), backend);

        let response = orchestrator.handle("Erzähl mir etwas", "u1").await;

        assert_eq!(response.kind, ResponseKind::General);
        assert_eq!(response.message, "Wie kann ich helfen?");
        assert!(search.calls().is_empty());
    }

    #[tokio::test]
    async fn test_failed_turn_leaves_session_untouched() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(ScriptedBackend::new(vec![
            hotels_in("Berlin"),
            ModelReply::tool_call("", "get_weather", Some(params(&[("location", "Paris")]))),
        ]));
        let orchestrator = build(search, backend);

        orchestrator.handle("Hotels in Berlin", "u1").await;
        let before = orchestrator.sessions().get_or_create("u1").await;

        let response = orchestrator.handle("Wetter in Paris", "u1").await;

        assert_eq!(response.kind, ResponseKind::Error);
        assert_eq!(orchestrator.sessions().get_or_create("u1").await, before);
        assert_eq!(before.preferences.destination.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn test_failed_accommodation_search_is_error_response() {
        let search = Arc::new(RecordingSearch::failing());
        let backend = Arc::new(ScriptedBackend::new(vec![hotels_in("Wien")]));
        let orchestrator = build(search, backend.clone());

        let response = orchestrator.handle("Hotels in Wien", "u1").await;

        assert_eq!(response.kind, ResponseKind::Error);
        assert_eq!(backend.followups(), 0);
        let session = orchestrator.sessions().get_or_create("u1").await;
        assert!(session.preferences.destination.is_none());
    }

    #[tokio::test]
    async fn test_same_user_turns_are_serialized() {
        let search = Arc::new(RecordingSearch::slow(Duration::from_millis(100)));
        let backend = Arc::new(ScriptedBackend::new(vec![
            hotels_in("Berlin"),
            hotels_in("Paris"),
        ]));
        let orchestrator = Arc::new(build(search.clone(), backend));

        let (a, b) = tokio::join!(
            orchestrator.handle("Hotels in Berlin", "same"),
            orchestrator.handle("Hotels in Paris", "same"),
        );

        assert_eq!(a.kind, ResponseKind::ToolResponse);
        assert_eq!(b.kind, ResponseKind::ToolResponse);
        assert_eq!(search.peak.load(Ordering::SeqCst), 1);
        assert_eq!(search.calls().len(), 2);
    }

    #[tokio::test]
    async fn test_different_users_run_concurrently() {
        let search = Arc::new(RecordingSearch::slow(Duration::from_millis(200)));
        let backend = Arc::new(ScriptedBackend::new(vec![
            hotels_in("Berlin"),
            hotels_in("Paris"),
        ]));
        let orchestrator = Arc::new(build(search.clone(), backend));

        let (a, b) = tokio::join!(
            orchestrator.handle("Hotels in Berlin", "anna"),
            orchestrator.handle("Hotels in Paris", "ben"),
        );

        assert_eq!(a.kind, ResponseKind::ToolResponse);
        assert_eq!(b.kind, ResponseKind::ToolResponse);
        assert_eq!(search.peak.load(Ordering::SeqCst), 2);
        assert_eq!(orchestrator.sessions().active_count().await, 2);
    }

    #[tokio::test]
    async fn test_keyword_route_when_model_calls_no_tool() {
        let search = Arc::new(RecordingSearch::default());
        let backend = Arc::new(ScriptedBackend::new(Vec::new()));
        let orchestrator = build(search.clone(), backend.clone());

        let response = orchestrator.handle("Hotels in Berlin", "u1").await;

        assert_eq!(backend.tool_queries(), 1);
        assert_eq!(response.kind, ResponseKind::ToolResponse);
        assert_eq!(response.tool_used.as_deref(), Some("search_accommodations"));
        assert_eq!(
            response.tool_parameters.as_ref().and_then(|p| p.get("location")).map(String::as_str),
            Some("Berlin")
        );
        let calls = search.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].location, "Berlin");
        assert_eq!(calls[0].travelers, 1);
        let session = orchestrator.sessions().get_or_create("u1").await;
        assert_eq!(session.preferences.destination.as_deref(), Some("Berlin"));
    }

    #[tokio::test]
    async fn test_climate_question_keeps_the_named_city() {
        let search = Arc::new(RecordingSearch::default());
        let orchestrator = build_with(
            search,
            Arc::new(ClearWeather),
            Arc::new(ScriptedBackend::new(Vec::new())),
            OrchestratorSettings::default(),
        );

        let response = orchestrator.handle("Wie ist das Klima in Dresden?", "u1").await;

        assert_eq!(response.kind, ResponseKind::ToolResponse);
        assert_eq!(response.tool_used.as_deref(), Some("get_weather"));
        assert!(response.message.contains("Dresden"));
        let session = orchestrator.sessions().get_or_create("u1").await;
        assert_eq!(session.preferences.destination.as_deref(), Some("Dresden"));
    }

    #[tokio::test]
    async fn test_stalled_model_times_out_without_touching_session() {
        let search = Arc::new(RecordingSearch::default());
        let settings = OrchestratorSettings {
            llm_guard: CallGuard::from_duration(Duration::from_millis(100)),
            ..OrchestratorSettings::default()
        };
        let orchestrator = build_with(
            search.clone(),
            Arc::new(DownWeather),
            Arc::new(StallingBackend { stall_on: "Paris" }),
            settings,
        );

        let first = orchestrator.handle("Hotels in Berlin", "u1").await;
        assert_eq!(first.kind, ResponseKind::ToolResponse);
        let before = orchestrator.sessions().get_or_create("u1").await;

        let started = std::time::Instant::now();
        let response = orchestrator.handle("Hotels in Paris", "u1").await;

        assert_eq!(response.kind, ResponseKind::Error);
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(orchestrator.sessions().get_or_create("u1").await, before);
        assert_eq!(search.calls().len(), 1);
    }
}
