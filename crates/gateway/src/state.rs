use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use conductor_domain::config::Config;
use conductor_domain::error::Result;
use conductor_governance::{ExecutionGate, RiskPolicy};
use conductor_intent::{IntentClassifier, ToolRegistry};
use conductor_memory::{CloudSyncWorker, LlmEmbedder, MemoryManager, Summarizer};
use conductor_providers::{
    build_stt_client, build_tts_client, LlmRouter, ProviderSupervisor, ResilientSttProxy,
    ResilientTtsProxy, SmartLlm,
};
use conductor_sessions::ConversationSession;
use conductor_telemetry::{ChaosSwitchboard, Guardrails, MetricsCollector, Thresholds};
use conductor_tools::{default_catalog, default_tool_metadata, GovernedExecutor};

/// Everything one gateway process shares across every active conversation.
///
/// Constructed once in `main.rs` and handed to every connection handler
/// behind an `Arc`. Nothing in here is per-turn state — that lives on
/// `ConversationSession`, looked up by user id through `conversations`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub supervisor: Arc<ProviderSupervisor>,
    pub stt: Arc<ResilientSttProxy>,
    pub tts: Arc<ResilientTtsProxy>,
    pub smart_llm: Arc<SmartLlm>,
    pub memory: Arc<MemoryManager>,
    pub executor: Arc<GovernedExecutor>,
    pub tool_registry: Arc<ToolRegistry>,
    pub classifier: Arc<IntentClassifier>,
    pub chaos: Arc<ChaosSwitchboard>,
    pub metrics: Arc<MetricsCollector>,
    pub guardrails: Arc<Guardrails>,
    conversations: Arc<RwLock<HashMap<String, Arc<ConversationSession>>>>,
}

impl AppState {
    /// Wires every subsystem named in the config. Providers that fail to
    /// initialize are surfaced as warnings by `ProviderRegistry`/`LlmRouter`
    /// themselves; this constructor only fails on a hard STT/TTS backend
    /// misconfiguration, since those have no router-level fallback.
    pub async fn build(config: Arc<Config>) -> Result<Self> {
        let supervisor = ProviderSupervisor::new();

        let router = Arc::new(LlmRouter::from_config(&config.providers)?);
        let chaos = Arc::new(ChaosSwitchboard::new(config.chaos.clone()));
        let metrics = Arc::new(MetricsCollector::new(thresholds_from_config(&config)));

        let llm_for_role = router
            .registry()
            .for_role("executor")
            .or_else(|| router.registry().iter().next().map(|(_, p)| p.clone()));
        let Some(llm_provider) = llm_for_role else {
            return Err(conductor_domain::error::Error::Config(
                "no LLM provider available to back the conversation orchestrator".into(),
            ));
        };

        let smart_llm = Arc::new(
            SmartLlm::new(llm_provider.clone(), chaos.clone(), metrics.clone())
                .with_first_chunk_timeout(std::time::Duration::from_secs(
                    config.providers.first_chunk_timeout_secs,
                )),
        );

        let stt_client = build_stt_client(&config.providers.stt)?;
        let stt = ResilientSttProxy::new("stt", stt_client, supervisor.clone());
        supervisor.register("stt", stt.clone() as Arc<dyn conductor_providers::Reconnectable>);

        let tts_client = build_tts_client(&config.providers.tts)?;
        let tts = ResilientTtsProxy::new("tts", tts_client, supervisor.clone());
        supervisor.register("tts", tts.clone() as Arc<dyn conductor_providers::Reconnectable>);

        if config.memory.cloud_sync.enabled {
            match conductor_memory::create_provider(&config.memory.cloud_sync) {
                Ok(cloud_provider) => {
                    let worker = CloudSyncWorker::new(
                        cloud_provider,
                        std::time::Duration::from_secs(config.memory.cloud_sync.heartbeat_interval_secs),
                    );
                    tokio::spawn(worker.run());
                }
                Err(e) => {
                    tracing::warn!(error = %e, "cloud memory provider unavailable, continuing local-only");
                }
            }
        }

        let embedder = Arc::new(LlmEmbedder::new(llm_provider.clone(), None));
        let summarizer = router
            .registry()
            .for_role("summarizer")
            .map(Summarizer::new);
        let memory = Arc::new(MemoryManager::new(embedder, summarizer, chaos.clone()));

        let policy = RiskPolicy::default_policy().with_overrides(&config.governance.risk_overrides);
        let gate = ExecutionGate::new(policy);
        let tools = default_catalog();
        let executor = Arc::new(GovernedExecutor::new(tools, gate, chaos.clone()));

        let tool_registry = Arc::new(ToolRegistry::new());
        for meta in default_tool_metadata() {
            tool_registry.register(meta);
        }
        let classifier = Arc::new(IntentClassifier::new());

        let g = &config.telemetry.guardrails;
        let guardrails = Arc::new(Guardrails::new(conductor_telemetry::GuardrailLimits {
            max_tokens_per_session: g.max_tokens_per_session,
            max_retries_per_request: g.max_retries_per_request,
            max_session_duration_seconds: g.max_session_duration_seconds,
            max_consecutive_failures: g.max_consecutive_failures,
        }));

        Ok(Self {
            config,
            supervisor,
            stt,
            tts,
            smart_llm,
            memory,
            executor,
            tool_registry,
            classifier,
            chaos,
            metrics,
            guardrails,
            conversations: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    /// Look up the conversation session for `user_id`, building it (and
    /// registering it with the supervisor's health listeners) on first use.
    pub fn conversation_for(
        &self,
        user_id: &str,
        announcer: Arc<dyn conductor_sessions::Announcer>,
    ) -> Arc<ConversationSession> {
        if let Some(existing) = self.conversations.read().get(user_id) {
            return existing.clone();
        }
        let mut guard = self.conversations.write();
        guard
            .entry(user_id.to_string())
            .or_insert_with(|| ConversationSession::new(user_id.to_string(), self.supervisor.clone(), announcer))
            .clone()
    }

    pub fn drop_conversation(&self, user_id: &str) {
        self.conversations.write().remove(user_id);
    }

    pub fn active_conversation_count(&self) -> usize {
        self.conversations.read().len()
    }
}

/// Hand-built `AppState` for unit tests that need to drive the turn
/// orchestrator without a config file, network access, or real vendor
/// credentials. Every provider here is an in-memory stub; only the
/// governance/intent/memory/tool plumbing is the real thing.
#[cfg(test)]
pub mod test_support {
    use super::*;
    use conductor_domain::capability::LlmCapabilities;
    use conductor_domain::error::Result as DomainResult;
    use conductor_domain::stream::BoxStream;
    use conductor_domain::tool::MessageContent;
    use conductor_providers::{AudioFrame, SttClient, TtsClient, TranscriptChunk};
    use futures_util::stream;

    struct StubLlm(LlmCapabilities);

    #[async_trait::async_trait]
    impl conductor_providers::LlmProvider for StubLlm {
        async fn chat(&self, _req: conductor_providers::ChatRequest) -> DomainResult<conductor_providers::ChatResponse> {
            unimplemented!("not exercised by orchestrator tests")
        }

        async fn chat_stream(
            &self,
            _req: conductor_providers::ChatRequest,
        ) -> DomainResult<BoxStream<'static, DomainResult<conductor_domain::stream::StreamEvent>>> {
            Ok(Box::pin(stream::iter(vec![
                Ok(conductor_domain::stream::StreamEvent::Token { text: "ok".to_string() }),
                Ok(conductor_domain::stream::StreamEvent::Done { usage: None, finish_reason: Some("stop".to_string()) }),
            ])))
        }

        async fn embeddings(
            &self,
            req: conductor_providers::EmbeddingsRequest,
        ) -> DomainResult<conductor_providers::EmbeddingsResponse> {
            Ok(conductor_providers::EmbeddingsResponse {
                embeddings: req.input.iter().map(|_| vec![0.0f32; 4]).collect(),
            })
        }

        fn capabilities(&self) -> &LlmCapabilities {
            &self.0
        }

        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    struct StubStt;
    #[async_trait::async_trait]
    impl SttClient for StubStt {
        async fn stream(&self, _session_id: &str) -> DomainResult<BoxStream<'static, TranscriptChunk>> {
            Ok(Box::pin(stream::empty()))
        }
        fn provider_name(&self) -> &str {
            "stub-stt"
        }
    }

    struct StubTts;
    #[async_trait::async_trait]
    impl TtsClient for StubTts {
        async fn synthesize(&self, _text: &str) -> DomainResult<BoxStream<'static, AudioFrame>> {
            Ok(Box::pin(stream::once(async { AudioFrame { pcm: vec![0u8; 16] } })))
        }
        fn provider_name(&self) -> &str {
            "stub-tts"
        }
    }

    struct StubEmbedder;
    #[async_trait::async_trait]
    impl conductor_memory::Embedder for StubEmbedder {
        async fn embed(&self, text: &str) -> DomainResult<Vec<f32>> {
            let mut v = vec![0.0f32; 4];
            for (i, b) in text.bytes().enumerate() {
                v[(b as usize + i) % 4] += 1.0;
            }
            Ok(v)
        }
    }

    /// Silences the unused-import lint on `MessageContent` in builds where
    /// no test happens to construct one directly.
    #[allow(dead_code)]
    fn _touch(_: MessageContent) {}

    pub async fn build_test_state() -> AppState {
        let config = Arc::new(Config::default());
        let supervisor = ProviderSupervisor::new();
        let chaos = Arc::new(ChaosSwitchboard::default());
        let metrics = Arc::new(MetricsCollector::default());

        let llm_provider: Arc<dyn conductor_providers::LlmProvider> = Arc::new(StubLlm(LlmCapabilities {
            supports_tools: conductor_domain::capability::ToolSupport::Basic,
            supports_streaming: true,
            supports_json_mode: false,
            supports_vision: false,
            context_window_tokens: None,
            max_output_tokens: None,
        }));
        let smart_llm = Arc::new(SmartLlm::new(llm_provider.clone(), chaos.clone(), metrics.clone()));

        let stt = ResilientSttProxy::new("stt", Arc::new(StubStt), supervisor.clone());
        let tts = ResilientTtsProxy::new("tts", Arc::new(StubTts), supervisor.clone());

        let embedder = Arc::new(StubEmbedder);
        let memory = Arc::new(MemoryManager::new(embedder, None, chaos.clone()));

        let policy = RiskPolicy::default_policy();
        let gate = ExecutionGate::new(policy);
        let executor = Arc::new(GovernedExecutor::new(default_catalog(), gate, chaos.clone()));

        let tool_registry = Arc::new(ToolRegistry::new());
        for meta in default_tool_metadata() {
            tool_registry.register(meta);
        }
        let classifier = Arc::new(IntentClassifier::new());
        let guardrails = Arc::new(Guardrails::new(conductor_telemetry::GuardrailLimits::default()));

        AppState {
            config,
            supervisor,
            stt,
            tts,
            smart_llm,
            memory,
            executor,
            tool_registry,
            classifier,
            chaos,
            metrics,
            guardrails,
            conversations: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

fn thresholds_from_config(config: &Config) -> Thresholds {
    let t = &config.telemetry.thresholds;
    Thresholds {
        context_tokens: conductor_telemetry::metrics::Threshold {
            warning: t.context_tokens.warning,
            critical: t.context_tokens.critical,
        },
        llm_latency: conductor_telemetry::metrics::Threshold {
            warning: t.llm_latency.warning,
            critical: t.llm_latency.critical,
        },
        first_chunk_latency: conductor_telemetry::metrics::Threshold {
            warning: t.first_chunk_latency.warning,
            critical: t.first_chunk_latency.critical,
        },
        retries_per_request: conductor_telemetry::metrics::Threshold {
            warning: t.retries_per_request.warning,
            critical: t.retries_per_request.critical,
        },
        memory_retrieval_count: conductor_telemetry::metrics::Threshold {
            warning: t.memory_retrieval_count.warning,
            critical: t.memory_retrieval_count.critical,
        },
    }
}
