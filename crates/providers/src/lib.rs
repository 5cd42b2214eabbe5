pub mod anthropic;
pub mod auth;
pub mod google;
pub mod openai_compat;
pub mod proxy;
pub mod registry;
pub mod router;
pub mod smart_llm;
pub mod stream_probe;
pub mod supervisor;
pub mod traits;
pub mod voice;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use proxy::{AudioFrame, ResilientSttProxy, ResilientTtsProxy, SttClient, TranscriptChunk, TtsClient};
pub use registry::ProviderRegistry;
pub use router::LlmRouter;
pub use smart_llm::{fix_tool_schema, validate_tool_schema, ContextBuilder, SmartLlm};
pub use stream_probe::{context_probe_warnings, probe_stream, validate_message_role};
pub use supervisor::{
    backoff_for_attempt, HealthListener, ProviderHealth, ProviderState, ProviderSupervisor,
    Reconnectable, RECONNECT_BACKOFF,
};
pub use traits::{ChatRequest, ChatResponse, EmbeddingsRequest, EmbeddingsResponse, LlmProvider};
pub use voice::{build_stt_client, build_tts_client, DeepgramSttClient, ElevenLabsTtsClient};
