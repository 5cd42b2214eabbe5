use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Provider credentials & reconnect policy (LLM, STT, TTS)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub llm: Vec<ProviderConfig>,
    pub stt: ProviderConfig,
    pub tts: ProviderConfig,
    /// Per-turn timeout waiting for the first LLM stream chunk.
    #[serde(default = "d_first_chunk_timeout")]
    pub first_chunk_timeout_secs: u64,
    #[serde(default = "d_20000u")]
    pub default_timeout_ms: u64,
    #[serde(default = "d_2")]
    pub max_retries: u32,
    /// Exponential backoff schedule for provider reconnect attempts.
    #[serde(default = "d_backoff")]
    pub reconnect_backoff_secs: Vec<u64>,
    /// Role -> model assignment (e.g. `"summarizer" -> "anthropic/claude-haiku"`).
    /// The conversational role is always `"main"`; `"summarizer"` is used by
    /// the memory manager's session summariser.
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    /// Whether the gateway may boot with zero working LLM providers.
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    #[serde(default)]
    pub require_provider: bool,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            llm: Vec::new(),
            stt: ProviderConfig::default_stt(),
            tts: ProviderConfig::default_tts(),
            first_chunk_timeout_secs: d_first_chunk_timeout(),
            default_timeout_ms: d_20000u(),
            max_retries: d_2(),
            reconnect_backoff_secs: d_backoff(),
            roles: HashMap::new(),
            startup_policy: LlmStartupPolicy::default(),
            require_provider: false,
        }
    }
}

/// A role's primary model plus ordered fallbacks, and the capabilities the
/// router must validate before routing a request to any candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// `"provider_id/model_name"`.
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
    #[serde(default)]
    pub require_json: bool,
    #[serde(default)]
    pub require_streaming: bool,
    #[serde(default)]
    pub fallbacks: Vec<FallbackConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    pub model: String,
    #[serde(default)]
    pub require_tools: bool,
    #[serde(default)]
    pub require_json: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Boot even if every configured provider failed to initialize; LLM
    /// endpoints error until credentials are fixed.
    #[default]
    AllowNone,
    /// Abort startup unless at least one provider initialized.
    RequireOne,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    pub base_url: String,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub default_model: Option<String>,
}

impl ProviderConfig {
    fn default_stt() -> Self {
        Self {
            id: "deepgram".into(),
            kind: ProviderKind::Deepgram,
            base_url: "https://api.deepgram.com".into(),
            auth: AuthConfig {
                mode: AuthMode::ApiKey,
                env: Some("DEEPGRAM_API_KEY".into()),
                ..AuthConfig::default()
            },
            default_model: Some("nova-2".into()),
        }
    }

    fn default_tts() -> Self {
        Self {
            id: "elevenlabs".into(),
            kind: ProviderKind::ElevenLabs,
            base_url: "https://api.elevenlabs.io".into(),
            auth: AuthConfig {
                mode: AuthMode::ApiKey,
                env: Some("ELEVENLABS_API_KEY".into()),
                ..AuthConfig::default()
            },
            default_model: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    OpenaiCompat,
    Anthropic,
    Google,
    AzureOpenai,
    Deepgram,
    ElevenLabs,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub mode: AuthMode,
    /// Env var containing the key.
    #[serde(default)]
    pub env: Option<String>,
    /// Direct key (config-only setups; prefer env).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service/account names, when `mode == Keychain`.
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub account: Option<String>,
    /// Multiple env var names, each resolved and rotated round-robin by
    /// `AuthRotator`. When non-empty, takes precedence over `env`/`key`.
    #[serde(default)]
    pub keys: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    #[default]
    ApiKey,
    QueryParam,
    Keychain,
    None,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_20000u() -> u64 {
    20_000
}
fn d_2() -> u32 {
    2
}
fn d_first_chunk_timeout() -> u64 {
    10
}
fn d_backoff() -> Vec<u64> {
    vec![2, 5, 10, 30]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_schedule() {
        assert_eq!(ProvidersConfig::default().reconnect_backoff_secs, vec![2, 5, 10, 30]);
    }

    #[test]
    fn default_stt_provider_is_deepgram() {
        let cfg = ProvidersConfig::default();
        assert_eq!(cfg.stt.kind, ProviderKind::Deepgram);
    }

    #[test]
    fn default_tts_provider_is_elevenlabs() {
        let cfg = ProvidersConfig::default();
        assert_eq!(cfg.tts.kind, ProviderKind::ElevenLabs);
    }

    #[test]
    fn llm_providers_default_empty() {
        assert!(ProvidersConfig::default().llm.is_empty());
    }
}
