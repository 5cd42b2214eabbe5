//! Resilient provider proxies: STT and TTS adapters that
//! degrade gracefully instead of propagating transport failures into the
//! turn orchestrator. Each proxy reports into a shared `ProviderSupervisor`
//! so health state and reconnection are centralized.

use std::sync::Arc;

use conductor_domain::error::Result;
use conductor_domain::stream::BoxStream;
use futures_util::stream;
use futures_util::StreamExt;

use crate::supervisor::{ProviderSupervisor, Reconnectable};

/// A transcript fragment produced by a speech-to-text backend.
#[derive(Debug, Clone)]
pub struct TranscriptChunk {
    pub text: String,
    pub is_final: bool,
}

/// Raw PCM audio frames produced by a text-to-speech backend.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub pcm: Vec<u8>,
}

/// What a concrete STT backend must provide. `stream` opens (or resumes) a
/// transcription stream for one audio session.
#[async_trait::async_trait]
pub trait SttClient: Send + Sync {
    async fn stream(&self, session_id: &str) -> Result<BoxStream<'static, Result<TranscriptChunk>>>;
    fn provider_name(&self) -> &str;
}

/// What a concrete TTS backend must provide. `synthesize` returns a stream
/// of PCM frames for the given text.
#[async_trait::async_trait]
pub trait TtsClient: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<BoxStream<'static, Result<AudioFrame>>>;
    fn provider_name(&self) -> &str;
}

/// Wraps an `SttClient`, falling back to a transcript stream that never
/// emits (rather than erroring or panicking the turn loop) whenever the
/// underlying backend fails to open a stream. Every fallback and every
/// successful open report into the shared supervisor.
pub struct ResilientSttProxy {
    inner: parking_lot::RwLock<Arc<dyn SttClient>>,
    name: String,
    supervisor: Arc<ProviderSupervisor>,
}

impl ResilientSttProxy {
    pub fn new(name: impl Into<String>, client: Arc<dyn SttClient>, supervisor: Arc<ProviderSupervisor>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            inner: parking_lot::RwLock::new(client),
            name,
            supervisor,
        })
    }

    /// Hot-swap the underlying client, e.g. after a manual provider
    /// failover decision. Does not touch health state on its own.
    pub fn replace_client(&self, client: Arc<dyn SttClient>) {
        *self.inner.write() = client;
    }

    /// Open a transcript stream for `session_id`. On failure, records the
    /// failure with the supervisor and returns a stream that stays open
    /// but never yields anything — silence rather than a crash.
    pub async fn stream(&self, session_id: &str) -> BoxStream<'static, Result<TranscriptChunk>> {
        let client = self.inner.read().clone();
        match client.stream(session_id).await {
            Ok(s) => {
                self.supervisor.mark_healthy(&self.name);
                s
            }
            Err(e) => {
                self.supervisor.mark_failed(&self.name, e.to_string());
                tracing::warn!(provider = %self.name, error = %e, "stt stream open failed, falling back to silent transcript");
                Box::pin(stream::empty())
            }
        }
    }
}

#[async_trait::async_trait]
impl Reconnectable for ResilientSttProxy {
    async fn attempt_reconnect(&self) -> std::result::Result<(), String> {
        let client = self.inner.read().clone();
        // A bounded probe session id; a real stream open is enough to
        // prove the backend is reachable again.
        client
            .stream("__reconnect_probe__")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

/// Wraps a `TtsClient`, falling back to a silent PCM stream (a single
/// zeroed frame then end-of-stream) whenever synthesis fails to start.
pub struct ResilientTtsProxy {
    inner: parking_lot::RwLock<Arc<dyn TtsClient>>,
    name: String,
    supervisor: Arc<ProviderSupervisor>,
}

const SILENT_FRAME_BYTES: usize = 3200; // 100ms of 16kHz/16-bit mono silence

impl ResilientTtsProxy {
    pub fn new(name: impl Into<String>, client: Arc<dyn TtsClient>, supervisor: Arc<ProviderSupervisor>) -> Arc<Self> {
        let name = name.into();
        Arc::new(Self {
            inner: parking_lot::RwLock::new(client),
            name,
            supervisor,
        })
    }

    pub fn replace_client(&self, client: Arc<dyn TtsClient>) {
        *self.inner.write() = client;
    }

    pub async fn synthesize(&self, text: &str) -> BoxStream<'static, Result<AudioFrame>> {
        let client = self.inner.read().clone();
        match client.synthesize(text).await {
            Ok(s) => {
                self.supervisor.mark_healthy(&self.name);
                s
            }
            Err(e) => {
                self.supervisor.mark_failed(&self.name, e.to_string());
                tracing::warn!(provider = %self.name, error = %e, "tts synthesis failed, falling back to silence");
                Box::pin(stream::once(async {
                    Ok(AudioFrame { pcm: vec![0u8; SILENT_FRAME_BYTES] })
                }))
            }
        }
    }
}

#[async_trait::async_trait]
impl Reconnectable for ResilientTtsProxy {
    async fn attempt_reconnect(&self) -> std::result::Result<(), String> {
        let client = self.inner.read().clone();
        client
            .synthesize("")
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::error::Error;

    struct AlwaysFailsStt;
    #[async_trait::async_trait]
    impl SttClient for AlwaysFailsStt {
        async fn stream(&self, _session_id: &str) -> Result<BoxStream<'static, Result<TranscriptChunk>>> {
            Err(Error::Provider { provider: "stt".into(), message: "connection refused".into() })
        }
        fn provider_name(&self) -> &str {
            "stt"
        }
    }

    struct AlwaysFailsTts;
    #[async_trait::async_trait]
    impl TtsClient for AlwaysFailsTts {
        async fn synthesize(&self, _text: &str) -> Result<BoxStream<'static, Result<AudioFrame>>> {
            Err(Error::Provider { provider: "tts".into(), message: "connection refused".into() })
        }
        fn provider_name(&self) -> &str {
            "tts"
        }
    }

    #[tokio::test]
    async fn s4_stt_outage_falls_back_to_empty_stream_not_panic() {
        let supervisor = ProviderSupervisor::new();
        let proxy = ResilientSttProxy::new("stt", Arc::new(AlwaysFailsStt), supervisor.clone());
        supervisor.register("stt", proxy.clone());
        let mut stream = proxy.stream("session-1").await;
        assert!(stream.next().await.is_none());
        assert_eq!(supervisor.health("stt").unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn tts_outage_falls_back_to_silent_frame() {
        let supervisor = ProviderSupervisor::new();
        let proxy = ResilientTtsProxy::new("tts", Arc::new(AlwaysFailsTts), supervisor.clone());
        let mut stream = proxy.synthesize("hello").await;
        let frame = stream.next().await.unwrap().unwrap();
        assert_eq!(frame.pcm.len(), SILENT_FRAME_BYTES);
        assert!(frame.pcm.iter().all(|b| *b == 0));
        assert!(stream.next().await.is_none());
    }
}
