//! Conversation Session: the long-lived per-user session that
//! tracks voice-path health and owns the current audio session reference.

use std::sync::Arc;

use conductor_providers::{ProviderHealth, ProviderState, ProviderSupervisor};
use parking_lot::RwLock;

/// Coarse voice-path health as observed by the conversation, distinct from
/// the per-provider `ProviderState` the supervisor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioState {
    Healthy,
    Reconnecting,
    Offline,
}

/// Speaks a message through whatever audio session is currently attached.
/// Implemented by the turn orchestrator; kept as a trait here so
/// `conductor-sessions` never depends on `conductor-gateway`.
#[async_trait::async_trait]
pub trait Announcer: Send + Sync {
    async fn speak(&self, text: &str);
}

/// A reference to the currently attached media-plane session. Opaque to
/// this crate beyond its id — the audio session manager owns the concrete
/// type.
pub trait AudioSessionRef: Send + Sync {
    fn session_id(&self) -> &str;
}

struct Inner {
    audio_state: AudioState,
    current_audio_session: Option<Arc<dyn AudioSessionRef>>,
}

/// Holds `{user_id, supervisor, current_audio_session, audio_state}` (spec
/// §4.4). Registers itself as a `ProviderSupervisor` health listener so
/// voice-path transitions drive `audio_state` and trigger spoken
/// announcements.
pub struct ConversationSession {
    pub user_id: String,
    supervisor: Arc<ProviderSupervisor>,
    announcer: Arc<dyn Announcer>,
    inner: RwLock<Inner>,
}

const RECONNECTING_MESSAGE: &str = "I am having trouble hearing you. Reconnecting voice services...";
const RESTORED_MESSAGE: &str = "Voice connection restored.";

/// Both `stt` and `tts` (the two proxy names §4.2 registers) drive this
/// transition — the originating listener only matched STT-family names,
/// which this expansion fixes (see DESIGN.md).
fn is_voice_path_provider(name: &str) -> bool {
    name == "stt" || name == "tts"
}

impl ConversationSession {
    pub fn new(user_id: impl Into<String>, supervisor: Arc<ProviderSupervisor>, announcer: Arc<dyn Announcer>) -> Arc<Self> {
        let session = Arc::new(Self {
            user_id: user_id.into(),
            supervisor: supervisor.clone(),
            announcer,
            inner: RwLock::new(Inner { audio_state: AudioState::Healthy, current_audio_session: None }),
        });
        session.register_listener();
        session
    }

    fn register_listener(self: &Arc<Self>) {
        let weak = Arc::downgrade(self);
        self.supervisor.add_listener(Arc::new(move |name: &str, health: &ProviderHealth| {
            if !is_voice_path_provider(name) {
                return;
            }
            let Some(session) = weak.upgrade() else { return };
            session.on_provider_health(health.state);
        }));
    }

    fn on_provider_health(self: &Arc<Self>, state: ProviderState) {
        let transition = {
            let mut inner = self.inner.write();
            let previous = inner.audio_state;
            let next = match state {
                ProviderState::Healthy => AudioState::Healthy,
                ProviderState::Degraded | ProviderState::Reconnecting => AudioState::Reconnecting,
                ProviderState::Offline => AudioState::Offline,
            };
            inner.audio_state = next;
            if previous == next {
                None
            } else {
                Some((previous, next))
            }
        };

        let Some((previous, next)) = transition else { return };
        if previous == AudioState::Healthy && next != AudioState::Healthy {
            self.announce_detached(RECONNECTING_MESSAGE);
        } else if previous != AudioState::Healthy && next == AudioState::Healthy {
            self.announce_detached(RESTORED_MESSAGE);
        }
    }

    /// Fire-and-forget: spawns a detached task to speak the message via
    /// the orchestrator's current session. Never awaited or retried by the
    /// caller.
    fn announce_detached(self: &Arc<Self>, text: &'static str) {
        let announcer = self.announcer.clone();
        tokio::spawn(async move {
            announcer.speak(text).await;
        });
    }

    pub fn audio_state(&self) -> AudioState {
        self.inner.read().audio_state
    }

    pub fn attach_audio_session(&self, session: Arc<dyn AudioSessionRef>) {
        self.inner.write().current_audio_session = Some(session);
    }

    pub fn detach_audio_session(&self) {
        self.inner.write().current_audio_session = None;
    }

    pub fn current_audio_session(&self) -> Option<Arc<dyn AudioSessionRef>> {
        self.inner.read().current_audio_session.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct RecordingAnnouncer {
        count: Arc<AtomicUsize>,
        last: Arc<RwLock<Option<String>>>,
    }

    #[async_trait::async_trait]
    impl Announcer for RecordingAnnouncer {
        async fn speak(&self, text: &str) {
            self.count.fetch_add(1, Ordering::SeqCst);
            *self.last.write() = Some(text.to_string());
        }
    }

    struct FakeAudioSession(String);
    impl AudioSessionRef for FakeAudioSession {
        fn session_id(&self) -> &str {
            &self.0
        }
    }

    struct NoopReconnectable;
    #[async_trait::async_trait]
    impl conductor_providers::Reconnectable for NoopReconnectable {
        async fn attempt_reconnect(&self) -> Result<(), String> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn s5_stt_failure_moves_audio_state_to_reconnecting_and_announces() {
        let supervisor = ProviderSupervisor::new();
        supervisor.register("stt", Arc::new(NoopReconnectable));
        let count = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(RwLock::new(None));
        let announcer = Arc::new(RecordingAnnouncer { count: count.clone(), last: last.clone() });
        let session = ConversationSession::new("u1", supervisor.clone(), announcer);

        supervisor.mark_failed("stt", "boom");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.audio_state(), AudioState::Reconnecting);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(last.read().as_deref(), Some(RECONNECTING_MESSAGE));
    }

    #[tokio::test]
    async fn recovery_announces_restored_message() {
        let supervisor = ProviderSupervisor::new();
        supervisor.register("tts", Arc::new(NoopReconnectable));
        let count = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(RwLock::new(None));
        let announcer = Arc::new(RecordingAnnouncer { count: count.clone(), last: last.clone() });
        let session = ConversationSession::new("u1", supervisor.clone(), announcer);

        supervisor.mark_failed("tts", "boom");
        tokio::time::sleep(Duration::from_millis(20)).await;
        supervisor.mark_healthy("tts");
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(session.audio_state(), AudioState::Healthy);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        assert_eq!(last.read().as_deref(), Some(RESTORED_MESSAGE));
    }

    #[test]
    fn attach_then_detach_clears_reference() {
        let supervisor = ProviderSupervisor::new();
        let announcer = Arc::new(RecordingAnnouncer { count: Arc::new(AtomicUsize::new(0)), last: Arc::new(RwLock::new(None)) });
        let session = ConversationSession::new("u1", supervisor, announcer);
        session.attach_audio_session(Arc::new(FakeAudioSession("sess-1".into())));
        assert_eq!(session.current_audio_session().unwrap().session_id(), "sess-1");
        session.detach_audio_session();
        assert!(session.current_audio_session().is_none());
    }
}
