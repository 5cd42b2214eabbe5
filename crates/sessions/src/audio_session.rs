//! Audio Session Manager: keeps *some* media-plane session
//! running and wired to a `ConversationSession`, restarting it with
//! exponential backoff when it ends abnormally.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::conversation::{AudioSessionRef, ConversationSession};

const INITIAL_RESTART_DELAY: Duration = Duration::from_secs(2);
const MAX_RESTART_DELAY: Duration = Duration::from_secs(30);
const ON_CONNECT_DELAY: Duration = Duration::from_secs(1);

/// A started media-plane session. `start` blocks until the session ends,
/// returning `Ok(())` on a graceful end or `Err` on an abnormal one.
#[async_trait::async_trait]
pub trait AudioSession: AudioSessionRef {
    async fn start(self: Arc<Self>) -> Result<(), String>;
}

/// Forwards to the wrapped session's id. Lets the manager attach an
/// `Arc<dyn AudioSession>` to the conversation's `Arc<dyn AudioSessionRef>`
/// slot without a trait-object-to-trait-object cast.
struct AttachedSession(Arc<dyn AudioSession>);

impl AudioSessionRef for AttachedSession {
    fn session_id(&self) -> &str {
        self.0.session_id()
    }
}

/// Builds a fresh `AudioSession` each time the manager needs to (re)start
/// one. Boxed to keep the manager independent of any concrete transport.
pub type SessionFactory = Arc<dyn Fn() -> Pin<Box<dyn Future<Output = Arc<dyn AudioSession>> + Send>> + Send + Sync>;

/// Invoked ~1s after a session starts; used to send the greeting. Errors
/// are caught and logged, never propagated.
pub type OnConnect = Arc<dyn Fn(Arc<dyn AudioSession>) -> Pin<Box<dyn Future<Output = Result<(), String>> + Send>> + Send + Sync>;

pub struct AudioSessionManager {
    conversation: Arc<ConversationSession>,
    factory: SessionFactory,
    on_connect: OnConnect,
    cancel: CancellationToken,
}

impl AudioSessionManager {
    pub fn new(conversation: Arc<ConversationSession>, factory: SessionFactory, on_connect: OnConnect) -> Self {
        Self { conversation, factory, on_connect, cancel: CancellationToken::new() }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Runs the build/attach/start/restart loop until the session ends
    /// gracefully or the manager is cancelled.
    pub async fn run(&self) {
        let mut delay = INITIAL_RESTART_DELAY;

        loop {
            if self.cancel.is_cancelled() {
                info!("audio session manager cancelled before start");
                return;
            }

            let session = (self.factory)().await;
            self.conversation.attach_audio_session(Arc::new(AttachedSession(session.clone())));

            let on_connect = self.on_connect.clone();
            let connect_session = session.clone();
            let connect_cancel = self.cancel.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(ON_CONNECT_DELAY) => {
                        if let Err(err) = (on_connect)(connect_session).await {
                            warn!(error = %err, "on_connect callback failed");
                        }
                    }
                    _ = connect_cancel.cancelled() => {}
                }
            });

            let outcome = tokio::select! {
                result = session.clone().start() => Some(result),
                _ = self.cancel.cancelled() => None,
            };

            self.conversation.detach_audio_session();

            match outcome {
                None => {
                    info!("audio session manager cancelled, exiting cleanly");
                    return;
                }
                Some(Ok(())) => {
                    info!("audio session ended gracefully");
                    return;
                }
                Some(Err(err)) => {
                    warn!(error = %err, delay_secs = delay.as_secs_f64(), "audio session ended abnormally, restarting");
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => {
                            info!("audio session manager cancelled during backoff");
                            return;
                        }
                    }
                    delay = std::cmp::min(delay.mul_f64(1.5), MAX_RESTART_DELAY);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::Announcer;
    use conductor_providers::ProviderSupervisor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex as AsyncMutex;

    struct SilentAnnouncer;
    #[async_trait::async_trait]
    impl Announcer for SilentAnnouncer {
        async fn speak(&self, _text: &str) {}
    }

    struct ScriptedSession {
        id: String,
        outcomes: Arc<AsyncMutex<Vec<Result<(), String>>>>,
    }

    impl AudioSessionRef for ScriptedSession {
        fn session_id(&self) -> &str {
            &self.id
        }
    }

    #[async_trait::async_trait]
    impl AudioSession for ScriptedSession {
        async fn start(self: Arc<Self>) -> Result<(), String> {
            let mut outcomes = self.outcomes.lock().await;
            if outcomes.is_empty() {
                Ok(())
            } else {
                outcomes.remove(0)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn s6_session_crash_restarts_with_backoff_then_ends_gracefully() {
        let supervisor = ProviderSupervisor::new();
        let conversation = ConversationSession::new("u1", supervisor, Arc::new(SilentAnnouncer));

        let build_count = Arc::new(AtomicUsize::new(0));
        let outcomes = Arc::new(AsyncMutex::new(vec![Err("boom".to_string())]));

        let build_count_cloned = build_count.clone();
        let outcomes_cloned = outcomes.clone();
        let factory: SessionFactory = Arc::new(move || {
            let build_count = build_count_cloned.clone();
            let outcomes = outcomes_cloned.clone();
            Box::pin(async move {
                let n = build_count.fetch_add(1, Ordering::SeqCst);
                Arc::new(ScriptedSession { id: format!("sess-{n}"), outcomes }) as Arc<dyn AudioSession>
            })
        });

        let connect_count = Arc::new(AtomicUsize::new(0));
        let connect_count_cloned = connect_count.clone();
        let on_connect: OnConnect = Arc::new(move |_session| {
            let connect_count = connect_count_cloned.clone();
            Box::pin(async move {
                connect_count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        });

        let manager = AudioSessionManager::new(conversation, factory, on_connect);
        tokio::time::timeout(Duration::from_secs(60), manager.run()).await.expect("manager should finish");

        assert_eq!(build_count.load(Ordering::SeqCst), 2);
        assert!(connect_count.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn external_cancellation_exits_without_restart() {
        let supervisor = ProviderSupervisor::new();
        let conversation = ConversationSession::new("u1", supervisor, Arc::new(SilentAnnouncer));

        let factory: SessionFactory = Arc::new(move || {
            Box::pin(async move {
                Arc::new(ScriptedSession { id: "sess-hang".into(), outcomes: Arc::new(AsyncMutex::new(vec![])) }) as Arc<dyn AudioSession>
            })
        });
        let on_connect: OnConnect = Arc::new(move |_session| Box::pin(async move { Ok(()) }));

        let manager = AudioSessionManager::new(conversation, factory, on_connect);
        let cancel = manager.cancellation_token();
        cancel.cancel();

        tokio::time::timeout(Duration::from_secs(5), manager.run()).await.expect("cancelled manager should exit promptly");
    }
}
