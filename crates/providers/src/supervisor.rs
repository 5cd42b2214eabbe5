//! Provider Supervisor: tracks per-provider health and
//! schedules hot-swap reconnection without blocking callers.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// The per-provider backoff schedule: `[2s, 5s, 10s, 30s]`,
/// clamped at the last value for any attempt index beyond it.
pub const RECONNECT_BACKOFF: &[Duration] = &[
    Duration::from_secs(2),
    Duration::from_secs(5),
    Duration::from_secs(10),
    Duration::from_secs(30),
];

pub fn backoff_for_attempt(attempt: usize) -> Duration {
    RECONNECT_BACKOFF[attempt.min(RECONNECT_BACKOFF.len() - 1)]
}

const MONITOR_TICK: Duration = Duration::from_secs(5);

/// Anything a proxy must implement so the supervisor can hot-swap it on
/// reconnect. `attempt_reconnect` must be idempotent.
#[async_trait::async_trait]
pub trait Reconnectable: Send + Sync {
    async fn attempt_reconnect(&self) -> Result<(), String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderState {
    Healthy,
    Degraded,
    Reconnecting,
    Offline,
}

/// Per-provider health record.
#[derive(Debug, Clone, Serialize)]
pub struct ProviderHealth {
    pub name: String,
    pub state: ProviderState,
    pub last_success_ts: Option<DateTime<Utc>>,
    pub failure_count: u32,
    pub last_error: Option<String>,
}

impl ProviderHealth {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: ProviderState::Healthy,
            last_success_ts: None,
            failure_count: 0,
            last_error: None,
        }
    }
}

/// A health-change callback. Invoked synchronously, in registration order,
/// within a single scheduling slice — a listener that needs to do async
/// work is responsible for spawning its own task (as `ConversationSession`'s
/// announcement does). A panicking listener is caught and logged, never
/// allowed to take down the supervisor.
pub type HealthListener = Arc<dyn Fn(&str, &ProviderHealth) + Send + Sync>;

struct ProviderEntry {
    proxy: Arc<dyn Reconnectable>,
    health: ProviderHealth,
    reconnect_attempt: usize,
    reconnect_handle: Option<JoinHandle<()>>,
}

pub struct ProviderSupervisor {
    entries: RwLock<HashMap<String, ProviderEntry>>,
    listeners: RwLock<Vec<HealthListener>>,
    monitor_cancel: CancellationToken,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl ProviderSupervisor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(HashMap::new()),
            listeners: RwLock::new(Vec::new()),
            monitor_cancel: CancellationToken::new(),
            monitor_handle: Mutex::new(None),
        })
    }

    /// Associate a proxy with a name. Idempotent by name — re-registering
    /// replaces the proxy but preserves the existing health record.
    pub fn register(&self, name: &str, proxy: Arc<dyn Reconnectable>) {
        let mut entries = self.entries.write();
        entries
            .entry(name.to_string())
            .and_modify(|e| e.proxy = proxy.clone())
            .or_insert_with(|| ProviderEntry {
                proxy,
                health: ProviderHealth::new(name),
                reconnect_attempt: 0,
                reconnect_handle: None,
            });
    }

    pub fn add_listener(&self, listener: HealthListener) {
        self.listeners.write().push(listener);
    }

    pub fn health(&self, name: &str) -> Option<ProviderHealth> {
        self.entries.read().get(name).map(|e| e.health.clone())
    }

    pub fn all_health(&self) -> Vec<ProviderHealth> {
        self.entries.read().values().map(|e| e.health.clone()).collect()
    }

    fn notify(&self, name: &str, health: &ProviderHealth) {
        for listener in self.listeners.read().iter() {
            let listener = listener.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                listener(name, health);
            }));
            if let Err(e) = result {
                tracing::error!(provider = name, panic = ?e, "provider health listener panicked");
            }
        }
    }

    /// Transition on failure: `HEALTHY -> DEGRADED` on any failure,
    /// `DEGRADED -> OFFLINE` once `failure_count > 3`. Spawns a reconnect
    /// task if the new state is `OFFLINE` and none is active.
    pub fn mark_failed(self: &Arc<Self>, name: &str, err: impl Into<String>) {
        let err = err.into();
        let (health, should_reconnect) = {
            let mut entries = self.entries.write();
            let entry = entries
                .entry(name.to_string())
                .or_insert_with(|| ProviderEntry {
                    proxy: Arc::new(NullReconnectable),
                    health: ProviderHealth::new(name),
                    reconnect_attempt: 0,
                    reconnect_handle: None,
                });
            entry.health.failure_count += 1;
            entry.health.last_error = Some(err.clone());
            entry.health.state = if entry.health.failure_count > 3 {
                ProviderState::Offline
            } else {
                ProviderState::Degraded
            };
            let should_reconnect =
                entry.health.state == ProviderState::Offline && entry.reconnect_handle.is_none();
            (entry.health.clone(), should_reconnect)
        };
        tracing::warn!(provider = name, error = %err, state = ?health.state, "provider failure recorded");
        self.notify(name, &health);
        if should_reconnect {
            self.spawn_reconnect(name.to_string());
        }
    }

    /// Resets the failure counter, cancels any active reconnect task, and
    /// transitions to `HEALTHY`. A no-op on state for an already-healthy
    /// provider, but counters are still zeroed.
    pub fn mark_healthy(self: &Arc<Self>, name: &str) {
        let health = {
            let mut entries = self.entries.write();
            let entry = entries
                .entry(name.to_string())
                .or_insert_with(|| ProviderEntry {
                    proxy: Arc::new(NullReconnectable),
                    health: ProviderHealth::new(name),
                    reconnect_attempt: 0,
                    reconnect_handle: None,
                });
            if let Some(handle) = entry.reconnect_handle.take() {
                handle.abort();
            }
            entry.reconnect_attempt = 0;
            entry.health.failure_count = 0;
            entry.health.last_error = None;
            entry.health.state = ProviderState::Healthy;
            entry.health.last_success_ts = Some(Utc::now());
            entry.health.clone()
        };
        self.notify(name, &health);
    }

    fn spawn_reconnect(self: &Arc<Self>, name: String) {
        let supervisor = self.clone();
        let handle = tokio::spawn(async move {
            loop {
                let attempt = {
                    let entries = supervisor.entries.read();
                    entries.get(&name).map(|e| e.reconnect_attempt).unwrap_or(0)
                };
                tokio::time::sleep(backoff_for_attempt(attempt)).await;

                let proxy = {
                    let mut entries = supervisor.entries.write();
                    let Some(entry) = entries.get_mut(&name) else { return };
                    entry.health.state = ProviderState::Reconnecting;
                    let health = entry.health.clone();
                    let proxy = entry.proxy.clone();
                    drop(entries);
                    supervisor.notify(&name, &health);
                    proxy
                };

                match proxy.attempt_reconnect().await {
                    Ok(()) => {
                        supervisor.mark_healthy(&name);
                        return;
                    }
                    Err(e) => {
                        let mut entries = supervisor.entries.write();
                        if let Some(entry) = entries.get_mut(&name) {
                            entry.reconnect_attempt += 1;
                            entry.health.last_error = Some(e.clone());
                            entry.health.state = ProviderState::Offline;
                        }
                        tracing::warn!(provider = %name, error = %e, attempt, "reconnect attempt failed");
                    }
                }
            }
        });
        let mut entries = self.entries.write();
        if let Some(entry) = entries.get_mut(&name) {
            entry.reconnect_handle = Some(handle);
        }
    }

    /// Start the 5s-tick monitor loop: records downtime for any
    /// non-healthy provider and re-arms a reconnect task if none is
    /// active.
    pub fn start_monitor(self: &Arc<Self>) {
        let supervisor = self.clone();
        let cancel = self.monitor_cancel.clone();
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    _ = tokio::time::sleep(MONITOR_TICK) => {}
                }
                let stale: Vec<String> = {
                    let entries = supervisor.entries.read();
                    entries
                        .values()
                        .filter(|e| e.health.state != ProviderState::Healthy && e.reconnect_handle.is_none())
                        .map(|e| e.health.name.clone())
                        .collect()
                };
                for name in stale {
                    tracing::debug!(provider = %name, "monitor tick: re-arming reconnect task");
                    supervisor.spawn_reconnect(name);
                }
            }
        });
        *self.monitor_handle.lock() = Some(handle);
    }

    /// Cancel the monitor loop and every outstanding reconnect task.
    pub fn stop(&self) {
        self.monitor_cancel.cancel();
        if let Some(handle) = self.monitor_handle.lock().take() {
            handle.abort();
        }
        let mut entries = self.entries.write();
        for entry in entries.values_mut() {
            if let Some(handle) = entry.reconnect_handle.take() {
                handle.abort();
            }
        }
    }
}

struct NullReconnectable;

#[async_trait::async_trait]
impl Reconnectable for NullReconnectable {
    async fn attempt_reconnect(&self) -> Result<(), String> {
        Err("no proxy registered".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FlakyThenHealthy {
        fail_for: u32,
        calls: AtomicU32,
    }

    #[async_trait::async_trait]
    impl Reconnectable for FlakyThenHealthy {
        async fn attempt_reconnect(&self) -> Result<(), String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.fail_for {
                Err("still down".into())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn backoff_clamps_at_last_value() {
        assert_eq!(backoff_for_attempt(0), Duration::from_secs(2));
        assert_eq!(backoff_for_attempt(3), Duration::from_secs(30));
        assert_eq!(backoff_for_attempt(99), Duration::from_secs(30));
    }

    #[test]
    fn register_is_idempotent_by_name() {
        let sup = ProviderSupervisor::new();
        sup.register("stt", Arc::new(NullReconnectable));
        sup.register("stt", Arc::new(NullReconnectable));
        assert_eq!(sup.entries.read().len(), 1);
    }

    #[tokio::test]
    async fn mark_failed_four_times_transitions_to_offline() {
        let sup = ProviderSupervisor::new();
        sup.register("stt", Arc::new(FlakyThenHealthy { fail_for: 0, calls: AtomicU32::new(0) }));
        for _ in 0..3 {
            sup.mark_failed("stt", "boom");
            assert_eq!(sup.health("stt").unwrap().state, ProviderState::Degraded);
        }
        sup.mark_failed("stt", "boom");
        assert_eq!(sup.health("stt").unwrap().state, ProviderState::Offline);
        sup.stop();
    }

    #[tokio::test]
    async fn mark_healthy_resets_counters() {
        let sup = ProviderSupervisor::new();
        sup.register("tts", Arc::new(NullReconnectable));
        sup.mark_failed("tts", "boom");
        sup.mark_failed("tts", "boom");
        sup.mark_healthy("tts");
        let health = sup.health("tts").unwrap();
        assert_eq!(health.state, ProviderState::Healthy);
        assert_eq!(health.failure_count, 0);
        assert!(health.last_error.is_none());
    }

    #[tokio::test]
    async fn listeners_invoked_in_registration_order() {
        let sup = ProviderSupervisor::new();
        sup.register("stt", Arc::new(NullReconnectable));
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        sup.add_listener(Arc::new(move |_, _| o1.lock().push(1)));
        let o2 = order.clone();
        sup.add_listener(Arc::new(move |_, _| o2.lock().push(2)));
        sup.mark_failed("stt", "boom");
        assert_eq!(*order.lock(), vec![1, 2]);
    }

    #[tokio::test]
    async fn a_panicking_listener_is_swallowed() {
        let sup = ProviderSupervisor::new();
        sup.register("stt", Arc::new(NullReconnectable));
        sup.add_listener(Arc::new(|_, _| panic!("listener exploded")));
        let called = Arc::new(Mutex::new(false));
        let c = called.clone();
        sup.add_listener(Arc::new(move |_, _| *c.lock() = true));
        sup.mark_failed("stt", "boom");
        assert!(*called.lock());
    }

    #[tokio::test]
    async fn s4_stt_outage_recovers_on_fourth_reconnect_attempt() {
        let sup = ProviderSupervisor::new();
        sup.register(
            "stt",
            Arc::new(FlakyThenHealthy { fail_for: 3, calls: AtomicU32::new(0) }),
        );
        for _ in 0..4 {
            sup.mark_failed("stt", "stream() raised");
        }
        assert_eq!(sup.health("stt").unwrap().state, ProviderState::Offline);

        // Drive the reconnect loop forward past its real-time sleeps.
        tokio::time::pause();
        for _ in 0..4 {
            tokio::time::advance(Duration::from_secs(31)).await;
            tokio::task::yield_now().await;
        }
        // allow the spawned task's final mark_healthy to run
        for _ in 0..20 {
            if sup.health("stt").unwrap().state == ProviderState::Healthy {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert_eq!(sup.health("stt").unwrap().state, ProviderState::Healthy);
        sup.stop();
    }
}
