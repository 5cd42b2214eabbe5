use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Memory (local vector store + cloud-sync heartbeat)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Directory the local in-process vector store persists to.
    #[serde(default = "d_local_path")]
    pub local_store_path: String,
    /// Message count that triggers `summarize_session`.
    #[serde(default = "d_summarize_threshold")]
    pub summarize_threshold: usize,
    #[serde(default)]
    pub cloud_sync: CloudSyncConfig,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            local_store_path: d_local_path(),
            summarize_threshold: d_summarize_threshold(),
            cloud_sync: CloudSyncConfig::default(),
        }
    }
}

/// Heartbeat-only cloud sync. No push/ordering semantics are defined beyond
/// periodic reachability checks; this mirrors the gap in the system the
/// sync logic is grounded on rather than inventing one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudSyncConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "d_sm_url")]
    pub base_url: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub workspace_id: Option<String>,
    #[serde(default = "d_transport")]
    pub transport: SmTransport,
    #[serde(default)]
    pub mcp_endpoint: Option<String>,
    #[serde(default = "d_default_user")]
    pub default_user_id: String,
    #[serde(default = "d_interval")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "d_8000")]
    pub timeout_ms: u64,
    #[serde(default = "d_3")]
    pub max_retries: u32,
}

impl Default for CloudSyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: d_sm_url(),
            api_key: None,
            workspace_id: None,
            transport: d_transport(),
            mcp_endpoint: None,
            default_user_id: d_default_user(),
            heartbeat_interval_secs: d_interval(),
            timeout_ms: d_8000(),
            max_retries: d_3(),
        }
    }
}

/// Transport used to reach the cloud memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmTransport {
    Rest,
    Mcp,
    Hybrid,
}

// ── serde default helpers ───────────────────────────────────────────

fn d_local_path() -> String {
    "./data/memory".into()
}
fn d_summarize_threshold() -> usize {
    20
}
fn d_sm_url() -> String {
    "http://localhost:5000".into()
}
fn d_interval() -> u64 {
    30
}
fn d_8000() -> u64 {
    8000
}
fn d_3() -> u32 {
    3
}
fn d_transport() -> SmTransport {
    SmTransport::Rest
}
fn d_default_user() -> String {
    "default_user".into()
}
