//! Startup health checks (§4.9): validate LLM connectivity, tool schemas,
//! the chat-context contract, the memory layer, and the STT/TTS pipelines
//! before the gateway starts accepting connections. One check per critical
//! subsystem, run in sequence; any failure aborts startup.

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;

use conductor_domain::tool::{Message, Role};
use conductor_intent::ToolRegistry;
use conductor_memory::MemoryManager;
use conductor_providers::{
    ContextBuilder, ProviderState, ProviderSupervisor, ResilientSttProxy, ResilientTtsProxy, SmartLlm,
};

use crate::state::AppState;

const LLM_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const TTS_CHECK_TIMEOUT: Duration = Duration::from_secs(30);
const HEALTH_CHECK_USER_ID: &str = "__health_check_test__";

#[async_trait::async_trait]
pub trait HealthCheck: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self) -> (bool, String);
}

/// Confirms the LLM can produce at least one streamed token.
pub struct LlmConnectivityCheck {
    pub smart_llm: Arc<SmartLlm>,
}

#[async_trait::async_trait]
impl HealthCheck for LlmConnectivityCheck {
    fn name(&self) -> &'static str {
        "LLM Connectivity"
    }

    async fn run(&self) -> (bool, String) {
        let chat_ctx = vec![Message::user("Say OK")];
        let builder: ContextBuilder = Arc::new(|_| ("You are a test assistant.".to_string(), Vec::new()));

        let attempt = async {
            let mut stream = self.smart_llm.chat(&chat_ctx, &builder).await?;
            Ok::<_, conductor_domain::error::Error>(stream.next().await)
        };

        match tokio::time::timeout(LLM_CHECK_TIMEOUT, attempt).await {
            Ok(Ok(Some(Ok(_)))) => (true, "LLM streaming operational".to_string()),
            Ok(Ok(Some(Err(e)))) => (false, format!("LLM connectivity failed: {e}")),
            Ok(Ok(None)) => (false, "LLM did not produce any response chunks".to_string()),
            Ok(Err(e)) => (false, format!("LLM connectivity failed: {e}")),
            Err(_) => (false, format!("LLM response timeout (>{}s)", LLM_CHECK_TIMEOUT.as_secs())),
        }
    }
}

/// Confirms every registered tool carries a name, description, and an
/// object-shaped parameter schema.
pub struct ToolSchemaCheck {
    pub registry: Arc<ToolRegistry>,
}

#[async_trait::async_trait]
impl HealthCheck for ToolSchemaCheck {
    fn name(&self) -> &'static str {
        "Tool Schema Validation"
    }

    async fn run(&self) -> (bool, String) {
        let tools = self.registry.all();
        if tools.is_empty() {
            return (true, "No tools registered (OK)".to_string());
        }

        let mut invalid = Vec::new();
        for tool in &tools {
            if tool.name.trim().is_empty() {
                invalid.push("Unknown tool: missing 'name'".to_string());
                continue;
            }
            if tool.description.trim().is_empty() {
                invalid.push(format!("{}: missing 'description'", tool.name));
            }
            if !tool.parameters.is_object() {
                invalid.push(format!("{}: parameters must be an object", tool.name));
            }
        }

        if invalid.is_empty() {
            (true, format!("All {} tools have valid schemas", tools.len()))
        } else {
            (
                false,
                format!("Invalid tool schemas ({} issues):\n{}", invalid.len(), invalid.join("\n")),
            )
        }
    }
}

/// Confirms the message contract the rest of the gateway assumes: a
/// system/user pair round-trips through a plain `Vec<Message>` with the
/// roles we expect.
pub struct ChatContextCheck;

#[async_trait::async_trait]
impl HealthCheck for ChatContextCheck {
    fn name(&self) -> &'static str {
        "ChatContext Contract"
    }

    async fn run(&self) -> (bool, String) {
        let messages = vec![
            Message::system("Test system prompt"),
            Message::user("Test user message"),
        ];

        if messages.len() != 2 {
            return (false, format!("Expected 2 messages, got {}", messages.len()));
        }
        for message in &messages {
            if !matches!(message.role, Role::System | Role::User | Role::Assistant) {
                return (false, format!("Invalid role: {:?}", message.role));
            }
        }
        (true, "ChatContext contract validated".to_string())
    }
}

/// Confirms the memory layer can write and that the write is visible
/// through the local store's count.
pub struct MemoryLayerCheck {
    pub memory: Arc<MemoryManager>,
}

#[async_trait::async_trait]
impl HealthCheck for MemoryLayerCheck {
    fn name(&self) -> &'static str {
        "Memory Layer"
    }

    async fn run(&self) -> (bool, String) {
        let probe = vec![Message::user("health check probe")];
        if let Err(e) = self.memory.save_session_context(&probe, HEALTH_CHECK_USER_ID).await {
            return (false, format!("Memory layer check failed: {e}"));
        }
        if self.memory.local_memory_count(HEALTH_CHECK_USER_ID) == 0 {
            return (false, "Memory layer write did not persist".to_string());
        }
        (true, "Memory layer operational".to_string())
    }
}

/// Confirms the STT proxy can open a stream without the supervisor
/// recording a failure.
pub struct SttPipelineCheck {
    pub stt: Arc<ResilientSttProxy>,
    pub supervisor: Arc<ProviderSupervisor>,
}

#[async_trait::async_trait]
impl HealthCheck for SttPipelineCheck {
    fn name(&self) -> &'static str {
        "STT Pipeline"
    }

    async fn run(&self) -> (bool, String) {
        let _ = self.stt.stream("__health_check__").await;
        match self.supervisor.health("stt") {
            Some(h) if h.state != ProviderState::Healthy => {
                (false, format!("STT pipeline degraded: {:?}", h.state))
            }
            _ => (true, "STT pipeline initialized".to_string()),
        }
    }
}

/// Confirms the TTS proxy can synthesize at least one audio frame.
pub struct TtsPipelineCheck {
    pub tts: Arc<ResilientTtsProxy>,
}

#[async_trait::async_trait]
impl HealthCheck for TtsPipelineCheck {
    fn name(&self) -> &'static str {
        "TTS Pipeline"
    }

    async fn run(&self) -> (bool, String) {
        let mut frames = self.tts.synthesize("Startup check").await;
        match tokio::time::timeout(TTS_CHECK_TIMEOUT, frames.next()).await {
            Ok(Some(Ok(_))) => (true, "TTS pipeline operational".to_string()),
            Ok(Some(Err(e))) => (false, format!("TTS pipeline check failed: {e}")),
            Ok(None) => (false, "TTS produced no audio chunks".to_string()),
            Err(_) => (false, format!("TTS synthesis timeout (>{}s)", TTS_CHECK_TIMEOUT.as_secs())),
        }
    }
}

/// Runs every check in order and prints a pass/fail summary in the same
/// plain-bracket style the `doctor` subcommand uses. Returns `true` only
/// if every check passed.
pub async fn run_startup_checks(state: &AppState) -> bool {
    println!("\n{}", "=".repeat(60));
    println!("RUNNING STARTUP HEALTH CHECKS");
    println!("{}\n", "=".repeat(60));

    let checks: Vec<Box<dyn HealthCheck>> = vec![
        Box::new(LlmConnectivityCheck { smart_llm: state.smart_llm.clone() }),
        Box::new(ToolSchemaCheck { registry: state.tool_registry.clone() }),
        Box::new(ChatContextCheck),
        Box::new(MemoryLayerCheck { memory: state.memory.clone() }),
        Box::new(SttPipelineCheck { stt: state.stt.clone(), supervisor: state.supervisor.clone() }),
        Box::new(TtsPipelineCheck { tts: state.tts.clone() }),
    ];

    let mut all_passed = true;
    let mut failed = Vec::new();

    for check in &checks {
        let (passed, message) = check.run().await;
        print_check(check.name(), passed, &message);
        if passed {
            tracing::info!(check = check.name(), %message, "health check passed");
        } else {
            tracing::error!(check = check.name(), %message, "health check failed");
            all_passed = false;
            failed.push((check.name(), message));
        }
    }

    println!("\n{}", "=".repeat(60));
    if all_passed {
        println!("ALL HEALTH CHECKS PASSED ({}/{})", checks.len(), checks.len());
    } else {
        println!("HEALTH CHECKS FAILED ({}/{} passed)", checks.len() - failed.len(), checks.len());
        println!("\nFailed checks:");
        for (name, message) in &failed {
            println!("  - {name}: {message}");
        }
        println!("\nAGENT STARTUP ABORTED - FIX ISSUES ABOVE");
    }
    println!("{}\n", "=".repeat(60));

    all_passed
}

fn print_check(name: &str, passed: bool, detail: &str) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
