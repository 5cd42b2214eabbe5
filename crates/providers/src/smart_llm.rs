//! Smart LLM wrapper: context assembly, schema-fix invariant,
//! chaos fault injection, and stream probing around an underlying
//! `LlmProvider`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use conductor_domain::error::{Error, Result};
use conductor_domain::stream::{BoxStream, StreamEvent};
use conductor_domain::tool::{Message, Role, ToolDefinition};
use conductor_telemetry::{ChaosSwitchboard, MetricsCollector, RequestMetrics};

use crate::stream_probe::{probe_stream, ProbeOutcome, DEFAULT_FIRST_CHUNK_TIMEOUT};
use crate::traits::{ChatRequest, LlmProvider};

/// Builds the system prompt and the dynamic tool list for a given user
/// message. Supplied by the caller (turn orchestrator).
pub type ContextBuilder = Arc<dyn Fn(&str) -> (String, Vec<ToolDefinition>) + Send + Sync>;

/// Ensures every tool's `parameters` schema carries a `properties` key
/// (possibly empty), per the schema-fix invariant (§4.6). Cheap deep copy.
pub fn fix_tool_schema(tool: &ToolDefinition) -> ToolDefinition {
    let mut parameters = tool.parameters.clone();
    if let Some(obj) = parameters.as_object_mut() {
        obj.entry("type".to_string())
            .or_insert_with(|| serde_json::Value::String("object".to_string()));
        obj.entry("properties".to_string())
            .or_insert_with(|| serde_json::Value::Object(serde_json::Map::new()));
    } else {
        parameters = serde_json::json!({ "type": "object", "properties": {} });
    }
    ToolDefinition {
        name: tool.name.clone(),
        description: tool.description.clone(),
        parameters,
    }
}

/// Structural check used by the startup health check and ad hoc tests
/// (§4.6 supplemental, §4.9): non-empty name, non-empty description,
/// `parameters.type == "object"` with a `properties` key present.
pub fn validate_tool_schema(tool: &ToolDefinition) -> std::result::Result<(), String> {
    if tool.name.trim().is_empty() {
        return Err("tool schema invalid: empty name".to_string());
    }
    if tool.description.trim().is_empty() {
        return Err(format!("tool '{}' schema invalid: empty description", tool.name));
    }
    let obj = tool
        .parameters
        .as_object()
        .ok_or_else(|| format!("tool '{}' schema invalid: parameters is not an object", tool.name))?;
    if obj.get("type").and_then(|v| v.as_str()) != Some("object") {
        return Err(format!("tool '{}' schema invalid: parameters.type != \"object\"", tool.name));
    }
    if !obj.contains_key("properties") {
        return Err(format!("tool '{}' schema invalid: missing properties key", tool.name));
    }
    Ok(())
}

pub struct SmartLlm {
    inner: Arc<dyn LlmProvider>,
    chaos: Arc<ChaosSwitchboard>,
    metrics: Arc<MetricsCollector>,
    first_chunk_timeout: Duration,
}

impl SmartLlm {
    pub fn new(inner: Arc<dyn LlmProvider>, chaos: Arc<ChaosSwitchboard>, metrics: Arc<MetricsCollector>) -> Self {
        Self {
            inner,
            chaos,
            metrics,
            first_chunk_timeout: DEFAULT_FIRST_CHUNK_TIMEOUT,
        }
    }

    pub fn with_first_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.first_chunk_timeout = timeout;
        self
    }

    /// Runs the full §4.6 pipeline and returns a probed stream of events.
    pub async fn chat(
        &self,
        chat_ctx: &[Message],
        context_builder: &ContextBuilder,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let started = Instant::now();
        let turn_number = self.metrics.next_turn_number();

        // Step 2: extract last user message, flattening content.
        let last_user = chat_ctx
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.extract_all_text())
            .unwrap_or_default();

        // Step 3: caller-supplied context builder.
        let (system_prompt, dynamic_tools) = context_builder(&last_user);

        // Step 4: fresh context, system prompt first, non-system messages follow in order.
        let mut new_ctx = Vec::with_capacity(chat_ctx.len() + 1);
        new_ctx.push(Message::system(system_prompt));
        new_ctx.extend(chat_ctx.iter().filter(|m| m.role != Role::System).cloned());

        // Step 5: schema-fix invariant.
        let tools: Vec<ToolDefinition> = dynamic_tools.iter().map(fix_tool_schema).collect();

        // Step 6: chaos faults, evaluated independently of each other.
        if let Some(delay) = self.chaos.llm_latency_delay() {
            tokio::time::sleep(delay).await;
        }
        if self.chaos.should_rate_limit() {
            return Err(Error::Provider {
                provider: self.inner.provider_id().to_string(),
                message: "429 Too Many Requests (simulated chaos)".to_string(),
            });
        }
        if self.chaos.should_fail_llm_request() {
            return Err(Error::Provider {
                provider: self.inner.provider_id().to_string(),
                message: "500 Internal Server Error (simulated chaos)".to_string(),
            });
        }

        let req = ChatRequest {
            messages: new_ctx,
            tools,
            ..Default::default()
        };

        // Step 7: call underlying LLM, wrap with the stream probe.
        let raw_stream = self.inner.chat_stream(req).await?;

        let metrics = self.metrics.clone();
        let provider_id = self.inner.provider_id().to_string();
        let probed = probe_stream(raw_stream, self.first_chunk_timeout, move |outcome: ProbeOutcome| {
            let mut record = RequestMetrics {
                turn_number,
                llm_latency: started.elapsed().as_secs_f64(),
                ..Default::default()
            };
            if let Some(first) = outcome.first_chunk_latency {
                record.stream_first_chunk_latency = first.as_secs_f64();
            }
            if outcome.chunk_count == 0 {
                record.probe_failures = 1;
            }
            tracing::debug!(provider = %provider_id, turn = turn_number, chunks = outcome.chunk_count, "llm stream finished");
            metrics.record_metric(record);
        });

        Ok(probed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use conductor_domain::capability::LlmCapabilities;
    use conductor_domain::tool::{MessageContent, ToolCall};
    use futures_util::stream;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubLlm {
        fail_with_empty: AtomicBool,
    }

    #[async_trait::async_trait]
    impl LlmProvider for StubLlm {
        async fn chat(&self, _req: ChatRequest) -> Result<crate::traits::ChatResponse> {
            unimplemented!()
        }

        async fn chat_stream(&self, _req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
            if self.fail_with_empty.load(Ordering::SeqCst) {
                Ok(Box::pin(stream::empty()))
            } else {
                Ok(Box::pin(stream::iter(vec![
                    Ok(StreamEvent::Token { text: "hi".into() }),
                    Ok(StreamEvent::Done { usage: None, finish_reason: Some("stop".into()) }),
                ])))
            }
        }

        async fn embeddings(&self, _req: crate::traits::EmbeddingsRequest) -> Result<crate::traits::EmbeddingsResponse> {
            unimplemented!()
        }

        fn capabilities(&self) -> &LlmCapabilities {
            unimplemented!()
        }

        fn provider_id(&self) -> &str {
            "stub"
        }
    }

    fn builder() -> ContextBuilder {
        Arc::new(|_user_msg: &str| {
            ("you are a helpful voice assistant".to_string(), vec![ToolDefinition {
                name: "get_weather".into(),
                description: "gets the weather".into(),
                parameters: serde_json::json!({ "type": "object", "required": [] }),
            }])
        })
    }

    #[test]
    fn fix_tool_schema_adds_missing_properties() {
        let tool = ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            parameters: serde_json::json!({ "type": "object", "required": [] }),
        };
        let fixed = fix_tool_schema(&tool);
        assert!(fixed.parameters.get("properties").is_some());
    }

    #[test]
    fn validate_tool_schema_rejects_missing_properties() {
        let tool = ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            parameters: serde_json::json!({ "type": "object" }),
        };
        assert!(validate_tool_schema(&tool).is_err());
    }

    #[test]
    fn validate_tool_schema_accepts_well_formed() {
        let tool = ToolDefinition {
            name: "t".into(),
            description: "d".into(),
            parameters: serde_json::json!({ "type": "object", "properties": {} }),
        };
        assert!(validate_tool_schema(&tool).is_ok());
    }

    #[tokio::test]
    async fn chat_prepends_system_prompt_and_forwards_tokens() {
        let llm = Arc::new(StubLlm { fail_with_empty: AtomicBool::new(false) });
        let chaos = Arc::new(ChaosSwitchboard::new(Default::default()));
        let metrics = Arc::new(MetricsCollector::new(Default::default()));
        let smart = SmartLlm::new(llm, chaos, metrics);
        let ctx = vec![Message::user("what's the weather")];
        let mut stream = smart.chat(&ctx, &builder()).await.unwrap();
        let mut texts = Vec::new();
        use futures_util::StreamExt;
        while let Some(event) = stream.next().await {
            if let Ok(StreamEvent::Token { text }) = event {
                texts.push(text);
            }
        }
        assert_eq!(texts, vec!["hi"]);
    }

    #[tokio::test]
    async fn empty_llm_stream_surfaces_stream_error() {
        let llm = Arc::new(StubLlm { fail_with_empty: AtomicBool::new(true) });
        let chaos = Arc::new(ChaosSwitchboard::new(Default::default()));
        let metrics = Arc::new(MetricsCollector::new(Default::default()));
        let smart = SmartLlm::new(llm, chaos, metrics);
        let ctx = vec![Message::user("hello")];
        let mut stream = smart.chat(&ctx, &builder()).await.unwrap();
        use futures_util::StreamExt;
        let first = stream.next().await;
        assert!(matches!(first, Some(Err(Error::Other(_)))));
    }

    #[allow(dead_code)]
    fn unused_imports_guard(_: ToolCall, _: MessageContent) {}
}
