//! Stream probe: wraps an LLM token stream with a
//! first-chunk timeout and normalizes stream-level failures.

use std::time::{Duration, Instant};

use conductor_domain::error::Error;
use conductor_domain::stream::{BoxStream, StreamEvent};
use futures_core::Stream;
use futures_util::StreamExt;

pub const DEFAULT_FIRST_CHUNK_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of draining a probed stream to completion, used by `SmartLlm` to
/// finalize telemetry.
#[derive(Debug, Clone, Default)]
pub struct ProbeOutcome {
    pub first_chunk_latency: Option<Duration>,
    pub chunk_count: u32,
}

/// Wraps `inner` so that:
/// - if no chunk arrives within `first_chunk_timeout`, the stream ends
///   early with a single `Err(Error::Timeout)` carrying the exact spec
///   message and no further polling occurs;
/// - if the stream ends having emitted zero chunks, a `StreamError`-shaped
///   message is emitted before ending;
/// - `on_finish` is invoked once, at the end of the stream, with the
///   observed `ProbeOutcome`.
pub fn probe_stream<F>(
    inner: BoxStream<'static, conductor_domain::error::Result<StreamEvent>>,
    first_chunk_timeout: Duration,
    on_finish: F,
) -> BoxStream<'static, conductor_domain::error::Result<StreamEvent>>
where
    F: FnOnce(ProbeOutcome) + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let started = Instant::now();
        let mut first_chunk_latency: Option<Duration> = None;
        let mut chunk_count: u32 = 0;
        let mut on_finish = Some(on_finish);
        let mut inner = inner;

        // First chunk under a timeout.
        match tokio::time::timeout(first_chunk_timeout, inner.next()).await {
            Err(_) => {
                let msg = format!(
                    "Stream timeout: No chunks received within {:.1}s",
                    first_chunk_timeout.as_secs_f64()
                );
                tracing::warn!(timeout_s = first_chunk_timeout.as_secs(), "llm stream first-chunk timeout");
                yield Err(Error::Timeout(msg));
                if let Some(f) = on_finish.take() {
                    f(ProbeOutcome { first_chunk_latency, chunk_count });
                }
                return;
            }
            Ok(None) => {
                yield Err(Error::Other("Stream ended without emitting any chunks".to_string()));
                if let Some(f) = on_finish.take() {
                    f(ProbeOutcome { first_chunk_latency, chunk_count });
                }
                return;
            }
            Ok(Some(first)) => {
                first_chunk_latency = Some(started.elapsed());
                match first {
                    Ok(event) => {
                        chunk_count += 1;
                        yield Ok(event);
                    }
                    Err(e) => {
                        yield Err(Error::Other(format!("Stream error: {e}")));
                        if let Some(f) = on_finish.take() {
                            f(ProbeOutcome { first_chunk_latency, chunk_count });
                        }
                        return;
                    }
                }
            }
        }

        // No per-chunk timeout past the first chunk.
        while let Some(item) = inner.next().await {
            match item {
                Ok(event) => {
                    chunk_count += 1;
                    yield Ok(event);
                }
                Err(e) => {
                    yield Err(Error::Other(format!("Stream error: {e}")));
                    break;
                }
            }
        }

        if chunk_count == 0 {
            yield Err(Error::Other("Stream ended without emitting any chunks".to_string()));
        }
        if let Some(f) = on_finish.take() {
            f(ProbeOutcome { first_chunk_latency, chunk_count });
        }
    })
}

/// Validates a single chat message as part of the context probe (§4.6
/// supplemental): role must be one of the four known roles and content
/// must not be empty. Returns a human-readable reason on violation.
pub fn validate_message_role(role: &str) -> Result<(), String> {
    match role {
        "system" | "user" | "assistant" | "tool" => Ok(()),
        other => Err(format!("unrecognised message role: {other}")),
    }
}

/// Estimates token count the same way the context probe does: ~4 chars
/// per token.
pub fn estimate_tokens(total_chars: usize) -> usize {
    total_chars / 4
}

/// Context probe (§4.6 supplemental): logs warnings (never fails) when no
/// system message is present or the context is unusually large.
pub fn context_probe_warnings(has_system_message: bool, total_chars: usize) -> Vec<String> {
    let mut warnings = Vec::new();
    if !has_system_message {
        warnings.push("context probe: no system message present".to_string());
    }
    if total_chars > 100_000 {
        warnings.push(format!(
            "context probe: content size {total_chars} chars (~{} tokens) exceeds 100k char guideline",
            estimate_tokens(total_chars)
        ));
    }
    warnings
}

#[allow(dead_code)]
fn assert_stream<T: Stream>(_: T) {}
