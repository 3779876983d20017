pub mod gemini;
pub mod rate_gate;

pub use gemini::GeminiClient;
pub use rate_gate::RateGate;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

/// The backend seam: one prompt pair in, raw completion text out.
///
/// Tests substitute deterministic fakes here without touching the rate gate.
#[async_trait]
pub trait TextCompleter: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

/// One quota-gated call-and-parse round trip to the backend.
///
/// Failures (transport, empty response, unparseable JSON) come back as
/// `None`, never as an error: retry policy belongs to callers.
pub struct GenerationClient {
    completer: Arc<dyn TextCompleter>,
    gate: RateGate,
}

impl GenerationClient {
    pub fn new(completer: Arc<dyn TextCompleter>, gate: RateGate) -> Self {
        Self { completer, gate }
    }

    pub async fn generate(&self, system: &str, user: &str) -> Option<serde_json::Value> {
        self.gate.acquire().await;

        let text = match self.completer.complete(system, user).await {
            Ok(text) => text,
            Err(err) => {
                tracing::error!("generation call failed: {err:#}");
                return None;
            }
        };

        let stripped = strip_code_fence(&text);
        if stripped.is_empty() {
            tracing::warn!("backend returned an empty completion");
            return None;
        }

        match serde_json::from_str::<serde_json::Value>(stripped) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!("backend completion was not valid JSON: {err}");
                None
            }
        }
    }
}

/// Remove a wrapping ```json ... ``` or bare ``` ... ``` fence, if present.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    {
        if let Some(inner) = rest.strip_suffix("```") {
            return inner.trim();
        }
    }
    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedCompleter {
        reply: String,
        calls: AtomicUsize,
    }

    impl FixedCompleter {
        fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl TextCompleter for FixedCompleter {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    struct FailingCompleter;

    #[async_trait]
    impl TextCompleter for FailingCompleter {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Err(anyhow!("connection reset"))
        }
    }

    fn client_with(completer: Arc<dyn TextCompleter>) -> GenerationClient {
        GenerationClient::new(completer, RateGate::new(100, 10_000))
    }

    #[test]
    fn strip_code_fence_handles_json_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn strip_code_fence_handles_bare_fence() {
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
    }

    #[test]
    fn strip_code_fence_leaves_plain_json_alone() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn generate_parses_fenced_object() {
        let client = client_with(Arc::new(FixedCompleter::new(
            "```json\n{\"ideas\": []}\n```",
        )));
        let value = client.generate("s", "u").await.unwrap();
        assert!(value["ideas"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn generate_returns_none_on_transport_failure() {
        let client = client_with(Arc::new(FailingCompleter));
        assert!(client.generate("s", "u").await.is_none());
    }

    #[tokio::test]
    async fn generate_returns_none_on_unparseable_reply() {
        let client = client_with(Arc::new(FixedCompleter::new("not json at all")));
        assert!(client.generate("s", "u").await.is_none());
    }

    #[tokio::test]
    async fn generate_makes_exactly_one_backend_call() {
        let completer = Arc::new(FixedCompleter::new("{}"));
        let client = client_with(completer.clone());
        client.generate("s", "u").await;
        assert_eq!(completer.calls.load(Ordering::SeqCst), 1);
    }
}
