use std::sync::Arc;

use recast_provider::GenerationClient;
use recast_schema::{ContentStyle, Idea};

use crate::prompts;

/// Source text below this many characters is not worth a backend call.
const MIN_SOURCE_CHARS: usize = 50;

/// First pipeline stage: source text in, a list of typed content angles out.
pub struct IdeaSynthesizer {
    client: Arc<GenerationClient>,
    min_ideas: usize,
    max_ideas: usize,
}

impl IdeaSynthesizer {
    pub fn new(client: Arc<GenerationClient>, min_ideas: usize, max_ideas: usize) -> Self {
        Self {
            client,
            min_ideas,
            max_ideas,
        }
    }

    /// `None` means the whole call failed (too little input, or a malformed
    /// top-level response). Individually malformed ideas are skipped.
    pub async fn synthesize(&self, source_text: &str, style: &ContentStyle) -> Option<Vec<Idea>> {
        if source_text.chars().count() < MIN_SOURCE_CHARS {
            tracing::warn!(
                chars = source_text.chars().count(),
                "source text too short for idea generation"
            );
            return None;
        }

        let system = prompts::idea_system(style, self.min_ideas, self.max_ideas);
        let user = prompts::idea_user(source_text);
        let value = self.client.generate(&system, &user).await?;

        let Some(raw_ideas) = value.get("ideas").and_then(|v| v.as_array()) else {
            tracing::warn!("idea response is missing the \"ideas\" list");
            return None;
        };

        let mut ideas = Vec::with_capacity(raw_ideas.len());
        for (i, raw) in raw_ideas.iter().enumerate() {
            match serde_json::from_value::<Idea>(raw.clone()) {
                Ok(idea) => ideas.push(idea),
                Err(err) => {
                    tracing::warn!(index = i, "skipping malformed idea: {err}");
                }
            }
        }
        Some(ideas)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use recast_provider::{RateGate, TextCompleter};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingCompleter {
        reply: String,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl TextCompleter for CountingCompleter {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.reply.clone())
        }
    }

    fn synthesizer_with(reply: &str, calls: Arc<AtomicUsize>) -> IdeaSynthesizer {
        let completer = Arc::new(CountingCompleter {
            reply: reply.to_string(),
            calls,
        });
        let client = Arc::new(GenerationClient::new(completer, RateGate::new(100, 10_000)));
        IdeaSynthesizer::new(client, 5, 10)
    }

    fn long_text() -> String {
        "The fastest way to launch a store is to cut scope until the first version fits in a weekend."
            .to_string()
    }

    #[tokio::test]
    async fn short_input_short_circuits_without_a_backend_call() {
        let calls = Arc::new(AtomicUsize::new(0));
        let synth = synthesizer_with("{}", calls.clone());
        let result = synth.synthesize("too short", &ContentStyle::default()).await;
        assert!(result.is_none());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn parses_well_formed_ideas() {
        let reply = serde_json::json!({
            "ideas": (1..=7).map(|i| serde_json::json!({
                "content_type": "tweet",
                "title": format!("Idea {i}"),
                "snippet": "cut scope until the first version fits"
            })).collect::<Vec<_>>()
        })
        .to_string();
        let synth = synthesizer_with(&reply, Arc::new(AtomicUsize::new(0)));
        let ideas = synth
            .synthesize(&long_text(), &ContentStyle::default())
            .await
            .unwrap();
        assert_eq!(ideas.len(), 7);
        assert_eq!(ideas[0].title, "Idea 1");
    }

    #[tokio::test]
    async fn malformed_elements_are_skipped_not_fatal() {
        let reply = serde_json::json!({
            "ideas": [
                {"content_type": "tweet", "title": "good", "snippet": "quote"},
                {"content_type": "podcast", "title": "bad type", "snippet": "quote"},
                {"title": "missing type"},
                {"content_type": "reel", "title": "also good", "snippet": "quote"}
            ]
        })
        .to_string();
        let synth = synthesizer_with(&reply, Arc::new(AtomicUsize::new(0)));
        let ideas = synth
            .synthesize(&long_text(), &ContentStyle::default())
            .await
            .unwrap();
        assert_eq!(ideas.len(), 2);
    }

    #[tokio::test]
    async fn missing_ideas_key_is_none() {
        let synth = synthesizer_with(r#"{"results": []}"#, Arc::new(AtomicUsize::new(0)));
        assert!(synth
            .synthesize(&long_text(), &ContentStyle::default())
            .await
            .is_none());
    }
}
