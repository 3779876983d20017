use std::sync::Arc;

use anyhow::{anyhow, Result};

use recast_memory::{KnowledgeStore, SourceUpdate};
use recast_provider::GenerationClient;
use recast_schema::Source;

use crate::prompts;

/// Extracts topics and a summary for a stored source so the matcher and the
/// hybrid discovery step have something to work with.
pub struct SourceIndexer {
    client: Arc<GenerationClient>,
    store: KnowledgeStore,
}

impl SourceIndexer {
    pub fn new(client: Arc<GenerationClient>, store: KnowledgeStore) -> Self {
        Self { client, store }
    }

    /// One backend call; on any failure the stored source is left untouched.
    pub async fn index(&self, source_id: &str) -> Result<Source> {
        let source = self
            .store
            .get_source(source_id)
            .await?
            .ok_or_else(|| anyhow!("source not found: {source_id}"))?;

        let system = prompts::index_system();
        let user = prompts::index_user(&source.title, &source.content);
        let value = self
            .client
            .generate(&system, &user)
            .await
            .ok_or_else(|| anyhow!("indexing call produced no usable response"))?;

        let topics: Vec<String> = value
            .get("topics")
            .and_then(|v| v.as_array())
            .map(|items| {
                items
                    .iter()
                    .filter_map(|t| t.as_str())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let summary = value
            .get("summary")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        if topics.is_empty() || summary.is_empty() {
            return Err(anyhow!("indexing response is missing topics or summary"));
        }

        tracing::info!(source_id, topics = topics.len(), "indexed source");
        self.store
            .update_source(
                source_id,
                SourceUpdate {
                    topics: Some(topics),
                    summary: Some(summary),
                    ..SourceUpdate::default()
                },
            )
            .await?
            .ok_or_else(|| anyhow!("source disappeared during indexing: {source_id}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use recast_provider::{RateGate, TextCompleter};
    use recast_schema::SourceType;

    struct FixedCompleter(String);

    #[async_trait]
    impl TextCompleter for FixedCompleter {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn indexer_with(store: KnowledgeStore, reply: serde_json::Value) -> SourceIndexer {
        let client = Arc::new(GenerationClient::new(
            Arc::new(FixedCompleter(reply.to_string())),
            RateGate::new(100, 10_000),
        ));
        SourceIndexer::new(client, store)
    }

    #[tokio::test]
    async fn index_persists_topics_and_summary() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let source = Source::new(SourceType::Text, "Launch notes", "all about launching stores");
        let id = source.id.clone();
        store.insert_source(source).await.unwrap();

        let indexer = indexer_with(
            store.clone(),
            serde_json::json!({
                "topics": ["launching", "scope", "store design"],
                "summary": "Practical notes on getting a first store version live quickly by cutting scope, with emphasis on shipping a minimal catalog before investing in design polish and marketing automation across the first weeks."
            }),
        );
        let indexed = indexer.index(&id).await.unwrap();
        assert_eq!(indexed.topics.len(), 3);
        assert!(indexed.summary.is_some());

        let stored = store.get_source(&id).await.unwrap().unwrap();
        assert_eq!(stored.topics, indexed.topics);
    }

    #[tokio::test]
    async fn bad_response_leaves_source_unchanged() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let source = Source::new(SourceType::Text, "Notes", "content");
        let id = source.id.clone();
        store.insert_source(source).await.unwrap();

        let indexer = indexer_with(store.clone(), serde_json::json!({"topics": []}));
        assert!(indexer.index(&id).await.is_err());

        let stored = store.get_source(&id).await.unwrap().unwrap();
        assert!(stored.topics.is_empty());
        assert!(stored.summary.is_none());
    }

    #[tokio::test]
    async fn missing_source_is_an_error() {
        let store = KnowledgeStore::open_in_memory().unwrap();
        let indexer = indexer_with(store, serde_json::json!({}));
        assert!(indexer.index("src_missing000").await.is_err());
    }
}
