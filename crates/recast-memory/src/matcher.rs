use std::collections::HashSet;

use anyhow::Result;

use recast_schema::{Source, SourceFilters};

use crate::store::KnowledgeStore;

/// Snippet window width in bytes, matching the context the generation
/// prompts expect.
const SNIPPET_WIDTH: usize = 200;

/// How many candidates to pull per requested result before scoring.
const CANDIDATE_FACTOR: usize = 3;

#[derive(Debug, Clone)]
pub struct ScoredSource {
    pub source: Source,
    pub score: f64,
    pub snippet: String,
}

/// Lexical relevance ranking over stored sources. Deliberately not
/// semantic: substring and token-overlap heuristics only.
#[derive(Clone)]
pub struct RelevanceMatcher {
    store: KnowledgeStore,
}

impl RelevanceMatcher {
    pub fn new(store: KnowledgeStore) -> Self {
        Self { store }
    }

    /// Score filter-narrowed candidates against `query`, dropping anything
    /// below `min_score` and keeping the best `limit`. Ties preserve the
    /// store's most-recently-updated-first order.
    pub async fn search(
        &self,
        query: &str,
        filters: &SourceFilters,
        limit: usize,
        min_score: f64,
    ) -> Result<Vec<ScoredSource>> {
        let candidates = self
            .store
            .list_sources(filters, limit * CANDIDATE_FACTOR, 0)
            .await?;

        let mut results: Vec<ScoredSource> = candidates
            .into_iter()
            .filter_map(|source| {
                let score = relevance_score(&source, query);
                if score < min_score {
                    return None;
                }
                let snippet = extract_snippet(&source.content, query, SNIPPET_WIDTH);
                Some(ScoredSource {
                    source,
                    score,
                    snippet,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(limit);
        Ok(results)
    }
}

/// Weighted lexical score in [0, 1]:
/// title substring 0.4 (else 0.3 x token overlap), content substring 0.3
/// (else 0.2 x token overlap), plus 0.1 each for a topic and a tag hit.
pub fn relevance_score(source: &Source, query: &str) -> f64 {
    let query_lower = query.to_lowercase();
    let query_tokens: HashSet<&str> = query_lower.split_whitespace().collect();

    let mut score = 0.0;

    let title_lower = source.title.to_lowercase();
    if title_lower.contains(&query_lower) {
        score += 0.4;
    } else {
        score += 0.3 * token_overlap(&query_tokens, &title_lower);
    }

    let content_lower = source.content.to_lowercase();
    if content_lower.contains(&query_lower) {
        score += 0.3;
    } else {
        score += 0.2 * token_overlap(&query_tokens, &content_lower);
    }

    if any_token_hit(&query_tokens, &source.topics) {
        score += 0.1;
    }
    if any_token_hit(&query_tokens, &source.tags) {
        score += 0.1;
    }

    score.min(1.0)
}

fn token_overlap(query_tokens: &HashSet<&str>, field_lower: &str) -> f64 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let field_tokens: HashSet<&str> = field_lower.split_whitespace().collect();
    let shared = query_tokens.intersection(&field_tokens).count();
    shared as f64 / query_tokens.len() as f64
}

fn any_token_hit(query_tokens: &HashSet<&str>, values: &[String]) -> bool {
    values.iter().any(|value| {
        let value_lower = value.to_lowercase();
        query_tokens.iter().any(|token| value_lower.contains(token))
    })
}

/// Window centered on the first case-insensitive occurrence of the whole
/// query, with ellipsis markers at truncated edges; falls back to the
/// leading `width` characters when the query never occurs.
pub fn extract_snippet(content: &str, query: &str, width: usize) -> String {
    let content_lower = content.to_lowercase();
    let query_lower = query.to_lowercase();

    let Some(pos) = content_lower.find(&query_lower).filter(|p| *p < content.len()) else {
        let leading: String = content.chars().take(width).collect();
        return if content.chars().count() > width {
            format!("{leading}...")
        } else {
            leading
        };
    };

    let start = clamp_boundary(content, pos.saturating_sub(width / 2));
    let end = clamp_boundary(content, (start + width).min(content.len()));

    let mut snippet = content[start..end].to_string();
    if start > 0 {
        snippet = format!("...{snippet}");
    }
    if end < content.len() {
        snippet = format!("{snippet}...");
    }
    snippet
}

fn clamp_boundary(s: &str, mut index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    while !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
