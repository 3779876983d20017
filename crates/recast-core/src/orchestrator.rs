use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{anyhow, bail, Result};

use recast_memory::{KnowledgeStore, RelevanceMatcher, ScoredSource};
use recast_provider::GenerationClient;
use recast_schema::{
    Artifact, AugmentStrategy, ContentStyle, FieldLimits, Session, SessionInputs, SessionMode,
    Source, SourceFilters,
};

use crate::artifacts::ArtifactSynthesizer;
use crate::config::RecastConfig;
use crate::ideas::IdeaSynthesizer;
use crate::pool::GenerationPool;

const VISION_MAX_SOURCES: usize = 5;
const VISION_MIN_SCORE: f64 = 0.5;
const DISCOVERY_MIN_SCORE: f64 = 0.3;
const DISCOVERY_TOPIC_LIMIT: usize = 5;
const CONTEXT_CONTENT_CHARS: usize = 4000;
const CONTEXT_SUMMARY_CHARS: usize = 500;

/// Runs one generation session end to end: gather sources for the chosen
/// mode, build a context string, run the idea and artifact stages, and
/// persist the outcome. Every failure after the session row exists marks it
/// failed before the error propagates.
pub struct SessionOrchestrator {
    store: KnowledgeStore,
    matcher: RelevanceMatcher,
    ideas: IdeaSynthesizer,
    artifacts: ArtifactSynthesizer,
    pool: GenerationPool,
    limits: FieldLimits,
}

/// Per-mode gathering result handed to the shared pipeline tail.
struct Gathered {
    matched_source_ids: Vec<String>,
    discovered_source_ids: Vec<String>,
    context: String,
}

impl SessionOrchestrator {
    pub fn new(store: KnowledgeStore, client: Arc<GenerationClient>, config: &RecastConfig) -> Self {
        Self {
            matcher: RelevanceMatcher::new(store.clone()),
            store,
            ideas: IdeaSynthesizer::new(client.clone(), config.min_ideas, config.max_ideas),
            artifacts: ArtifactSynthesizer::new(client, config.max_repair_attempts),
            pool: GenerationPool::new(config.max_concurrent_sessions),
            limits: config.limits.clone(),
        }
    }

    /// Generate from a free-text vision, grounded in whatever stored sources
    /// match it. No matches is not an error; generation proceeds from the
    /// vision alone.
    pub async fn run_vision(
        &self,
        vision: &str,
        count: usize,
        style: &ContentStyle,
    ) -> Result<Session> {
        let inputs = SessionInputs {
            vision: Some(vision.to_string()),
            requested_count: Some(count),
            ..SessionInputs::default()
        };
        let session = self.begin(SessionMode::Vision, inputs).await?;
        let gathered = self.gather_vision(vision).await;
        self.finish(session, count, style, gathered).await
    }

    /// Generate from exactly one stored source; a missing id fails the run.
    pub async fn run_single(
        &self,
        source_id: &str,
        count: usize,
        style: &ContentStyle,
    ) -> Result<Session> {
        let inputs = SessionInputs {
            selected_source_ids: vec![source_id.to_string()],
            requested_count: Some(count),
            ..SessionInputs::default()
        };
        let session = self.begin(SessionMode::Single, inputs).await?;
        let gathered = self.gather_single(source_id).await;
        self.finish(session, count, style, gathered).await
    }

    /// Generate from several selected sources. Missing ids are dropped; the
    /// run fails only when none resolve.
    pub async fn run_multiple(
        &self,
        source_ids: &[String],
        count: usize,
        style: &ContentStyle,
    ) -> Result<Session> {
        let inputs = SessionInputs {
            selected_source_ids: source_ids.to_vec(),
            requested_count: Some(count),
            ..SessionInputs::default()
        };
        let session = self.begin(SessionMode::Multiple, inputs).await?;
        let gathered = self.gather_multiple(source_ids).await;
        self.finish(session, count, style, gathered).await
    }

    /// Let the store pick: filter, take the freshest `count` sources.
    pub async fn run_auto(
        &self,
        filters: &SourceFilters,
        count: usize,
        style: &ContentStyle,
    ) -> Result<Session> {
        let inputs = SessionInputs {
            requested_count: Some(count),
            ..SessionInputs::default()
        };
        let session = self.begin(SessionMode::Auto, inputs).await?;
        let gathered = self.gather_auto(filters, count).await;
        self.finish(session, count, style, gathered).await
    }

    /// User-selected sources plus relevance-discovered extras. The strategy
    /// label is recorded for reporting; discovery itself is the same search
    /// regardless of strategy.
    pub async fn run_hybrid(
        &self,
        selected_source_ids: &[String],
        hint: Option<&str>,
        strategy: AugmentStrategy,
        augment_count: usize,
        count: usize,
        style: &ContentStyle,
    ) -> Result<Session> {
        let inputs = SessionInputs {
            selected_source_ids: selected_source_ids.to_vec(),
            requested_count: Some(count),
            augment_hint: hint.map(str::to_string),
            augment_strategy: Some(strategy),
            augment_count: Some(augment_count),
            ..SessionInputs::default()
        };
        let session = self.begin(SessionMode::Hybrid, inputs).await?;
        let gathered = self.gather_hybrid(selected_source_ids, hint, augment_count).await;
        self.finish(session, count, style, gathered).await
    }

    // ------------------------------------------------------------------
    // Gathering
    // ------------------------------------------------------------------

    async fn gather_vision(&self, vision: &str) -> Result<Gathered> {
        let matches = self
            .matcher
            .search(vision, &SourceFilters::default(), VISION_MAX_SOURCES, VISION_MIN_SCORE)
            .await?;
        if matches.is_empty() {
            return Ok(Gathered {
                matched_source_ids: Vec::new(),
                discovered_source_ids: Vec::new(),
                context: format!(
                    "{vision}\n\nNo existing sources matched. Generate based on the idea alone."
                ),
            });
        }
        Ok(Gathered {
            matched_source_ids: matches.iter().map(|m| m.source.id.clone()).collect(),
            discovered_source_ids: Vec::new(),
            context: format!("{vision}\n\n{}", scored_context(&matches)),
        })
    }

    async fn gather_single(&self, source_id: &str) -> Result<Gathered> {
        let source = self
            .store
            .get_source(source_id)
            .await?
            .ok_or_else(|| anyhow!("source not found: {source_id}"))?;
        Ok(Gathered {
            matched_source_ids: vec![source.id.clone()],
            discovered_source_ids: Vec::new(),
            context: single_context(&source),
        })
    }

    async fn gather_multiple(&self, source_ids: &[String]) -> Result<Gathered> {
        let sources = self.resolve_sources(source_ids).await?;
        if sources.is_empty() {
            bail!("no valid sources found");
        }
        Ok(Gathered {
            matched_source_ids: sources.iter().map(|s| s.id.clone()).collect(),
            discovered_source_ids: Vec::new(),
            context: summary_context(&sources),
        })
    }

    async fn gather_auto(&self, filters: &SourceFilters, count: usize) -> Result<Gathered> {
        let mut sources = self.store.list_sources(filters, count * 2, 0).await?;
        if sources.is_empty() {
            bail!("no sources found matching criteria");
        }
        sources.truncate(count);
        Ok(Gathered {
            matched_source_ids: sources.iter().map(|s| s.id.clone()).collect(),
            discovered_source_ids: Vec::new(),
            context: summary_context(&sources),
        })
    }

    async fn gather_hybrid(
        &self,
        selected_source_ids: &[String],
        hint: Option<&str>,
        augment_count: usize,
    ) -> Result<Gathered> {
        let selected = self.resolve_sources(selected_source_ids).await?;
        if selected.is_empty() {
            bail!("no valid user-selected sources found");
        }

        let discovered = if augment_count > 0 {
            self.discover(&selected, hint, augment_count).await?
        } else {
            Vec::new()
        };

        let mut combined = selected.clone();
        combined.extend(discovered.clone());
        Ok(Gathered {
            matched_source_ids: selected.iter().map(|s| s.id.clone()).collect(),
            discovered_source_ids: discovered.iter().map(|s| s.id.clone()).collect(),
            context: summary_context(&combined),
        })
    }

    // ------------------------------------------------------------------
    // Shared tail
    // ------------------------------------------------------------------

    async fn begin(&self, mode: SessionMode, inputs: SessionInputs) -> Result<Session> {
        let session = Session::new(mode, inputs);
        self.store.insert_session(session.clone()).await?;
        self.store.mark_processing(&session.id).await?;
        Ok(session)
    }

    /// Every error past this point, gathering, pipeline, or the persistence
    /// of a successful run, flows through the single failure arm below so
    /// the session can never be left in `processing`.
    async fn finish(
        &self,
        session: Session,
        count: usize,
        style: &ContentStyle,
        gathered: Result<Gathered>,
    ) -> Result<Session> {
        let result = match gathered {
            Ok(gathered) => {
                match self
                    .pool
                    .run(self.run_pipeline(&session.id, &gathered.context, count, style))
                    .await
                {
                    Ok(artifacts) => self.persist_success(&session.id, &gathered, &artifacts).await,
                    Err(err) => Err(err),
                }
            }
            Err(err) => Err(err),
        };

        match result {
            Ok(session) => Ok(session),
            Err(err) => {
                self.store.mark_failed(&session.id, &format!("{err:#}")).await?;
                Err(err.context(format!("session {} failed", session.id)))
            }
        }
    }

    async fn persist_success(
        &self,
        session_id: &str,
        gathered: &Gathered,
        artifacts: &[Artifact],
    ) -> Result<Session> {
        for id in gathered
            .matched_source_ids
            .iter()
            .chain(&gathered.discovered_source_ids)
        {
            self.store.record_use(id).await?;
        }
        self.store
            .mark_completed(
                session_id,
                &gathered.matched_source_ids,
                &gathered.discovered_source_ids,
                artifacts,
            )
            .await?;
        self.store
            .get_session(session_id)
            .await?
            .ok_or_else(|| anyhow!("session disappeared: {session_id}"))
    }

    async fn run_pipeline(
        &self,
        session_id: &str,
        context: &str,
        count: usize,
        style: &ContentStyle,
    ) -> Result<Vec<Artifact>> {
        let mut ideas = self
            .ideas
            .synthesize(context, style)
            .await
            .ok_or_else(|| anyhow!("idea generation produced no usable response"))?;
        if ideas.is_empty() {
            bail!("idea generation returned no ideas");
        }
        if count > 0 {
            ideas.truncate(count);
        }
        Ok(self
            .artifacts
            .synthesize_all(session_id, &ideas, context, style, &self.limits)
            .await)
    }

    async fn resolve_sources(&self, ids: &[String]) -> Result<Vec<Source>> {
        let mut sources = Vec::with_capacity(ids.len());
        for id in ids {
            match self.store.get_source(id).await? {
                Some(source) => sources.push(source),
                None => tracing::warn!(%id, "skipping unknown source id"),
            }
        }
        Ok(sources)
    }

    /// Topic-or-hint relevance search that never returns an already-selected
    /// source and never exceeds `count`.
    async fn discover(
        &self,
        selected: &[Source],
        hint: Option<&str>,
        count: usize,
    ) -> Result<Vec<Source>> {
        let query = match hint {
            Some(hint) if !hint.trim().is_empty() => hint.to_string(),
            _ => {
                let topics: Vec<&str> = selected
                    .iter()
                    .flat_map(|s| s.topics.iter().map(String::as_str))
                    .take(DISCOVERY_TOPIC_LIMIT)
                    .collect();
                topics.join(" ")
            }
        };
        if query.is_empty() {
            return Ok(Vec::new());
        }

        let results = self
            .matcher
            .search(&query, &SourceFilters::default(), count * 2, DISCOVERY_MIN_SCORE)
            .await?;

        let selected_ids: HashSet<&str> = selected.iter().map(|s| s.id.as_str()).collect();
        let mut discovered: Vec<Source> = results
            .into_iter()
            .filter(|r| !selected_ids.contains(r.source.id.as_str()))
            .map(|r| r.source)
            .collect();
        discovered.truncate(count);
        Ok(discovered)
    }
}

fn scored_context(matches: &[ScoredSource]) -> String {
    matches
        .iter()
        .enumerate()
        .map(|(i, m)| {
            format!(
                "Source {n}: {title}\nRelevance: {score:.0}%\nType: {kind}\nSnippet: {snippet}",
                n = i + 1,
                title = m.source.title,
                score = m.score * 100.0,
                kind = m.source.source_type.as_str(),
                snippet = m.snippet,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn summary_context(sources: &[Source]) -> String {
    sources
        .iter()
        .enumerate()
        .map(|(i, source)| {
            let summary = source
                .summary
                .clone()
                .unwrap_or_else(|| source.content.chars().take(CONTEXT_SUMMARY_CHARS).collect());
            format!(
                "Source {n}: {title}\nType: {kind}\nSummary: {summary}",
                n = i + 1,
                title = source.title,
                kind = source.source_type.as_str(),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn single_context(source: &Source) -> String {
    let content: String = source.content.chars().take(CONTEXT_CONTENT_CHARS).collect();
    format!(
        "Source: {title}\nType: {kind}\nContent:\n{content}",
        title = source.title,
        kind = source.source_type.as_str(),
    )
}
