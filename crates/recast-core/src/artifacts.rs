use std::sync::Arc;

use recast_provider::GenerationClient;
use recast_schema::{Artifact, ContentStyle, ContentType, FieldLimits, Idea, Violations};

use crate::prompts;

/// Second pipeline stage: expand each idea into a validated artifact.
///
/// Expansion is strictly sequential and order-preserving; a failed idea is
/// dropped and the batch continues.
pub struct ArtifactSynthesizer {
    client: Arc<GenerationClient>,
    max_repair_attempts: usize,
}

/// What came back from one parse-and-validate pass over a raw response.
pub(crate) enum ParseOutcome {
    Valid(Artifact),
    Invalid(Violations),
    UnknownType(String),
}

pub(crate) fn parse_and_validate(value: &serde_json::Value, limits: &FieldLimits) -> ParseOutcome {
    let tag = value
        .get("content_type")
        .and_then(|v| v.as_str())
        .unwrap_or_default();
    if ContentType::parse(tag).is_none() {
        return ParseOutcome::UnknownType(tag.to_string());
    }
    match serde_json::from_value::<Artifact>(value.clone()) {
        Err(err) => ParseOutcome::Invalid(Violations::single("schema", err.to_string())),
        Ok(artifact) => match artifact.validate(limits) {
            Ok(()) => ParseOutcome::Valid(artifact),
            Err(violations) => ParseOutcome::Invalid(violations),
        },
    }
}

impl ArtifactSynthesizer {
    pub fn new(client: Arc<GenerationClient>, max_repair_attempts: usize) -> Self {
        Self {
            client,
            max_repair_attempts,
        }
    }

    /// Ids are `{owner}_{seq:03}` with `seq` following idea order, so a
    /// dropped idea leaves a visible gap rather than renumbering the rest.
    pub async fn synthesize_all(
        &self,
        owner: &str,
        ideas: &[Idea],
        source_text: &str,
        style: &ContentStyle,
        limits: &FieldLimits,
    ) -> Vec<Artifact> {
        let mut artifacts = Vec::with_capacity(ideas.len());
        for (i, idea) in ideas.iter().enumerate() {
            let id = format!("{owner}_{:03}", i + 1);
            match self.synthesize_one(idea, source_text, style, limits).await {
                Some(mut artifact) => {
                    artifact.set_id(&id);
                    artifacts.push(artifact);
                }
                None => {
                    tracing::warn!(%id, title = %idea.title, "dropping idea after failed synthesis");
                }
            }
        }
        artifacts
    }

    async fn synthesize_one(
        &self,
        idea: &Idea,
        source_text: &str,
        style: &ContentStyle,
        limits: &FieldLimits,
    ) -> Option<Artifact> {
        let system = prompts::artifact_system(idea.content_type, limits, style);
        let user = prompts::artifact_user(idea, source_text);
        let mut value = self.client.generate(&system, &user).await?;

        let mut violations = match parse_and_validate(&value, limits) {
            ParseOutcome::Valid(artifact) => return Some(artifact),
            ParseOutcome::UnknownType(tag) => {
                tracing::warn!(%tag, "backend returned an unknown content type");
                return None;
            }
            ParseOutcome::Invalid(violations) => violations,
        };

        for attempt in 1..=self.max_repair_attempts {
            tracing::warn!(
                attempt,
                max = self.max_repair_attempts,
                "repairing invalid artifact: {}",
                violations.describe().replace('\n', "; ")
            );
            let repair = prompts::repair_user(idea, &value, &violations);
            let Some(repaired) = self.client.generate(&system, &repair).await else {
                continue;
            };
            match parse_and_validate(&repaired, limits) {
                ParseOutcome::Valid(artifact) => return Some(artifact),
                ParseOutcome::UnknownType(tag) => {
                    tracing::warn!(%tag, "repair switched to an unknown content type");
                    return None;
                }
                ParseOutcome::Invalid(next) => {
                    value = repaired;
                    violations = next;
                }
            }
        }
        None
    }
}
