use std::sync::Arc;

use recast_provider::GenerationClient;
use recast_schema::{Artifact, ContentStyle, FieldLimits};

use crate::artifacts::{parse_and_validate, ParseOutcome};
use crate::prompts;

/// Single-artifact instruction editing plus a field-level change report.
pub struct DiffEditor {
    client: Arc<GenerationClient>,
}

impl DiffEditor {
    pub fn new(client: Arc<GenerationClient>) -> Self {
        Self { client }
    }

    /// One backend call, one validation pass, no repair loop. The edited
    /// artifact keeps the original's id.
    pub async fn edit(
        &self,
        original: &Artifact,
        instruction: &str,
        style: &ContentStyle,
        limits: &FieldLimits,
    ) -> Option<Artifact> {
        let original_value = match serde_json::to_value(original) {
            Ok(value) => value,
            Err(err) => {
                tracing::error!("failed to serialize artifact for editing: {err}");
                return None;
            }
        };

        let system = prompts::edit_system(original.content_type(), limits, style);
        let user = prompts::edit_user(&original_value, instruction);
        let value = self.client.generate(&system, &user).await?;

        match parse_and_validate(&value, limits) {
            ParseOutcome::Valid(mut edited) => {
                edited.set_id(original.id());
                Some(edited)
            }
            ParseOutcome::UnknownType(tag) => {
                tracing::warn!(%tag, "edit changed the content type, rejecting");
                None
            }
            ParseOutcome::Invalid(violations) => {
                tracing::warn!("edited artifact failed validation: {violations}");
                None
            }
        }
    }
}

/// Human-readable description of what an edit touched, computed over the
/// serialized forms. Slides are compared by count first, then per index.
pub fn changes_of(original: &Artifact, edited: &Artifact) -> Vec<String> {
    let (Ok(original), Ok(edited)) = (
        serde_json::to_value(original),
        serde_json::to_value(edited),
    ) else {
        return vec!["No changes detected".to_string()];
    };
    let (Some(original), Some(edited)) = (original.as_object(), edited.as_object()) else {
        return vec!["No changes detected".to_string()];
    };

    let mut changes = Vec::new();
    for (key, original_value) in original {
        let Some(edited_value) = edited.get(key) else {
            continue;
        };
        if original_value == edited_value {
            continue;
        }
        if key == "slides" {
            if let (Some(a), Some(b)) = (original_value.as_array(), edited_value.as_array()) {
                changes.extend(slide_changes(a, b));
                continue;
            }
        }
        changes.push(format!("'{key}' changed"));
    }
    for key in edited.keys() {
        if !original.contains_key(key) {
            changes.push(format!("Added new field '{key}'"));
        }
    }

    if changes.is_empty() {
        vec!["No changes detected".to_string()]
    } else {
        changes
    }
}

fn slide_changes(original: &[serde_json::Value], edited: &[serde_json::Value]) -> Vec<String> {
    if original.len() != edited.len() {
        return vec![format!(
            "Number of slides changed from {} to {}",
            original.len(),
            edited.len()
        )];
    }
    let mut changes = Vec::new();
    for (i, (a, b)) in original.iter().zip(edited).enumerate() {
        let (Some(a), Some(b)) = (a.as_object(), b.as_object()) else {
            continue;
        };
        for (key, value) in a {
            if b.get(key).is_some_and(|other| other != value) {
                changes.push(format!("Slide {} {key} changed", i + 1));
            }
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use recast_provider::{RateGate, TextCompleter};
    use recast_schema::{Carousel, Slide, Tweet};

    fn sample_tweet() -> Artifact {
        Artifact::Tweet(Tweet {
            id: "vid_003".to_string(),
            title: "Ship it".to_string(),
            text: "Cutting scope beats cutting corners.".to_string(),
            thread: vec![],
            hashtags: vec!["#shipit".to_string()],
        })
    }

    fn sample_carousel(slides: usize) -> Artifact {
        let slide = |i: usize| Slide {
            slide_no: i as u32,
            step_no: i as u32,
            heading: format!("Step {i}"),
            text: "Do the thing.".to_string(),
        };
        Artifact::Carousel(Carousel {
            id: "vid_004".to_string(),
            title: "Four steps".to_string(),
            caption: "save this".to_string(),
            slides: (1..=slides).map(slide).collect(),
            hashtags: vec![],
        })
    }

    #[test]
    fn identical_artifacts_report_no_changes() {
        let tweet = sample_tweet();
        assert_eq!(changes_of(&tweet, &tweet), vec!["No changes detected"]);
    }

    #[test]
    fn text_change_is_named_by_field() {
        let original = sample_tweet();
        let Artifact::Tweet(mut edited) = original.clone() else {
            unreachable!()
        };
        edited.text = "Scope is the only real deadline lever.".to_string();
        let changes = changes_of(&original, &Artifact::Tweet(edited));
        assert_eq!(changes, vec!["'text' changed"]);
    }

    #[test]
    fn slide_count_change_is_reported_as_one_entry() {
        let changes = changes_of(&sample_carousel(4), &sample_carousel(3));
        assert_eq!(changes, vec!["Number of slides changed from 4 to 3"]);
    }

    #[test]
    fn same_count_slide_edit_names_the_slide_and_field() {
        let original = sample_carousel(4);
        let Artifact::Carousel(mut edited) = original.clone() else {
            unreachable!()
        };
        edited.slides[1].heading = "Step two, renamed".to_string();
        let changes = changes_of(&original, &Artifact::Carousel(edited));
        assert_eq!(changes, vec!["Slide 2 heading changed"]);
    }

    struct FixedCompleter(String);

    #[async_trait]
    impl TextCompleter for FixedCompleter {
        async fn complete(&self, _system: &str, _user: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    fn editor_with(reply: serde_json::Value) -> DiffEditor {
        let client = Arc::new(GenerationClient::new(
            Arc::new(FixedCompleter(reply.to_string())),
            RateGate::new(100, 10_000),
        ));
        DiffEditor::new(client)
    }

    #[tokio::test]
    async fn edit_preserves_the_original_id() {
        let editor = editor_with(serde_json::json!({
            "content_type": "tweet",
            "title": "Ship it",
            "text": "Scope is the only real deadline lever."
        }));
        let edited = editor
            .edit(
                &sample_tweet(),
                "make the text punchier",
                &ContentStyle::default(),
                &FieldLimits::default(),
            )
            .await
            .unwrap();
        assert_eq!(edited.id(), "vid_003");
    }

    #[tokio::test]
    async fn invalid_edit_is_rejected_without_repair() {
        let editor = editor_with(serde_json::json!({
            "content_type": "tweet",
            "title": "Ship it",
            "text": "x".repeat(281)
        }));
        let edited = editor
            .edit(
                &sample_tweet(),
                "make it longer",
                &ContentStyle::default(),
                &FieldLimits::default(),
            )
            .await;
        assert!(edited.is_none());
    }
}
