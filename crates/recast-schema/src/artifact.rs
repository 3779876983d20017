use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{ContentType, FieldLimits};

/// A fully-typed, schema-validated content piece.
///
/// The discriminator lives on the wire as `content_type`; a value of this
/// type only exists after [`Artifact::validate`] has passed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Artifact {
    Reel(Reel),
    Carousel(Carousel),
    Tweet(Tweet),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Reel {
    /// Assigned programmatically after generation, never by the backend.
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub caption: String,
    pub hook: String,
    pub body: String,
    #[serde(default)]
    pub visual_hints: Option<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Carousel {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub caption: String,
    pub slides: Vec<Slide>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Slide {
    pub slide_no: u32,
    pub step_no: u32,
    pub heading: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tweet {
    #[serde(default)]
    pub id: String,
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub thread: Vec<String>,
    #[serde(default)]
    pub hashtags: Vec<String>,
}

impl Artifact {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Reel(_) => ContentType::Reel,
            Self::Carousel(_) => ContentType::Carousel,
            Self::Tweet(_) => ContentType::Tweet,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Reel(r) => &r.id,
            Self::Carousel(c) => &c.id,
            Self::Tweet(t) => &t.id,
        }
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        let id = id.into();
        match self {
            Self::Reel(r) => r.id = id,
            Self::Carousel(c) => c.id = id,
            Self::Tweet(t) => t.id = id,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Self::Reel(r) => &r.title,
            Self::Carousel(c) => &c.title,
            Self::Tweet(t) => &t.title,
        }
    }

    /// Check every length and shape bound against `limits`.
    ///
    /// Violations are collected rather than short-circuited so the repair
    /// prompt can list all of them at once.
    pub fn validate(&self, limits: &FieldLimits) -> Result<(), Violations> {
        let mut items = Vec::new();
        check_len(&mut items, "title", self.title(), limits.title_max);

        match self {
            Self::Reel(reel) => {
                check_len(&mut items, "caption", &reel.caption, limits.caption_max);
                check_required(&mut items, "hook", &reel.hook);
                check_required(&mut items, "body", &reel.body);
            }
            Self::Carousel(carousel) => {
                check_len(&mut items, "caption", &carousel.caption, limits.caption_max);
                let count = carousel.slides.len();
                if count < limits.min_slides || count > limits.max_slides {
                    items.push(Violation {
                        field: "slides".to_string(),
                        reason: format!(
                            "slide count {count} outside allowed range {}..={}",
                            limits.min_slides, limits.max_slides
                        ),
                    });
                }
                for (i, slide) in carousel.slides.iter().enumerate() {
                    check_len(
                        &mut items,
                        &format!("slides[{i}].heading"),
                        &slide.heading,
                        limits.heading_max,
                    );
                    check_len(
                        &mut items,
                        &format!("slides[{i}].text"),
                        &slide.text,
                        limits.slide_text_max,
                    );
                }
            }
            Self::Tweet(tweet) => {
                check_required(&mut items, "text", &tweet.text);
                check_len(&mut items, "text", &tweet.text, limits.tweet_max);
                for (i, entry) in tweet.thread.iter().enumerate() {
                    check_len(&mut items, &format!("thread[{i}]"), entry, limits.tweet_max);
                }
            }
        }

        if items.is_empty() {
            Ok(())
        } else {
            Err(Violations { items })
        }
    }
}

fn check_len(items: &mut Vec<Violation>, field: &str, value: &str, max: usize) {
    let len = value.chars().count();
    if len > max {
        items.push(Violation {
            field: field.to_string(),
            reason: format!("{len} chars exceeds maximum of {max}"),
        });
    }
}

fn check_required(items: &mut Vec<Violation>, field: &str, value: &str) {
    if value.trim().is_empty() {
        items.push(Violation {
            field: field.to_string(),
            reason: "required field is empty".to_string(),
        });
    }
}

/// One failed constraint on a generated artifact.
#[derive(Debug, Clone, Serialize, Error)]
#[error("field '{field}': {reason}")]
pub struct Violation {
    pub field: String,
    pub reason: String,
}

/// The full set of constraints an artifact violated, formatted for the
/// repair prompt.
#[derive(Debug, Clone, Error)]
#[error("artifact validation failed: {}", .items.iter().map(|v| v.to_string()).collect::<Vec<_>>().join("; "))]
pub struct Violations {
    pub items: Vec<Violation>,
}

impl Violations {
    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            items: vec![Violation {
                field: field.into(),
                reason: reason.into(),
            }],
        }
    }

    /// One violation per line, as embedded into repair prompts.
    pub fn describe(&self) -> String {
        self.items
            .iter()
            .map(|v| format!("- {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
