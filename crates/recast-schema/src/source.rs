use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where a background source's text came from. Extraction happens upstream;
/// by the time a source exists its content is plain UTF-8 text.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Youtube,
    Document,
    Text,
    Url,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Document => "document",
            Self::Text => "text",
            Self::Url => "url",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "youtube" => Some(Self::Youtube),
            "document" => Some(Self::Document),
            "text" => Some(Self::Text),
            "url" => Some(Self::Url),
            _ => None,
        }
    }
}

/// A stored piece of background material the matcher can rank and the
/// orchestrator can feed into generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    pub source_type: SourceType,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub use_count: i64,
    #[serde(default)]
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Source {
    pub fn new(
        source_type: SourceType,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: new_source_id(),
            source_type,
            title: title.into(),
            content: content.into(),
            summary: None,
            topics: Vec::new(),
            tags: Vec::new(),
            use_count: 0,
            last_used_at: None,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn new_source_id() -> String {
    format!("src_{}", &Uuid::new_v4().simple().to_string()[..12])
}

/// Structural filters applied before relevance scoring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceFilters {
    #[serde(default)]
    pub source_types: Vec<SourceType>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub topics: Vec<String>,
}
