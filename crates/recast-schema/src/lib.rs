pub mod artifact;
pub mod limits;
pub mod session;
pub mod source;
pub mod style;

pub use artifact::*;
pub use limits::*;
pub use session::*;
pub use source::*;
pub use style::*;

use serde::{Deserialize, Serialize};

/// The three artifact families the pipeline can produce.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Reel,
    Carousel,
    Tweet,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reel => "reel",
            Self::Carousel => "carousel",
            Self::Tweet => "tweet",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "reel" => Some(Self::Reel),
            "carousel" => Some(Self::Carousel),
            "tweet" => Some(Self::Tweet),
            _ => None,
        }
    }
}

impl std::fmt::Display for ContentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lightweight content angle produced by the idea stage, consumed once by
/// the artifact stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Idea {
    pub content_type: ContentType,
    pub title: String,
    /// Direct quote from the source text that motivated the idea.
    pub snippet: String,
    /// Free-form per-type suggestions passed through to the artifact prompt.
    #[serde(default)]
    pub type_hints: serde_json::Map<String, serde_json::Value>,
}
