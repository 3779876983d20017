use serde::{Deserialize, Serialize};

fn default_title_max() -> usize {
    100
}

fn default_caption_max() -> usize {
    300
}

fn default_tweet_max() -> usize {
    280
}

fn default_heading_max() -> usize {
    100
}

fn default_slide_text_max() -> usize {
    300
}

fn default_min_slides() -> usize {
    4
}

fn default_max_slides() -> usize {
    10
}

/// Per-field length bounds enforced on generated artifacts.
///
/// A value of this is threaded explicitly through every synthesis call;
/// there is no process-wide mutable default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldLimits {
    #[serde(default = "default_title_max")]
    pub title_max: usize,
    #[serde(default = "default_caption_max")]
    pub caption_max: usize,
    #[serde(default = "default_tweet_max")]
    pub tweet_max: usize,
    #[serde(default = "default_heading_max")]
    pub heading_max: usize,
    #[serde(default = "default_slide_text_max")]
    pub slide_text_max: usize,
    #[serde(default = "default_min_slides")]
    pub min_slides: usize,
    #[serde(default = "default_max_slides")]
    pub max_slides: usize,
}

impl Default for FieldLimits {
    fn default() -> Self {
        Self {
            title_max: default_title_max(),
            caption_max: default_caption_max(),
            tweet_max: default_tweet_max(),
            heading_max: default_heading_max(),
            slide_text_max: default_slide_text_max(),
            min_slides: default_min_slides(),
            max_slides: default_max_slides(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_platform_constraints() {
        let limits = FieldLimits::default();
        assert_eq!(limits.caption_max, 300);
        assert_eq!(limits.tweet_max, 280);
        assert_eq!(limits.min_slides, 4);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let limits: FieldLimits = serde_json::from_str(r#"{"min_slides": 3}"#).unwrap();
        assert_eq!(limits.min_slides, 3);
        assert_eq!(limits.max_slides, 10);
        assert_eq!(limits.title_max, 100);
    }
}
