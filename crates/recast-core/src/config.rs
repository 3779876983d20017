use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use recast_schema::FieldLimits;

fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}

fn default_requests_per_minute() -> usize {
    10
}

fn default_requests_per_day() -> usize {
    1500
}

fn default_max_repair_attempts() -> usize {
    2
}

fn default_max_concurrent_sessions() -> usize {
    3
}

fn default_min_ideas() -> usize {
    5
}

fn default_max_ideas() -> usize {
    10
}

/// Tunables threaded through every constructor. Loadable from YAML; every
/// field falls back to a working default so an empty file is a valid config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecastConfig {
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: usize,
    #[serde(default = "default_requests_per_day")]
    pub requests_per_day: usize,
    #[serde(default)]
    pub limits: FieldLimits,
    #[serde(default = "default_max_repair_attempts")]
    pub max_repair_attempts: usize,
    #[serde(default = "default_max_concurrent_sessions")]
    pub max_concurrent_sessions: usize,
    #[serde(default = "default_min_ideas")]
    pub min_ideas: usize,
    #[serde(default = "default_max_ideas")]
    pub max_ideas: usize,
}

impl Default for RecastConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            requests_per_minute: default_requests_per_minute(),
            requests_per_day: default_requests_per_day(),
            limits: FieldLimits::default(),
            max_repair_attempts: default_max_repair_attempts(),
            max_concurrent_sessions: default_max_concurrent_sessions(),
            min_ideas: default_min_ideas(),
            max_ideas: default_max_ideas(),
        }
    }
}

impl RecastConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        Ok(config)
    }
}
