use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Artifact;

/// How a generation session selects its background sources.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Vision,
    Single,
    Multiple,
    Auto,
    Hybrid,
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Vision => "vision",
            Self::Single => "single",
            Self::Multiple => "multiple",
            Self::Auto => "auto",
            Self::Hybrid => "hybrid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vision" => Some(Self::Vision),
            "single" => Some(Self::Single),
            "multiple" => Some(Self::Multiple),
            "auto" => Some(Self::Auto),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

/// Session lifecycle. Transitions are monotonic: pending -> processing ->
/// completed | failed, and the terminal states are final.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "processing" => Some(Self::Processing),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Discovery flavor for hybrid sessions. Carried through for reporting;
/// the discovery algorithm itself is the same for all three.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AugmentStrategy {
    #[default]
    Augment,
    Fill,
    Support,
}

impl AugmentStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Augment => "augment",
            Self::Fill => "fill",
            Self::Support => "support",
        }
    }
}

/// The caller-supplied inputs a session was started with, persisted verbatim.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInputs {
    #[serde(default)]
    pub vision: Option<String>,
    #[serde(default)]
    pub selected_source_ids: Vec<String>,
    #[serde(default)]
    pub requested_count: Option<usize>,
    #[serde(default)]
    pub augment_hint: Option<String>,
    #[serde(default)]
    pub augment_strategy: Option<AugmentStrategy>,
    #[serde(default)]
    pub augment_count: Option<usize>,
}

/// One generation request's persisted record: inputs, selected sources,
/// outputs, and lifecycle status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub mode: SessionMode,
    pub inputs: SessionInputs,
    #[serde(default)]
    pub matched_source_ids: Vec<String>,
    #[serde(default)]
    pub discovered_source_ids: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    pub status: SessionStatus,
    #[serde(default)]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Session {
    pub fn new(mode: SessionMode, inputs: SessionInputs) -> Self {
        Self {
            id: new_session_id(),
            mode,
            inputs,
            matched_source_ids: Vec::new(),
            discovered_source_ids: Vec::new(),
            artifacts: Vec::new(),
            status: SessionStatus::Pending,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

pub fn new_session_id() -> String {
    format!("sess_{}", &Uuid::new_v4().simple().to_string()[..12])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_is_pending_with_no_completion() {
        let session = Session::new(SessionMode::Vision, SessionInputs::default());
        assert_eq!(session.status, SessionStatus::Pending);
        assert!(session.completed_at.is_none());
        assert!(session.id.starts_with("sess_"));
    }

    #[test]
    fn terminal_states_are_exactly_completed_and_failed() {
        assert!(SessionStatus::Completed.is_terminal());
        assert!(SessionStatus::Failed.is_terminal());
        assert!(!SessionStatus::Pending.is_terminal());
        assert!(!SessionStatus::Processing.is_terminal());
    }

    #[test]
    fn mode_strings_round_trip() {
        for mode in [
            SessionMode::Vision,
            SessionMode::Single,
            SessionMode::Multiple,
            SessionMode::Auto,
            SessionMode::Hybrid,
        ] {
            assert_eq!(SessionMode::parse(mode.as_str()), Some(mode));
        }
    }
}
