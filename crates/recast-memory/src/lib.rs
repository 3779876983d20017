pub mod matcher;
pub mod migrations;
pub mod store;

pub use matcher::{RelevanceMatcher, ScoredSource};
pub use store::{KnowledgeStore, SourceUpdate};
