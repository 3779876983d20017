pub mod artifacts;
pub mod config;
pub mod editor;
pub mod ideas;
pub mod indexer;
pub mod orchestrator;
pub mod pool;
mod prompts;

pub use artifacts::ArtifactSynthesizer;
pub use config::RecastConfig;
pub use editor::{changes_of, DiffEditor};
pub use ideas::IdeaSynthesizer;
pub use indexer::SourceIndexer;
pub use orchestrator::SessionOrchestrator;
pub use pool::GenerationPool;
