// Acquisition layer: error taxonomy, models, provider traits and their backends

pub mod backends;
pub mod diagnostics;
pub mod errors;
pub mod models;
pub mod orchestrator;
pub mod tools;
pub mod traits;
pub mod utils;

pub use errors::AcquireError;
pub use models::{AcquiredArtifact, FileReport, MediaFile, MovieIdentity, NetworkConfig, Session};
pub use orchestrator::Pipeline;
pub use traits::{MetadataProvider, SubtitleProvider, VideoFetcher};
