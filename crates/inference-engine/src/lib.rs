//! Random Forest Inference Engine
//!
//! Loads tree-ensemble artifacts, holds the currently served model behind an
//! atomically swappable reference, and classifies water samples by majority
//! vote.

mod engine;
mod loader;
mod model;
mod state;
mod watcher;

pub use engine::{InferenceEngine, PredictionResult};
pub use loader::{ModelLoader, ARTIFACT_FORMAT_VERSION};
pub use model::{DecisionNode, Ensemble, Tree, MAX_TREE_DEPTH};
pub use state::{ModelDescriptor, ModelStatus, PublishedModel, ServingState};
pub use watcher::ModelWatcher;

use std::path::PathBuf;
use thiserror::Error;

/// Errors while loading a model artifact
#[derive(Debug, Clone, Error)]
pub enum LoadError {
    #[error("Model artifact not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("Model artifact is corrupt: {0}")]
    CorruptFormat(String),
    #[error("Model artifact violates schema: {0}")]
    SchemaMismatch(String),
}

impl LoadError {
    /// Short label used in metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            LoadError::NotFound(_) => "not_found",
            LoadError::CorruptFormat(_) => "corrupt_format",
            LoadError::SchemaMismatch(_) => "schema_mismatch",
        }
    }
}

/// Internal contract violations during inference.
///
/// A validated ensemble and a validated feature vector never produce these.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("Tree {tree}: feature index {feature} out of range for {len} features")]
    FeatureOutOfRange { tree: usize, feature: usize, len: usize },
    #[error("Tree {tree}: leaf class {class} not in the ensemble label set")]
    UnknownClass { tree: usize, class: u32 },
    #[error("Tree {tree}: traversal exceeded depth {depth}")]
    DepthExceeded { tree: usize, depth: usize },
}
