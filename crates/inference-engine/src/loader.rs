//! Model Artifact Loader

use crate::model::{Ensemble, Tree};
use crate::LoadError;
use data_validator::FEATURE_COUNT;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::io::{ErrorKind, Read};
use std::path::Path;
use tracing::{debug, info, warn};

/// Artifact layout version this loader understands
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// On-disk artifact, before structural validation
#[derive(Debug, Deserialize)]
struct RawArtifact {
    format_version: u32,
    n_features: usize,
    classes: Vec<u32>,
    trees: Vec<Tree>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Deserializes and validates ensemble artifacts
#[derive(Debug, Clone)]
pub struct ModelLoader {
    /// Labels every artifact must declare
    expected_classes: Vec<u32>,
}

impl ModelLoader {
    /// Loader for binary potability models (labels 0 and 1)
    pub fn new() -> Self {
        Self::with_classes(vec![0, 1])
    }

    /// Loader expecting a specific label set
    pub fn with_classes(mut expected_classes: Vec<u32>) -> Self {
        expected_classes.sort_unstable();
        expected_classes.dedup();
        Self { expected_classes }
    }

    pub fn expected_classes(&self) -> &[u32] {
        &self.expected_classes
    }

    /// Load an artifact from a file
    pub fn load<P: AsRef<Path>>(&self, path: P) -> Result<Ensemble, LoadError> {
        let path = path.as_ref();
        info!(path = %path.display(), "Loading model artifact");

        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
            _ => LoadError::CorruptFormat(format!("failed to read {}: {}", path.display(), e)),
        })?;

        let ensemble = self.load_from_slice(&bytes).inspect_err(|e| {
            warn!(path = %path.display(), error = %e, "Rejected model artifact");
        })?;

        info!(
            path = %path.display(),
            trees = ensemble.tree_count(),
            max_depth = ensemble.max_depth(),
            "Model artifact loaded"
        );
        Ok(ensemble)
    }

    /// Load an artifact from any reader
    pub fn load_from_reader<R: Read>(&self, mut reader: R) -> Result<Ensemble, LoadError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| LoadError::CorruptFormat(format!("failed to read artifact: {}", e)))?;
        self.load_from_slice(&bytes)
    }

    /// Load an artifact already in memory
    pub fn load_from_slice(&self, bytes: &[u8]) -> Result<Ensemble, LoadError> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Err(LoadError::CorruptFormat("artifact is empty".to_string()));
        }

        let raw: RawArtifact = serde_json::from_slice(bytes)
            .map_err(|e| LoadError::CorruptFormat(e.to_string()))?;
        debug!(
            version = raw.format_version,
            trees = raw.trees.len(),
            "Artifact deserialized"
        );

        self.validate(raw)
    }

    fn validate(&self, raw: RawArtifact) -> Result<Ensemble, LoadError> {
        if raw.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(LoadError::SchemaMismatch(format!(
                "unsupported format version {}, expected {}",
                raw.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if raw.n_features != FEATURE_COUNT {
            return Err(LoadError::SchemaMismatch(format!(
                "artifact declares {} features, expected {}",
                raw.n_features, FEATURE_COUNT
            )));
        }
        if raw.classes != self.expected_classes {
            return Err(LoadError::SchemaMismatch(format!(
                "artifact declares classes {:?}, expected {:?}",
                raw.classes, self.expected_classes
            )));
        }

        Ok(Ensemble::new(raw.classes, raw.trees)?.with_metadata(raw.metadata))
    }
}

impl Default for ModelLoader {
    fn default() -> Self {
        Self::new()
    }
}
