//! Hot-Swappable Serving State

use crate::loader::ModelLoader;
use crate::model::Ensemble;
use crate::LoadError;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{error, info, warn};

/// Readiness of the serving state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    /// Nothing has been loaded yet
    #[default]
    Uninitialized,
    /// A load is in progress
    Loading,
    /// A model is published and the last load succeeded
    Ready,
    /// No model was ever published and the last load failed
    LoadFailed,
    /// A reload failed; the previously published model is still served
    Degraded,
}

impl ModelStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelStatus::Uninitialized => "uninitialized",
            ModelStatus::Loading => "loading",
            ModelStatus::Ready => "ready",
            ModelStatus::LoadFailed => "load_failed",
            ModelStatus::Degraded => "degraded",
        }
    }
}

/// Identity of a published model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelDescriptor {
    /// Artifact path or other identifier
    pub source: String,
    /// Increments with every successful publish
    pub generation: u64,
    pub tree_count: usize,
    pub max_depth: usize,
    pub loaded_at: DateTime<Utc>,
    pub metadata: BTreeMap<String, String>,
}

/// An ensemble together with its descriptor, shared read-only with requests
#[derive(Debug)]
pub struct PublishedModel {
    pub ensemble: Ensemble,
    pub descriptor: ModelDescriptor,
}

#[derive(Debug, Default)]
struct Inner {
    status: ModelStatus,
    current: Option<Arc<PublishedModel>>,
    generation: u64,
    last_error: Option<LoadError>,
}

/// Process-wide holder of the currently served model.
///
/// Readers clone the `Arc` under a short read lock and then classify without
/// holding any lock. Publishing swaps the `Arc` under the write lock, so a
/// reader sees either the old or the new model in full. A superseded model is
/// dropped when its last in-flight reader releases it.
#[derive(Debug, Default)]
pub struct ServingState {
    inner: RwLock<Inner>,
    /// Serialises reloads
    reload_lock: Mutex<()>,
}

impl ServingState {
    /// Create an empty state
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_reload(&self) -> MutexGuard<'_, ()> {
        self.reload_lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn status(&self) -> ModelStatus {
        self.read().status
    }

    /// Whether predictions can be answered right now.
    ///
    /// A reload in progress keeps serving the previously published model.
    pub fn is_serving(&self) -> bool {
        let inner = self.read();
        match inner.status {
            ModelStatus::Ready | ModelStatus::Degraded => true,
            ModelStatus::Loading => inner.current.is_some(),
            ModelStatus::Uninitialized | ModelStatus::LoadFailed => false,
        }
    }

    /// Borrow the published model for the duration of one request
    pub fn current(&self) -> Option<Arc<PublishedModel>> {
        self.read().current.clone()
    }

    pub fn descriptor(&self) -> Option<ModelDescriptor> {
        self.read().current.as_ref().map(|m| m.descriptor.clone())
    }

    /// Most recent load failure, cleared by the next successful publish
    pub fn last_error(&self) -> Option<LoadError> {
        self.read().last_error.clone()
    }

    /// Enter `Loading`
    pub fn begin_load(&self) {
        let mut inner = self.write();
        info!(from = inner.status.as_str(), "Model load started");
        inner.status = ModelStatus::Loading;
    }

    /// Publish a fully validated ensemble and enter `Ready`
    pub fn publish(&self, ensemble: Ensemble, source: impl Into<String>) -> ModelDescriptor {
        // Walks every tree; keep it outside the write lock
        let mut descriptor = ModelDescriptor {
            source: source.into(),
            generation: 0,
            tree_count: ensemble.tree_count(),
            max_depth: ensemble.max_depth(),
            loaded_at: Utc::now(),
            metadata: ensemble.metadata().clone(),
        };

        let mut inner = self.write();
        let generation = inner.generation + 1;
        descriptor.generation = generation;
        inner.current = Some(Arc::new(PublishedModel {
            ensemble,
            descriptor: descriptor.clone(),
        }));
        inner.generation = generation;
        inner.status = ModelStatus::Ready;
        inner.last_error = None;
        drop(inner);

        metrics::counter!("potability_model_loads_total", "outcome" => "success").increment(1);
        metrics::gauge!("potability_model_generation").set(generation as f64);
        info!(
            source = %descriptor.source,
            generation,
            trees = descriptor.tree_count,
            "Model published"
        );
        descriptor
    }

    /// Record a failed load.
    ///
    /// With a model already published this enters `Degraded` and keeps
    /// serving it; otherwise `LoadFailed`.
    pub fn fail(&self, err: LoadError) {
        let mut inner = self.write();
        inner.status = if inner.current.is_some() {
            warn!(error = %err, "Model reload failed, keeping previous model");
            ModelStatus::Degraded
        } else {
            error!(error = %err, "Model load failed, no model available");
            ModelStatus::LoadFailed
        };
        metrics::counter!("potability_model_loads_total", "outcome" => err.kind()).increment(1);
        inner.last_error = Some(err);
    }

    /// Load an artifact off to the side and publish it on success.
    ///
    /// Failures are absorbed into the state and also returned so an operator
    /// trigger can report them.
    pub fn reload<P: AsRef<Path>>(
        &self,
        loader: &ModelLoader,
        path: P,
    ) -> Result<ModelDescriptor, LoadError> {
        let _guard = self.lock_reload();
        let path = path.as_ref();

        self.begin_load();
        match loader.load(path) {
            Ok(ensemble) => Ok(self.publish(ensemble, path.display().to_string())),
            Err(e) => {
                self.fail(e.clone());
                Err(e)
            }
        }
    }
}
