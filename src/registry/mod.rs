//! Model registry
//!
//! The authoritative table of loaded models. At most one model is loaded per
//! id; ids are case-sensitive. Loading happens outside the table lock, so a
//! slow load never blocks lookups or operations on other ids.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

use crate::inference::engine::{Engine, EngineError, LoadParams};
use crate::inference::worker::ModelWorker;

pub mod handle;

pub use handle::{ModelHandle, ModelSummary};

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Model with ID '{0}' is already loaded.")]
    DuplicateId(String),

    #[error("Model with ID '{0}' is not loaded.")]
    NotFound(String),

    #[error("Failed to load model '{model_id}': {source}")]
    Load {
        model_id: String,
        #[source]
        source: EngineError,
    },
}

#[derive(Default)]
struct RegistryState {
    entries: HashMap<String, Arc<ModelHandle>>,
    /// Ids reserved by loads or unloads still in progress
    loading: HashSet<String>,
    next_seq: u64,
}

pub struct ModelRegistry {
    engine: Arc<dyn Engine>,
    state: RwLock<RegistryState>,
}

impl ModelRegistry {
    pub fn new(engine: Arc<dyn Engine>) -> Self {
        Self {
            engine,
            state: RwLock::new(RegistryState::default()),
        }
    }

    pub fn engine(&self) -> &dyn Engine {
        self.engine.as_ref()
    }

    /// Loads a model under `model_id`.
    ///
    /// Fails with [`RegistryError::DuplicateId`] if the id is loaded or being loaded.
    /// A failed load leaves no trace in the registry.
    pub async fn load(
        &self,
        model_id: &str,
        params: LoadParams,
    ) -> Result<Arc<ModelHandle>, RegistryError> {
        {
            let mut state = self.write();
            if state.entries.contains_key(model_id) || !state.loading.insert(model_id.to_string())
            {
                return Err(RegistryError::DuplicateId(model_id.to_string()));
            }
        }
        let _reservation = Reservation {
            registry: self,
            model_id,
        };

        tracing::info!(%model_id, path = %params.model_path.display(), "Loading model");
        let worker = ModelWorker::start(Arc::clone(&self.engine), model_id, params.clone())
            .await
            .map_err(|source| RegistryError::Load {
                model_id: model_id.to_string(),
                source,
            })?;

        let handle = {
            let mut state = self.write();
            let seq = state.next_seq;
            state.next_seq += 1;
            let handle = Arc::new(ModelHandle::new(model_id, params, seq, worker));
            state.entries.insert(model_id.to_string(), Arc::clone(&handle));
            handle
        };
        tracing::info!(%model_id, "Model registered");
        Ok(handle)
    }

    /// Returns the handle for `model_id` if it is fully loaded
    pub fn lookup(&self, model_id: &str) -> Option<Arc<ModelHandle>> {
        self.read().entries.get(model_id).cloned()
    }

    /// Removes `model_id` and releases its weights.
    ///
    /// The id disappears from lookups immediately; the call returns once every
    /// generation accepted before it has finished and the model is freed. Until
    /// then the id stays reserved, so a load of the same id fails with
    /// [`RegistryError::DuplicateId`] instead of loading a second copy.
    pub async fn unload(&self, model_id: &str) -> Result<(), RegistryError> {
        let removed = {
            let mut state = self.write();
            let removed = state.entries.remove(model_id);
            if removed.is_some() {
                state.loading.insert(model_id.to_string());
            }
            removed
        };
        let handle = removed.ok_or_else(|| RegistryError::NotFound(model_id.to_string()))?;
        let _reservation = Reservation {
            registry: self,
            model_id,
        };

        tracing::info!(%model_id, pending = handle.summary().pending_requests, "Unloading model");
        handle.shutdown().await;
        tracing::info!(%model_id, "Model unloaded");
        Ok(())
    }

    /// Loaded model ids in load order
    pub fn list_ids(&self) -> Vec<String> {
        self.sorted_handles()
            .iter()
            .map(|h| h.model_id().to_string())
            .collect()
    }

    /// Details of every loaded model in load order
    pub fn summaries(&self) -> Vec<ModelSummary> {
        self.sorted_handles().iter().map(|h| h.summary()).collect()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Unloads every model. Used on process shutdown.
    pub async fn shutdown_all(&self) {
        let drained: Vec<Arc<ModelHandle>> = {
            let mut state = self.write();
            let mut handles: Vec<_> = state.entries.drain().map(|(_, h)| h).collect();
            for handle in &handles {
                state.loading.insert(handle.model_id().to_string());
            }
            handles.sort_by_key(|h| h.seq());
            handles
        };
        for handle in drained {
            let _reservation = Reservation {
                registry: self,
                model_id: handle.model_id(),
            };
            tracing::info!(model_id = %handle.model_id(), "Unloading model for shutdown");
            handle.shutdown().await;
        }
    }

    fn sorted_handles(&self) -> Vec<Arc<ModelHandle>> {
        let mut handles: Vec<_> = self.read().entries.values().cloned().collect();
        handles.sort_by_key(|h| h.seq());
        handles
    }

    fn read(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases an id reservation however the load or unload ends
struct Reservation<'a> {
    registry: &'a ModelRegistry,
    model_id: &'a str,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        self.registry.write().loading.remove(self.model_id);
    }
}
