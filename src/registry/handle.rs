//! Registry entries
//!
//! A [`ModelHandle`] is the registry's record of one loaded model: its id, the
//! parameters it was loaded with and the worker thread holding the weights.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::inference::engine::{LoadParams, SamplingParams};
use crate::inference::session::GenerationResult;
use crate::inference::worker::{GenerationError, ModelWorker};

pub struct ModelHandle {
    model_id: String,
    params: LoadParams,
    loaded_at: DateTime<Utc>,
    /// Insertion order within the registry
    seq: u64,
    worker: ModelWorker,
}

/// Snapshot of a loaded model for introspection
#[derive(Debug, Clone, Serialize)]
pub struct ModelSummary {
    pub model_id: String,
    #[serde(flatten)]
    pub params: LoadParams,
    pub loaded_at: DateTime<Utc>,
    pub pending_requests: usize,
}

impl ModelHandle {
    pub(crate) fn new(model_id: &str, params: LoadParams, seq: u64, worker: ModelWorker) -> Self {
        Self {
            model_id: model_id.to_string(),
            params,
            loaded_at: Utc::now(),
            seq,
            worker,
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    pub fn params(&self) -> &LoadParams {
        &self.params
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub(crate) fn seq(&self) -> u64 {
        self.seq
    }

    /// Runs a generation on this model.
    ///
    /// Generations on the same model are serialized in arrival order.
    pub async fn generate(
        &self,
        prompt: String,
        params: SamplingParams,
    ) -> Result<GenerationResult, GenerationError> {
        self.worker.generate(prompt, params).await
    }

    pub fn summary(&self) -> ModelSummary {
        ModelSummary {
            model_id: self.model_id.clone(),
            params: self.params.clone(),
            loaded_at: self.loaded_at,
            pending_requests: self.worker.pending_requests(),
        }
    }

    /// Releases the model once queued generations finished
    pub(crate) async fn shutdown(&self) {
        self.worker.shutdown().await;
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model_id", &self.model_id)
            .field("model_path", &self.params.model_path)
            .field("loaded_at", &self.loaded_at)
            .finish()
    }
}
