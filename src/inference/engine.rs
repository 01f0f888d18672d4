//! Engine boundary
//!
//! The gateway never talks to llama.cpp directly. Everything it needs from an
//! inference backend is expressed by the [`Engine`] and [`LoadedModel`] traits,
//! which keeps the registry and session logic testable with a scripted engine.

use std::ops::ControlFlow;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::inference::model::ModelError;

/// Errors raised by the inference engine
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    #[error("Failed to initialize backend: {0}")]
    BackendInit(String),

    #[error("Failed to load model: {0}")]
    ModelLoad(String),

    #[error("Failed to create context: {0}")]
    ContextCreate(String),

    #[error("Model validation failed: {0}")]
    ModelValidation(String),

    #[error("Tokenization failed: {0}")]
    Tokenization(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Worker thread error: {0}")]
    WorkerError(String),

    #[error("Capability query failed: {0}")]
    Capability(String),
}

impl From<ModelError> for EngineError {
    fn from(e: ModelError) -> Self {
        EngineError::ModelValidation(e.to_string())
    }
}

/// Number of GPU layers meaning "offload every layer"
pub const ALL_GPU_LAYERS: i32 = -1;

/// Parameters used to load a model into memory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadParams {
    /// Path to the model weights
    pub model_path: PathBuf,
    /// Context window size in tokens
    pub n_ctx: u32,
    /// Number of model parts (-1 = auto-detect)
    pub n_parts: i32,
    /// RNG seed for sampling
    pub seed: u32,
    /// Use half precision for the key/value cache
    pub f16_kv: bool,
    /// Layers to offload to the GPU (-1 = all)
    pub n_gpu_layers: i32,
}

impl LoadParams {
    /// Creates load parameters for `model_path` with default settings
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self {
            model_path: model_path.into(),
            ..Self::default()
        }
    }
}

impl Default for LoadParams {
    fn default() -> Self {
        Self {
            model_path: PathBuf::new(),
            n_ctx: 1024,
            n_parts: -1,
            seed: 42,
            f16_kv: false,
            n_gpu_layers: ALL_GPU_LAYERS,
        }
    }
}

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplingParams {
    /// Maximum number of tokens to generate
    pub max_tokens: u32,
    /// Temperature for sampling (0.0 = greedy, higher = more random)
    pub temperature: f32,
    /// Top-p (nucleus) sampling parameter
    pub top_p: f32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            max_tokens: 100,
            temperature: 0.8,
            top_p: 0.95,
        }
    }
}

/// A model loading and capability backend.
///
/// Implementations are shared across worker threads, so they must be `Send + Sync`.
/// The models they produce are not: a [`LoadedModel`] is created, used and
/// dropped on the worker thread that called [`Engine::load`].
pub trait Engine: Send + Sync {
    /// Loads model weights described by `params`.
    fn load(&self, params: &LoadParams) -> Result<Box<dyn LoadedModel>, EngineError>;

    /// Reports whether the runtime can offload layers to a GPU.
    fn supports_gpu_offload(&self) -> Result<bool, EngineError>;
}

/// A model resident in memory, able to stream generated text.
pub trait LoadedModel {
    /// Streams fragments of generated text for `prompt` into `on_fragment`.
    ///
    /// Once `on_fragment` returns [`ControlFlow::Break`] no further token is sampled
    /// and the call returns `Ok(())`.
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<(), EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_params_default() {
        let params = LoadParams::new("models/llama.gguf");
        assert_eq!(params.model_path, PathBuf::from("models/llama.gguf"));
        assert_eq!(params.n_ctx, 1024);
        assert_eq!(params.n_parts, -1);
        assert_eq!(params.seed, 42);
        assert!(!params.f16_kv);
        assert_eq!(params.n_gpu_layers, ALL_GPU_LAYERS);
    }

    #[test]
    fn test_sampling_params_default() {
        let params = SamplingParams::default();
        assert_eq!(params.max_tokens, 100);
        assert!((params.temperature - 0.8).abs() < 0.001);
        assert!((params.top_p - 0.95).abs() < 0.001);
    }

    #[test]
    fn test_model_error_conversion() {
        let err: EngineError = ModelError::FileTooSmall.into();
        assert!(matches!(err, EngineError::ModelValidation(_)));
    }
}
