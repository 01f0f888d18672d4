//! Boundary operations
//!
//! [`Gateway`] implements every operation the server exposes, independent of
//! HTTP. Requests are validated completely before the registry or the engine
//! is touched.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::Instrument;
use uuid::Uuid;

use crate::error::GatewayError;
use crate::inference::engine::{Engine, LoadParams, SamplingParams};
use crate::inference::prompt::format_prompt;
use crate::inference::session::GenerationResult;
use crate::inference::worker::GenerationError;
use crate::registry::{ModelRegistry, ModelSummary, RegistryError};
use crate::storage::files;
use crate::storage::settings::{GatewaySettings, LoadDefaults};
use crate::storage::StorageError;
use crate::system::gpu;
use crate::types::message::Conversation;
use crate::types::requests::{
    Ack, ChatRequest, FileEntry, ListFilesRequest, LoadModelRequest, StatusReport,
    UnloadModelRequest,
};

pub struct Gateway {
    registry: ModelRegistry,
    load_defaults: LoadDefaults,
    generation_defaults: SamplingParams,
}

impl Gateway {
    pub fn new(engine: Arc<dyn Engine>, settings: &GatewaySettings) -> Self {
        Self {
            registry: ModelRegistry::new(engine),
            load_defaults: settings.load_defaults.clone(),
            generation_defaults: settings.generation_defaults,
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Loads a model under a new id
    pub async fn load_model(&self, request: LoadModelRequest) -> Result<Ack, GatewayError> {
        let (model_id, model_path) = match (
            non_empty(request.model_id),
            non_empty(request.model_path),
        ) {
            (Some(id), Some(path)) => (id, path),
            _ => return Err(GatewayError::MissingParam(vec!["model_id", "model_path"])),
        };

        let defaults = &self.load_defaults;
        let params = LoadParams {
            model_path: PathBuf::from(&model_path),
            n_ctx: request.n_ctx.unwrap_or(defaults.n_ctx),
            n_parts: request.n_parts.unwrap_or(defaults.n_parts),
            seed: request.seed.unwrap_or(defaults.seed),
            f16_kv: request.f16_kv.unwrap_or(defaults.f16_kv),
            n_gpu_layers: request.n_gpu_layers.unwrap_or(defaults.n_gpu_layers),
        };
        if params.n_ctx == 0 {
            return Err(GatewayError::invalid_parameter(
                "n_ctx",
                "must be a positive integer",
            ));
        }

        self.registry
            .load(&model_id, params)
            .await
            .map_err(|e| match e {
                RegistryError::DuplicateId(id) => GatewayError::DuplicateId(id),
                RegistryError::NotFound(id) => GatewayError::NotLoaded(id),
                RegistryError::Load { model_id, source } => {
                    GatewayError::EngineLoadFailure { model_id, source }
                }
            })?;

        Ok(Ack::ok(format!(
            "Model '{model_id}' loaded successfully from {model_path}."
        )))
    }

    /// Generates the assistant's reply to a conversation
    pub async fn chat(&self, request: ChatRequest) -> Result<GenerationResult, GatewayError> {
        let model_id = non_empty(request.model_id);
        let messages = request.messages.filter(|m| !m.is_empty());
        let (Some(model_id), Some(messages)) = (model_id, messages) else {
            return Err(GatewayError::MissingParam(vec!["model_id", "messages"]));
        };

        let conversation = Conversation::from_values(&messages)?;
        let params = self.sampling_params(request.max_tokens, request.temperature, request.top_p)?;

        let handle = self
            .registry
            .lookup(&model_id)
            .ok_or_else(|| GatewayError::ModelNotFound(model_id.clone()))?;

        let prompt = format_prompt(&conversation);
        let span = tracing::info_span!("chat", request_id = %Uuid::new_v4(), %model_id);

        async {
            tracing::debug!(
                messages = conversation.len(),
                prompt_len = prompt.len(),
                "Starting generation"
            );
            let result = handle.generate(prompt, params).await.map_err(|e| match e {
                GenerationError::Unloaded(id) => GatewayError::ModelNotFound(id),
                GenerationError::Engine(source) => GatewayError::GenerationFailure {
                    model_id: model_id.clone(),
                    source,
                },
            })?;
            tracing::info!(
                tokens = result.token_count,
                seconds = result.elapsed_seconds,
                truncated = result.truncated,
                "Chat completed"
            );
            Ok(result)
        }
        .instrument(span)
        .await
    }

    /// Unloads a model, waiting for its in-flight generations
    pub async fn unload_model(&self, request: UnloadModelRequest) -> Result<Ack, GatewayError> {
        let model_id =
            non_empty(request.model_id).ok_or(GatewayError::MissingParam(vec!["model_id"]))?;

        self.registry
            .unload(&model_id)
            .await
            .map_err(|_| GatewayError::NotLoaded(model_id.clone()))?;

        Ok(Ack::ok(format!(
            "Model '{model_id}' has been unloaded successfully."
        )))
    }

    /// Health, loaded ids and GPU capability. Never fails.
    pub fn status(&self) -> StatusReport {
        StatusReport {
            healthy: true,
            models: self.registry.list_ids(),
            gpu: gpu::supports_gpu_offload(self.registry.engine()),
        }
    }

    /// Details of every loaded model
    pub fn models(&self) -> Vec<ModelSummary> {
        self.registry.summaries()
    }

    /// Lists regular files of a directory
    pub async fn list_files(
        &self,
        request: ListFilesRequest,
    ) -> Result<Vec<FileEntry>, GatewayError> {
        let directory =
            non_empty(request.directory).ok_or(GatewayError::MissingParam(vec!["directory"]))?;

        let listing = tokio::task::spawn_blocking(move || files::list_files(Path::new(&directory)))
            .await
            .map_err(|e| GatewayError::Io(std::io::Error::other(e.to_string())))?;

        listing.map_err(|e| match e {
            StorageError::DirectoryNotFound(path) => GatewayError::DirectoryNotFound(path),
            StorageError::NotADirectory(path) => GatewayError::NotADirectory(path),
            StorageError::ReadError(io) => GatewayError::Io(io),
            other => GatewayError::Io(std::io::Error::other(other.to_string())),
        })
    }

    /// Unloads every model
    pub async fn shutdown(&self) {
        self.registry.shutdown_all().await;
    }

    fn sampling_params(
        &self,
        max_tokens: Option<u32>,
        temperature: Option<f32>,
        top_p: Option<f32>,
    ) -> Result<SamplingParams, GatewayError> {
        let defaults = self.generation_defaults;
        let params = SamplingParams {
            max_tokens: max_tokens.unwrap_or(defaults.max_tokens),
            temperature: temperature.unwrap_or(defaults.temperature),
            top_p: top_p.unwrap_or(defaults.top_p),
        };

        if params.max_tokens == 0 {
            return Err(GatewayError::invalid_parameter(
                "max_tokens",
                "must be a positive integer",
            ));
        }
        if !params.temperature.is_finite() || params.temperature < 0.0 {
            return Err(GatewayError::invalid_parameter(
                "temperature",
                "must be a non-negative number",
            ));
        }
        if !(0.0..=1.0).contains(&params.top_p) {
            return Err(GatewayError::invalid_parameter("top_p", "must be between 0 and 1"));
        }
        Ok(params)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}
