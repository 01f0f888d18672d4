//! llama.cpp engine
//!
//! [`Engine`] implementation backed by `llama-cpp-2`. One backend is shared by
//! every model in the process; each [`LlamaLoadedModel`] stays on the worker
//! thread that loaded it.

use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::sync::Arc;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel, Special};
use llama_cpp_2::sampling::LlamaSampler;

use crate::inference::engine::{Engine, EngineError, LoadParams, LoadedModel, SamplingParams};
use crate::inference::model::validate_gguf;

/// llama.cpp clamps this to the real layer count
const OFFLOAD_ALL_LAYERS: u32 = 999;

/// Below this temperature sampling is greedy
const GREEDY_TEMPERATURE: f32 = 0.01;

/// The process-wide llama.cpp engine
pub struct LlamaEngine {
    backend: Arc<LlamaBackend>,
}

impl LlamaEngine {
    /// Initializes the llama.cpp backend.
    ///
    /// The backend can only be initialized once per process.
    pub fn init() -> Result<Self, EngineError> {
        let backend = LlamaBackend::init().map_err(|e| EngineError::BackendInit(e.to_string()))?;
        tracing::info!("llama.cpp backend initialized");
        Ok(Self {
            backend: Arc::new(backend),
        })
    }
}

impl Engine for LlamaEngine {
    fn load(&self, params: &LoadParams) -> Result<Box<dyn LoadedModel>, EngineError> {
        let header = validate_gguf(&params.model_path)?;
        tracing::debug!(
            "GGUF v{} header ok for {:?} ({} tensors)",
            header.version,
            params.model_path,
            header.tensor_count
        );

        let n_ctx = NonZeroU32::new(params.n_ctx)
            .ok_or_else(|| EngineError::ContextCreate("context size must be positive".to_string()))?;
        if params.n_parts != -1 || params.f16_kv {
            tracing::debug!(
                n_parts = params.n_parts,
                f16_kv = params.f16_kv,
                "Legacy load options are recorded but not used by llama.cpp"
            );
        }

        let model_params = LlamaModelParams::default().with_n_gpu_layers(gpu_layers(params.n_gpu_layers));
        let model = LlamaModel::load_from_file(&self.backend, &params.model_path, &model_params)
            .map_err(|e| EngineError::ModelLoad(e.to_string()))?;

        tracing::info!(
            "Model loaded: {} ({} params, {} vocab, {} ctx trained, {} ctx used)",
            params.model_path.display(),
            model.n_params(),
            model.n_vocab(),
            model.n_ctx_train(),
            n_ctx
        );

        Ok(Box::new(LlamaLoadedModel {
            model,
            n_ctx,
            seed: params.seed,
            generations: 0,
            backend: Arc::clone(&self.backend),
        }))
    }

    fn supports_gpu_offload(&self) -> Result<bool, EngineError> {
        Ok(self.backend.supports_gpu_offload())
    }
}

/// A model resident in llama.cpp memory.
///
/// `model` is declared before `backend` so the weights are freed before the
/// last backend reference goes away.
pub struct LlamaLoadedModel {
    model: LlamaModel,
    n_ctx: NonZeroU32,
    seed: u32,
    generations: u32,
    backend: Arc<LlamaBackend>,
}

impl LoadedModel for LlamaLoadedModel {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<(), EngineError> {
        let n_ctx = self.n_ctx.get();
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(Some(self.n_ctx))
            .with_n_batch(n_ctx);

        // Fresh context per generation: no KV cache is shared between requests.
        let mut ctx = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| EngineError::ContextCreate(e.to_string()))?;

        let tokens = self
            .model
            .str_to_token(prompt, AddBos::Always)
            .map_err(|e| EngineError::Tokenization(e.to_string()))?;
        if tokens.is_empty() {
            return Err(EngineError::Tokenization("prompt produced no tokens".to_string()));
        }
        if tokens.len() >= n_ctx as usize {
            return Err(EngineError::Inference(format!(
                "prompt of {} tokens does not fit the {} token context window",
                tokens.len(),
                n_ctx
            )));
        }
        tracing::debug!("Tokenized prompt into {} tokens", tokens.len());

        let mut batch = LlamaBatch::new(n_ctx as usize, 1);
        let last = tokens.len() - 1;
        for (i, token) in tokens.iter().enumerate() {
            batch
                .add(*token, i as i32, &[0], i == last)
                .map_err(|e| EngineError::Inference(format!("Failed to add token to batch: {}", e)))?;
        }
        ctx.decode(&mut batch)
            .map_err(|e| EngineError::Inference(format!("Failed to decode prompt: {}", e)))?;

        let seed = self.seed.wrapping_add(self.generations);
        self.generations = self.generations.wrapping_add(1);
        let mut sampler = build_sampler(params, seed);

        let mut n_cur = tokens.len() as i32;
        let mut utf8_buffer: Vec<u8> = Vec::new();

        for _ in 0..params.max_tokens {
            if n_cur as u32 >= n_ctx {
                tracing::debug!("Context window full, ending generation");
                break;
            }

            let token = sampler.sample(&ctx, batch.n_tokens() - 1);
            sampler.accept(token);

            if self.model.is_eog_token(token) {
                tracing::debug!("End of generation token encountered");
                break;
            }

            let bytes = self
                .model
                .token_to_bytes(token, Special::Tokenize)
                .map_err(|e| EngineError::Inference(format!("Failed to convert token to bytes: {}", e)))?;
            utf8_buffer.extend_from_slice(&bytes);

            if let Some(fragment) = take_complete_utf8(&mut utf8_buffer) {
                if on_fragment(&fragment).is_break() {
                    return Ok(());
                }
            }

            batch.clear();
            batch
                .add(token, n_cur, &[0], true)
                .map_err(|e| EngineError::Inference(format!("Failed to add token to batch: {}", e)))?;
            ctx.decode(&mut batch)
                .map_err(|e| EngineError::Inference(format!("Failed to decode: {}", e)))?;
            n_cur += 1;
        }

        if !utf8_buffer.is_empty() {
            let tail = String::from_utf8_lossy(&utf8_buffer).into_owned();
            let _ = on_fragment(&tail);
        }

        Ok(())
    }
}

fn build_sampler(params: &SamplingParams, seed: u32) -> LlamaSampler {
    if params.temperature < GREEDY_TEMPERATURE {
        LlamaSampler::greedy()
    } else {
        LlamaSampler::chain_simple([
            LlamaSampler::top_p(params.top_p, 1),
            LlamaSampler::temp(params.temperature),
            LlamaSampler::dist(seed),
        ])
    }
}

fn gpu_layers(n_gpu_layers: i32) -> u32 {
    u32::try_from(n_gpu_layers).unwrap_or(OFFLOAD_ALL_LAYERS)
}

/// Takes the longest prefix of `buffer` that is complete UTF-8.
///
/// Bytes of a character still being spelled out by later tokens stay buffered.
/// Bytes that can never become valid UTF-8 are flushed lossily so the stream
/// does not stall.
fn take_complete_utf8(buffer: &mut Vec<u8>) -> Option<String> {
    let complete = match std::str::from_utf8(buffer) {
        Ok(_) => buffer.len(),
        Err(e) if e.error_len().is_some() => buffer.len(),
        Err(e) => e.valid_up_to(),
    };
    if complete == 0 {
        return None;
    }
    let rest = buffer.split_off(complete);
    let fragment = String::from_utf8_lossy(buffer).into_owned();
    *buffer = rest;
    Some(fragment)
}
