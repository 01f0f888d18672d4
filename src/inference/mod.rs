//! LLM inference
//!
//! The engine boundary, the llama.cpp backend, per-model worker threads and the
//! pieces of a chat generation: prompt formatting, stop tags and sessions.

pub mod engine;
pub mod llama;
pub mod model;
pub mod prompt;
pub mod session;
pub mod stop_tags;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

// Re-export main types for convenience
pub use engine::{Engine, EngineError, LoadParams, LoadedModel, SamplingParams};
pub use llama::LlamaEngine;
pub use model::{validate_gguf, GgufHeader, ModelError, GGUF_MAGIC};
pub use prompt::format_prompt;
pub use session::GenerationResult;
pub use stop_tags::{StopMatch, StopTagDetector, STOP_TAGS};
pub use worker::{GenerationError, ModelWorker};
