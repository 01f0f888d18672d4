//! Boundary request and response shapes
//!
//! Request fields are all optional so that a missing field is reported as a
//! missing parameter rather than a deserialization failure.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::inference::session::GenerationResult;
use crate::registry::ModelSummary;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoadModelRequest {
    pub model_id: Option<String>,
    pub model_path: Option<String>,
    pub n_ctx: Option<u32>,
    pub n_parts: Option<i32>,
    pub seed: Option<u32>,
    pub f16_kv: Option<bool>,
    pub n_gpu_layers: Option<i32>,
}

impl LoadModelRequest {
    pub fn new(model_id: impl Into<String>, model_path: impl Into<String>) -> Self {
        Self {
            model_id: Some(model_id.into()),
            model_path: Some(model_path.into()),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model_id: Option<String>,
    /// Raw messages, validated into a `Conversation`
    pub messages: Option<Vec<Value>>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UnloadModelRequest {
    pub model_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListFilesRequest {
    pub directory: Option<String>,
}

/// Acknowledgement of a state-changing operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub message: String,
    pub success: bool,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            success: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub generation_time: f64,
    pub total_tokens: u32,
    pub truncated: bool,
    pub success: bool,
}

impl From<GenerationResult> for ChatResponse {
    fn from(result: GenerationResult) -> Self {
        Self {
            response: result.response_text,
            generation_time: result.elapsed_seconds,
            total_tokens: result.token_count,
            truncated: result.truncated,
            success: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    pub healthy: bool,
    pub models: Vec<String>,
    pub gpu: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileListing {
    pub success: bool,
    pub files: Vec<FileEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelsReport {
    pub models: Vec<ModelSummary>,
}
