//! Gateway errors
//!
//! Every failure a boundary operation can report, grouped into the classes the
//! transport maps to responses.

use std::error::Error as _;
use std::path::PathBuf;

use thiserror::Error;

use crate::inference::engine::EngineError;
use crate::types::message::ConversationError;

/// Error classes of the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or malformed request fields; nothing was touched
    Validation,
    /// The request conflicts with current state
    Conflict,
    /// An unknown model or a missing directory
    NotFound,
    /// The inference engine failed
    Engine,
    /// Anything else, such as I/O failures
    Internal,
}

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("No input data provided.")]
    NoInput,

    #[error("Missing required parameters: {}.", quoted(.0))]
    MissingParam(Vec<&'static str>),

    #[error(transparent)]
    InvalidMessage(ConversationError),

    #[error(transparent)]
    InvalidRole(ConversationError),

    #[error("Invalid parameter '{name}': {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Model with ID '{0}' is already loaded.")]
    DuplicateId(String),

    #[error("No loaded model found for model_id '{0}'.")]
    ModelNotFound(String),

    #[error("Model with ID '{0}' is not loaded.")]
    NotLoaded(String),

    #[error("Directory '{}' does not exist.", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("'{}' is not a directory.", .0.display())]
    NotADirectory(PathBuf),

    #[error("Failed to load model '{model_id}': {source}")]
    EngineLoadFailure {
        model_id: String,
        #[source]
        source: EngineError,
    },

    #[error("Chat completion failed for model '{model_id}': {source}")]
    GenerationFailure {
        model_id: String,
        #[source]
        source: EngineError,
    },

    #[error("Failed to list files: {0}")]
    Io(#[source] std::io::Error),
}

impl GatewayError {
    pub fn invalid_parameter(name: impl Into<String>, reason: impl Into<String>) -> Self {
        GatewayError::InvalidParameter {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GatewayError::NoInput
            | GatewayError::MissingParam(_)
            | GatewayError::InvalidMessage(_)
            | GatewayError::InvalidRole(_)
            | GatewayError::InvalidParameter { .. }
            | GatewayError::NotADirectory(_) => ErrorKind::Validation,
            GatewayError::DuplicateId(_) => ErrorKind::Conflict,
            GatewayError::ModelNotFound(_)
            | GatewayError::NotLoaded(_)
            | GatewayError::DirectoryNotFound(_) => ErrorKind::NotFound,
            GatewayError::EngineLoadFailure { .. } | GatewayError::GenerationFailure { .. } => {
                ErrorKind::Engine
            }
            GatewayError::Io(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::NoInput => "no_input",
            GatewayError::MissingParam(_) => "missing_param",
            GatewayError::InvalidMessage(_) => "invalid_message",
            GatewayError::InvalidRole(_) => "invalid_role",
            GatewayError::InvalidParameter { .. } => "invalid_parameter",
            GatewayError::DuplicateId(_) => "duplicate_id",
            GatewayError::ModelNotFound(_) => "model_not_found",
            GatewayError::NotLoaded(_) => "not_found",
            GatewayError::DirectoryNotFound(_) => "not_exist",
            GatewayError::NotADirectory(_) => "not_a_directory",
            GatewayError::EngineLoadFailure { .. } => "engine_load_failure",
            GatewayError::GenerationFailure { .. } => "generation_failure",
            GatewayError::Io(_) => "io_error",
        }
    }

    /// Messages of the underlying causes, outermost first
    pub fn diagnostic_trace(&self) -> Vec<String> {
        let mut trace = Vec::new();
        let mut source = self.source();
        while let Some(cause) = source {
            trace.push(cause.to_string());
            source = cause.source();
        }
        trace
    }
}

impl From<ConversationError> for GatewayError {
    fn from(e: ConversationError) -> Self {
        match e {
            ConversationError::InvalidMessage { .. } => GatewayError::InvalidMessage(e),
            ConversationError::InvalidRole { .. } => GatewayError::InvalidRole(e),
        }
    }
}

fn quoted(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(" and ")
}
