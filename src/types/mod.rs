//! Shared data types

pub mod message;
pub mod requests;

pub use message::{Conversation, ConversationError, Message, Role};
pub use requests::{
    Ack, ChatRequest, ChatResponse, FileEntry, FileListing, ListFilesRequest, LoadModelRequest,
    ModelsReport, StatusReport, UnloadModelRequest,
};
