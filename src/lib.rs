//! llamagate
//!
//! An HTTP gateway that loads GGUF models through llama.cpp and serves chat
//! completions from them. Each loaded model runs on its own worker thread;
//! [`gateway::Gateway`] exposes the operations and [`server`] maps them to routes.

#[macro_use]
extern crate rocket;

pub mod app;
pub mod args;
pub mod error;
pub mod gateway;
pub mod inference;
pub mod logging;
pub mod registry;
pub mod server;
pub mod storage;
pub mod system;
pub mod types;

pub use error::{ErrorKind, GatewayError};
pub use gateway::Gateway;
