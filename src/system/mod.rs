//! Runtime environment introspection

pub mod gpu;

pub use gpu::supports_gpu_offload;
