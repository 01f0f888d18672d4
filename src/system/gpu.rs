//! GPU capability detection
//!
//! Reports whether the inference runtime can offload layers to a GPU. This is a
//! global property of the runtime, independent of any loaded model.

use std::panic::{self, AssertUnwindSafe};

use crate::inference::engine::Engine;

/// Asks `engine` whether GPU offload is available.
///
/// Never fails: when the capability cannot be determined (the engine reports an
/// error or panics in its native layer) the answer degrades to `false` and the
/// reason is logged.
pub fn supports_gpu_offload(engine: &dyn Engine) -> bool {
    match panic::catch_unwind(AssertUnwindSafe(|| engine.supports_gpu_offload())) {
        Ok(Ok(supported)) => supported,
        Ok(Err(e)) => {
            tracing::debug!("GPU offload capability unavailable: {}", e);
            false
        }
        Err(_) => {
            tracing::warn!("GPU offload probe panicked, reporting no GPU support");
            false
        }
    }
}
