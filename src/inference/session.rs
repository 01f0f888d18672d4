//! Inference sessions
//!
//! One session drives a single generation call: it accumulates fragments,
//! stops the engine at the first role tag and assembles the result.

use std::ops::ControlFlow;
use std::time::Instant;

use serde::Serialize;

use crate::inference::engine::{EngineError, LoadedModel, SamplingParams};
use crate::inference::stop_tags::StopTagDetector;

/// Outcome of one generation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationResult {
    /// Generated text, trimmed, without any stop tag
    pub response_text: String,
    /// Wall-clock duration in seconds, rounded to milliseconds
    pub elapsed_seconds: f64,
    /// Fragments consumed before the stop tag (if any)
    pub token_count: u32,
    /// Whether a stop tag ended the generation
    pub truncated: bool,
}

/// Runs one generation of `prompt` on `model`.
///
/// The fragment that completes a stop tag is not counted and the engine is told
/// to stop before it samples another token. Engine errors fail the whole session.
pub fn run(
    model: &mut dyn LoadedModel,
    prompt: &str,
    params: &SamplingParams,
) -> Result<GenerationResult, EngineError> {
    let started = Instant::now();
    let mut detector = StopTagDetector::new();
    let mut token_count = 0u32;

    model.generate(prompt, params, &mut |fragment| {
        if let Some(hit) = detector.push(fragment) {
            tracing::debug!(tag = hit.tag, offset = hit.offset, "Stop tag found");
            return ControlFlow::Break(());
        }
        token_count += 1;
        ControlFlow::Continue(())
    })?;

    let truncated = detector.is_stopped();
    let response_text = detector.into_text().trim().to_string();
    let elapsed_seconds = round_millis(started.elapsed().as_secs_f64());

    tracing::debug!(token_count, truncated, elapsed_seconds, "Generation finished");

    Ok(GenerationResult {
        response_text,
        elapsed_seconds,
        token_count,
        truncated,
    })
}

fn round_millis(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}
