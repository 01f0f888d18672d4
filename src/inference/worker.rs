//! Per-model worker threads
//!
//! # Architecture
//!
//! llama.cpp model handles contain raw pointers and are not `Send`, so every
//! loaded model lives on its own dedicated thread. The thread loads the model,
//! runs generations one at a time in arrival order and finally drops it.
//! Async callers talk to it through a command channel and get replies on
//! tokio oneshot channels, so they never block the runtime while waiting.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tokio::sync::oneshot;

use crate::inference::engine::{Engine, EngineError, LoadParams, LoadedModel, SamplingParams};
use crate::inference::session::{self, GenerationResult};

/// Errors returned to callers of [`ModelWorker::generate`]
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Model '{0}' is no longer loaded")]
    Unloaded(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

/// Commands sent to the worker thread
enum WorkerCommand {
    Generate {
        prompt: String,
        params: SamplingParams,
        response_tx: oneshot::Sender<Result<GenerationResult, EngineError>>,
    },
    Shutdown {
        done_tx: oneshot::Sender<()>,
    },
}

/// Owner-side handle of a model's worker thread
pub struct ModelWorker {
    model_id: String,
    command_tx: Sender<WorkerCommand>,
    worker_handle: Mutex<Option<JoinHandle<()>>>,
    /// Generations accepted but not yet finished
    pending: Arc<AtomicUsize>,
}

impl ModelWorker {
    /// Spawns a worker thread and loads the model on it.
    ///
    /// Resolves once loading finished. On failure the thread has already exited
    /// and nothing stays resident.
    pub async fn start(
        engine: Arc<dyn Engine>,
        model_id: &str,
        params: LoadParams,
    ) -> Result<Self, EngineError> {
        let (command_tx, command_rx) = mpsc::channel::<WorkerCommand>();
        let (ready_tx, ready_rx) = oneshot::channel();
        let pending = Arc::new(AtomicUsize::new(0));

        let thread_model_id = model_id.to_string();
        let thread_pending = Arc::clone(&pending);
        let handle = thread::Builder::new()
            .name(format!("model-{model_id}"))
            .spawn(move || {
                worker_thread_main(
                    engine,
                    thread_model_id,
                    params,
                    ready_tx,
                    command_rx,
                    thread_pending,
                );
            })
            .map_err(|e| EngineError::WorkerError(e.to_string()))?;

        match ready_rx.await {
            Ok(Ok(())) => Ok(Self {
                model_id: model_id.to_string(),
                command_tx,
                worker_handle: Mutex::new(Some(handle)),
                pending,
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(EngineError::WorkerError(
                "worker thread exited while loading".to_string(),
            )),
        }
    }

    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Generations queued or running on this model
    pub fn pending_requests(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Queues a generation behind any earlier ones and waits for its result.
    pub async fn generate(
        &self,
        prompt: String,
        params: SamplingParams,
    ) -> Result<GenerationResult, GenerationError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.pending.fetch_add(1, Ordering::SeqCst);
        let sent = self.command_tx.send(WorkerCommand::Generate {
            prompt,
            params,
            response_tx,
        });
        if sent.is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(GenerationError::Unloaded(self.model_id.clone()));
        }

        match response_rx.await {
            Ok(result) => result.map_err(GenerationError::from),
            // Queued behind a shutdown: the worker exited without running it.
            Err(_) => Err(GenerationError::Unloaded(self.model_id.clone())),
        }
    }

    /// Stops the worker once every generation queued before this call finished,
    /// then waits until the model is released.
    pub async fn shutdown(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self
            .command_tx
            .send(WorkerCommand::Shutdown { done_tx })
            .is_ok()
        {
            let _ = done_rx.await;
        }

        let handle = self
            .worker_handle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            if let Err(e) = tokio::task::spawn_blocking(move || handle.join()).await {
                tracing::warn!(model_id = %self.model_id, "Failed to join worker thread: {}", e);
            }
        }
    }
}

/// Worker thread main loop
///
/// Owns the loaded model for its whole life and processes commands in order.
fn worker_thread_main(
    engine: Arc<dyn Engine>,
    model_id: String,
    params: LoadParams,
    ready_tx: oneshot::Sender<Result<(), EngineError>>,
    command_rx: Receiver<WorkerCommand>,
    pending: Arc<AtomicUsize>,
) {
    let mut model = match engine.load(&params) {
        Ok(model) => model,
        Err(e) => {
            tracing::error!(%model_id, "Failed to load model: {}", e);
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    if ready_tx.send(Ok(())).is_err() {
        tracing::debug!(%model_id, "Load abandoned by caller, releasing model");
        return;
    }
    tracing::info!(%model_id, path = %params.model_path.display(), "Model worker ready");

    loop {
        match command_rx.recv() {
            Ok(WorkerCommand::Generate {
                prompt,
                params,
                response_tx,
            }) => {
                let result = run_guarded(model.as_mut(), &prompt, &params);
                if let Err(e) = &result {
                    tracing::error!(%model_id, "Generation failed: {}", e);
                }
                pending.fetch_sub(1, Ordering::SeqCst);
                if response_tx.send(result).is_err() {
                    tracing::debug!(%model_id, "Caller went away before the result was ready");
                }
            }
            Ok(WorkerCommand::Shutdown { done_tx }) => {
                drop(model);
                tracing::info!(%model_id, "Model released, worker shutting down");
                let _ = done_tx.send(());
                return;
            }
            Err(_) => {
                // Every handle dropped without an explicit shutdown.
                tracing::debug!(%model_id, "Command channel closed, worker exiting");
                break;
            }
        }
    }
}

fn run_guarded(
    model: &mut dyn LoadedModel,
    prompt: &str,
    params: &SamplingParams,
) -> Result<GenerationResult, EngineError> {
    panic::catch_unwind(AssertUnwindSafe(|| session::run(model, prompt, params))).unwrap_or_else(
        |_| {
            Err(EngineError::Inference(
                "engine panicked during generation".to_string(),
            ))
        },
    )
}
