//! Scripted engine used by unit tests in place of llama.cpp

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::inference::engine::{Engine, EngineError, LoadParams, LoadedModel, SamplingParams};

/// Tracks how many generations run at once
#[derive(Debug, Default)]
pub struct SessionMonitor {
    active: AtomicUsize,
    max_active: AtomicUsize,
    completed: AtomicUsize,
}

impl SessionMonitor {
    fn enter(&self) {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }
}

pub struct ScriptedModel {
    fragments: Vec<String>,
    requested: usize,
    fail_after: Option<usize>,
    delay: Duration,
    last_prompt: Option<String>,
    last_params: Option<SamplingParams>,
    monitor: Option<Arc<SessionMonitor>>,
    drops: Option<Arc<AtomicUsize>>,
}

impl ScriptedModel {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            requested: 0,
            fail_after: None,
            delay: Duration::ZERO,
            last_prompt: None,
            last_params: None,
            monitor: None,
            drops: None,
        }
    }

    /// Fail with an inference error once `n` fragments were produced
    pub fn failing_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Total fragments produced across all generations
    pub fn requested(&self) -> usize {
        self.requested
    }

    pub fn last_prompt(&self) -> Option<&str> {
        self.last_prompt.as_deref()
    }

    pub fn last_params(&self) -> Option<SamplingParams> {
        self.last_params
    }
}

impl LoadedModel for ScriptedModel {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<(), EngineError> {
        self.last_prompt = Some(prompt.to_string());
        self.last_params = Some(*params);
        if let Some(monitor) = &self.monitor {
            monitor.enter();
        }

        let mut outcome = Ok(());
        for (i, fragment) in self
            .fragments
            .iter()
            .take(params.max_tokens as usize)
            .enumerate()
        {
            if self.fail_after == Some(i) {
                outcome = Err(EngineError::Inference("scripted failure".to_string()));
                break;
            }
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            self.requested += 1;
            if on_fragment(fragment).is_break() {
                break;
            }
        }

        if let Some(monitor) = &self.monitor {
            monitor.exit();
        }
        outcome
    }
}

impl Drop for ScriptedModel {
    fn drop(&mut self) {
        if let Some(drops) = &self.drops {
            drops.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Engine producing [`ScriptedModel`]s
pub struct ScriptedEngine {
    fragments: Vec<String>,
    failing_paths: Vec<PathBuf>,
    load_delay: Duration,
    fragment_delay: Duration,
    gpu: Result<bool, EngineError>,
    pub monitor: Arc<SessionMonitor>,
    pub loads: AtomicUsize,
    pub drops: Arc<AtomicUsize>,
}

impl ScriptedEngine {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            failing_paths: Vec::new(),
            load_delay: Duration::ZERO,
            fragment_delay: Duration::ZERO,
            gpu: Ok(false),
            monitor: Arc::new(SessionMonitor::default()),
            loads: AtomicUsize::new(0),
            drops: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn failing_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.failing_paths.push(path.into());
        self
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    pub fn with_gpu(mut self, gpu: Result<bool, EngineError>) -> Self {
        self.gpu = gpu;
        self
    }

    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }
}

impl Engine for ScriptedEngine {
    fn load(&self, params: &LoadParams) -> Result<Box<dyn LoadedModel>, EngineError> {
        if !self.load_delay.is_zero() {
            thread::sleep(self.load_delay);
        }
        if self.failing_paths.contains(&params.model_path) {
            return Err(EngineError::ModelLoad(format!(
                "cannot open {}",
                params.model_path.display()
            )));
        }
        self.loads.fetch_add(1, Ordering::SeqCst);

        let fragments: Vec<&str> = self.fragments.iter().map(String::as_str).collect();
        let mut model = ScriptedModel::new(&fragments);
        model.delay = self.fragment_delay;
        model.monitor = Some(Arc::clone(&self.monitor));
        model.drops = Some(Arc::clone(&self.drops));
        Ok(Box::new(model))
    }

    fn supports_gpu_offload(&self) -> Result<bool, EngineError> {
        self.gpu.clone()
    }
}
