//! Fake engine and client helpers shared by the HTTP tests

use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::Arc;

use llamagate::inference::{Engine, EngineError, LoadParams, LoadedModel, SamplingParams};
use llamagate::server;
use llamagate::storage::settings::GatewaySettings;
use llamagate::Gateway;
use rocket::local::asynchronous::Client;

/// Streams a fixed script of fragments; fails loads of `missing.gguf`
pub struct FakeEngine {
    fragments: Vec<String>,
    gpu: bool,
}

impl FakeEngine {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            gpu: false,
        }
    }

    pub fn with_gpu(mut self) -> Self {
        self.gpu = true;
        self
    }
}

impl Engine for FakeEngine {
    fn load(&self, params: &LoadParams) -> Result<Box<dyn LoadedModel>, EngineError> {
        if params.model_path == PathBuf::from("missing.gguf") {
            return Err(EngineError::ModelLoad("No such file or directory".to_string()));
        }
        Ok(Box::new(FakeModel {
            fragments: self.fragments.clone(),
        }))
    }

    fn supports_gpu_offload(&self) -> Result<bool, EngineError> {
        Ok(self.gpu)
    }
}

struct FakeModel {
    fragments: Vec<String>,
}

impl LoadedModel for FakeModel {
    fn generate(
        &mut self,
        prompt: &str,
        params: &SamplingParams,
        on_fragment: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<(), EngineError> {
        if prompt.contains("explode") {
            return Err(EngineError::Inference("decode failed".to_string()));
        }
        for fragment in self.fragments.iter().take(params.max_tokens as usize) {
            if on_fragment(fragment).is_break() {
                break;
            }
        }
        Ok(())
    }
}

pub async fn client(engine: FakeEngine) -> Client {
    let settings = GatewaySettings::default();
    let gateway = Arc::new(Gateway::new(Arc::new(engine), &settings));
    Client::tracked(server::build(gateway, &settings))
        .await
        .expect("valid rocket instance")
}
