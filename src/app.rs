use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::args::Args;
use crate::gateway::Gateway;
use crate::inference::llama::LlamaEngine;
use crate::server;
use crate::storage::settings::{load_settings, load_settings_from, GatewaySettings};

/// Resolves settings from the config file and command line
pub fn resolve_settings(args: &Args) -> Result<GatewaySettings> {
    let mut settings = match &args.config {
        Some(path) => load_settings_from(path)
            .with_context(|| format!("failed to read settings from {}", path.display()))?,
        None => load_settings(),
    };
    args.apply(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Runs the gateway until the HTTP server stops, then unloads every model
pub async fn run(args: Args) -> Result<()> {
    let settings = resolve_settings(&args)?;

    let engine = LlamaEngine::init().context("failed to initialize llama.cpp backend")?;
    let gateway = Arc::new(Gateway::new(Arc::new(engine), &settings));

    preload(&gateway, &settings).await;

    info!("Server ready on {}:{}", settings.host, settings.port);
    let launched = server::build(Arc::clone(&gateway), &settings).launch().await;

    info!("Server stopped, unloading models");
    gateway.shutdown().await;

    launched.map_err(|err| anyhow::anyhow!("rocket failed: {err}"))?;
    Ok(())
}

async fn preload(gateway: &Gateway, settings: &GatewaySettings) {
    for request in &settings.preload {
        let model_id = request.model_id.clone().unwrap_or_default();
        match gateway.load_model(request.clone()).await {
            Ok(ack) => info!("{}", ack.message),
            Err(err) => warn!(%model_id, error = %err, "Preload failed"),
        }
    }
}
