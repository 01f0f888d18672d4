use std::path::PathBuf;

use clap::Parser;

use crate::storage::settings::GatewaySettings;
use crate::types::requests::LoadModelRequest;

#[derive(Parser, Debug)]
#[command(author, version, about = "Local LLM gateway over llama.cpp", long_about = None)]
pub struct Args {
    /// Optional path to a settings file (defaults to platform config dir).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Host/IP for the HTTP server to bind to.
    #[arg(long)]
    pub host: Option<String>,

    /// TCP port for the HTTP server.
    #[arg(long)]
    pub port: Option<u16>,

    /// Load a model at startup, e.g. `--preload llama=/models/llama.gguf`. Repeatable.
    #[arg(long, value_name = "ID=PATH", value_parser = parse_preload)]
    pub preload: Vec<LoadModelRequest>,
}

impl Args {
    /// Applies command line overrides on top of `settings`
    pub fn apply(&self, settings: &mut GatewaySettings) {
        if let Some(host) = &self.host {
            settings.host = host.clone();
        }
        if let Some(port) = self.port {
            settings.port = port;
        }
        settings.preload.extend(self.preload.iter().cloned());
    }
}

fn parse_preload(value: &str) -> Result<LoadModelRequest, String> {
    match value.split_once('=') {
        Some((id, path)) if !id.is_empty() && !path.is_empty() => {
            Ok(LoadModelRequest::new(id, path))
        }
        _ => Err(format!("expected ID=PATH, got '{value}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_preload() {
        assert_eq!(
            parse_preload("llama=/models/a=b.gguf").unwrap(),
            LoadModelRequest::new("llama", "/models/a=b.gguf")
        );
        assert!(parse_preload("llama").is_err());
        assert!(parse_preload("=path").is_err());
    }

    #[test]
    fn test_overrides() {
        let args = Args::parse_from([
            "llamagate",
            "--port",
            "8080",
            "--preload",
            "a=a.gguf",
            "--preload",
            "b=b.gguf",
        ]);
        let mut settings = GatewaySettings::default();
        args.apply(&mut settings);

        assert_eq!(settings.port, 8080);
        assert_eq!(settings.host, "0.0.0.0");
        assert_eq!(settings.preload.len(), 2);
        assert_eq!(settings.preload[1].model_id.as_deref(), Some("b"));
    }
}
