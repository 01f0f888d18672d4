//! llamagate - HTTP gateway serving local LLMs through llama.cpp

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use llamagate::{app, args::Args, logging};

#[rocket::main]
async fn main() -> Result<()> {
    logging::init();
    let args = Args::parse();
    info!("Starting llamagate v{}", env!("CARGO_PKG_VERSION"));

    match app::run(args).await {
        Ok(()) => Ok(()),
        Err(err) => {
            error!(error = %err, "Server failed");
            Err(err)
        }
    }
}
