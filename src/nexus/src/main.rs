mod check;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use nexus_config::load_or_default;
use nexus_core::ServiceStorage;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::commands::{execute, Command};

#[derive(Parser, Debug)]
#[command(version, about = "Nexus: registry of remote services and their connection details")]
struct Args {
    /// Path to config file (yaml/json/toml)
    #[arg(short, long, default_value = "./nexus.yaml")]
    config: String,
    /// Print api keys and passwords instead of masking them
    #[arg(long, global = true)]
    reveal_secrets: bool,
    #[command(subcommand)]
    command: Command,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_or_default(&args.config)?;

    let _guard = nexus_tracing::init(
        &config.tracing.service_name,
        config.tracing.otlp_endpoint(),
        &config.logging.mode,
        &config.logging.level,
    )?;

    let memory = config.open_memory().with_context(|| {
        format!("open {} store at {}", config.storage.engine, config.storage.path)
    })?;
    debug!(engine = %config.storage.engine, persistent = memory.is_persistent(), "store opened");

    let storage = ServiceStorage::new(Arc::new(memory))
        .with_collection_key(config.storage.collection_key.clone());

    let output = execute(
        args.command,
        &storage,
        Duration::from_millis(config.checker.delay_ms),
        args.reveal_secrets,
    )
    .await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
