pub mod audit;
pub mod config;
pub mod purge;
pub mod stats;

use anyhow::{Context, Result};
use wayfarer::{
    MemoryStore, RedisStore, WayfarerConfig,
    config::StoreBackend,
};

use crate::output::OutputManager;

/// A command that reads or writes the document store.
pub enum StoreCommand {
    Stats,
    Purge,
    Audit { repair: bool },
}

/// Opens the configured backend and runs `command` against it.
pub async fn run_store_command(command: StoreCommand, config: &WayfarerConfig, output: &OutputManager) -> Result<()> {
    let prefix = config.store.prefix.as_str();
    match config.store.backend {
        StoreBackend::Redis => {
            let url = config.redis_url().context("Redis URL is not configured")?;
            output.progress("Connecting to Redis");
            let store = RedisStore::connect(&url)
                .await
                .with_context(|| format!("Failed to connect to {url}"))?;
            output.clear_line();
            dispatch(command, &store, prefix, output).await
        }
        StoreBackend::Memory => {
            output.warning("Store backend is `memory`; it starts empty on every run.");
            dispatch(command, &MemoryStore::new(), prefix, output).await
        }
    }
}

async fn dispatch<S: wayfarer::DocumentStore>(
    command: StoreCommand,
    store: &S,
    prefix: &str,
    output: &OutputManager,
) -> Result<()> {
    match command {
        StoreCommand::Stats => stats::handle_stats(store, prefix, output).await,
        StoreCommand::Purge => purge::handle_purge(store, prefix, output).await,
        StoreCommand::Audit { repair } => audit::handle_audit(store, prefix, repair, output).await,
    }
}
