//! docscan-agent entry point.
//!
//! Reads host events from stdin and writes replies to stdout, one JSON
//! object per line. Logging goes to stderr to keep stdout for the protocol.

use std::sync::Arc;

use anyhow::Result;
use docscan_agent::{AgentHost, OfflineAgent, Registration};
use docscan_client::HttpNetwork;
use docscan_core::{AgentConfig, CacheDb, CacheStorage, MemoryStorage};
use tokio::io::{BufReader, stdin, stdout};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .json()
        .init();

    let config = AgentConfig::load()?;

    let storage: Arc<dyn CacheStorage> = match &config.db_path {
        Some(path) => Arc::new(CacheDb::open(path).await?),
        None => Arc::new(MemoryStorage::new()),
    };
    let network = Arc::new(HttpNetwork::from_config(&config)?);
    let agent = OfflineAgent::new(&config, storage, network)?;

    tracing::info!(
        generation = %agent.version(),
        origin = %config.origin,
        persistent = config.db_path.is_some(),
        "starting docscan-agent on stdio"
    );

    let mut host = AgentHost::new(Registration::new(agent));
    host.serve(BufReader::new(stdin()), stdout()).await?;

    Ok(())
}
