//! meshstat bridge for the meshviewer API.
//!
//! Polls the node list (and optionally the link graph) and pushes the
//! census to the configured sinks.

use anyhow::Result;
use meshstat_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use meshstat_bridge_meshviewer::collector::MeshviewerCollector;
use meshstat_bridge_meshviewer::config::MeshviewerBridgeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse_with_default("meshviewer.json5");

    // Load configuration using the framework's BridgeConfig trait
    let config =
        MeshviewerBridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let runner = BridgeRunner::new_with_args("meshviewer", config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let mv_config = runner.config().meshviewer.clone();

    tracing::info!(
        "Meshviewer bridge running (nodes: {}, graph: {}, interval: {}s)",
        mv_config.nodes_url,
        mv_config.graph_enabled,
        mv_config.poll_interval_secs
    );

    let collector = MeshviewerCollector::new(mv_config)?;

    // Run until Ctrl+C (handles shutdown gracefully)
    runner.run(collector).await
}
