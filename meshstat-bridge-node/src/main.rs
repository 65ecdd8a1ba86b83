//! meshstat bridge for local mesh node telemetry.
//!
//! Collects proc tables, neighbour states and fastd counters and pushes
//! them to the configured sinks.

use anyhow::Result;
use meshstat_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use meshstat_bridge_node::collector::NodeCollector;
use meshstat_bridge_node::config::NodeBridgeConfig;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let args = BridgeArgs::parse_with_default("node.json5");

    // Load configuration using the framework's BridgeConfig trait
    let config = NodeBridgeConfig::load(&args.config).map_err(|e| anyhow::anyhow!("{}", e))?;

    let runner = BridgeRunner::new_with_args("node", config, Some(&args))
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    let node_config = runner.config().node.clone();

    tracing::info!(
        "Node bridge running (proc root: {}, interval: {}s, hostname: {})",
        node_config.proc_root.display(),
        node_config.poll_interval_secs,
        node_config.hostname
    );

    let collector = NodeCollector::new(node_config);

    // Run until Ctrl+C (handles shutdown gracefully)
    runner.run(collector).await
}
