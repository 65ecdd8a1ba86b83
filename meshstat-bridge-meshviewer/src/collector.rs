//! meshviewer polling.

use chrono::Utc;
use tracing::{debug, info, warn};

use anyhow::Context;
use meshstat_bridge_framework::{Collector, MetricMap, async_trait};

use crate::census;
use crate::config::MeshviewerConfig;
use crate::fetch::MeshviewerClient;
use crate::graph;

/// Collector for the node census and, optionally, link quality.
pub struct MeshviewerCollector {
    config: MeshviewerConfig,
    client: MeshviewerClient,
    offline_threshold: chrono::Duration,
}

impl MeshviewerCollector {
    /// Create a new collector.
    pub fn new(config: MeshviewerConfig) -> anyhow::Result<Self> {
        let client = MeshviewerClient::new(config.request_timeout())
            .context("Failed to build HTTP client")?;
        let offline_threshold = config.offline_threshold().with_context(|| {
            format!(
                "offline_threshold_secs {} out of range",
                config.offline_threshold_secs
            )
        })?;
        Ok(Self {
            config,
            client,
            offline_threshold,
        })
    }
}

#[async_trait]
impl Collector for MeshviewerCollector {
    async fn collect(&mut self) -> anyhow::Result<MetricMap> {
        let nodes = self
            .client
            .fetch_json(&self.config.nodes_url)
            .await
            .with_context(|| format!("Failed to fetch {}", self.config.nodes_url))?;

        let report = census::census(&nodes, Utc::now(), self.offline_threshold)?;
        drop(nodes);

        info!(
            known = report.summary.known_nodes,
            online = report.summary.online_nodes,
            clients = report.summary.clients,
            gateways = ?report.summary.gateways,
            "Node census"
        );

        let mut metrics = report.metrics;

        if self.config.graph_enabled {
            match self.client.fetch_json(&self.config.graph_url).await {
                Ok(doc) => metrics.extend(graph::link_quality(&doc, &report.identities)),
                Err(e) => warn!(url = %self.config.graph_url, error = %e, "Failed to fetch graph"),
            }
        }

        debug!(metrics = metrics.len(), "Collected meshviewer metrics");
        Ok(metrics)
    }
}
