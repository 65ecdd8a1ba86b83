//! Local node metrics collection.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use meshstat_bridge_framework::{Collector, MetricMap, MetricValue, async_trait};
use meshstat_common::with_prefix;

use crate::config::NodeConfig;
use crate::fastd;
use crate::neighbour::{self, AddressFamily};
use crate::proc_table;

/// Collector for proc tables, neighbour states and fastd counters.
pub struct NodeCollector {
    config: NodeConfig,
}

impl NodeCollector {
    /// Create a new node collector.
    pub fn new(config: NodeConfig) -> Self {
        Self { config }
    }

    fn proc_path(&self, relative: &str) -> PathBuf {
        self.config.proc_root.join(relative)
    }

    /// Read a proc file that should always exist; failures are logged.
    async fn read_proc(&self, relative: &str) -> Option<String> {
        let path = self.proc_path(relative);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Some(content),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read proc table");
                None
            }
        }
    }

    /// Collect every enabled proc table.
    pub async fn collect_proc_tables(&self) -> MetricMap {
        let collect = &self.config.collect;
        let mut metrics = MetricMap::new();

        if collect.net_dev {
            if let Some(content) = self.read_proc("net/dev").await {
                metrics.extend(proc_table::parse_net_dev(&content, &self.config.devices));
            }
        }

        if collect.loadavg {
            if let Some(content) = self.read_proc("loadavg").await {
                metrics.extend(proc_table::parse_loadavg(&content));
            }
        }

        if collect.conntrack {
            for key in ["count", "max"] {
                let path = self.proc_path(&format!("sys/net/netfilter/nf_conntrack_{}", key));
                // Absent when the conntrack module is not loaded.
                if let Ok(content) = tokio::fs::read_to_string(&path).await {
                    metrics.extend(proc_table::parse_single_value(
                        &format!("netfilter.{}", key),
                        &content,
                    ));
                }
            }
        }

        if collect.snmp6 {
            if let Some(content) = self.read_proc("net/snmp6").await {
                metrics.extend(proc_table::parse_snmp6(&content));
            }
        }

        if collect.snmp {
            if let Some(content) = self.read_proc("net/snmp").await {
                metrics.extend(proc_table::parse_snmp(&content));
            }
        }

        if collect.stat {
            if let Some(content) = self.read_proc("stat").await {
                metrics.extend(proc_table::parse_stat(&content));
            }
        }

        metrics
    }

    /// Sample the neighbour table of every configured address family.
    pub async fn collect_neighbours(&self) -> MetricMap {
        let neighbour = &self.config.neighbour;
        let mut metrics = MetricMap::new();

        for name in &neighbour.families {
            let Some(family) = AddressFamily::from_name(name) else {
                debug!(family = %name, "Skipping unknown address family");
                continue;
            };

            if let Some(counts) =
                neighbour::sample(&neighbour.command, family, neighbour.timeout()).await
            {
                metrics.extend(counts.to_metrics(family));
            }
        }

        metrics
    }

    /// Query the fastd status sockets and the process drop counter.
    pub async fn collect_fastd(&self) -> MetricMap {
        let fastd = &self.config.fastd;
        let mut metrics = MetricMap::new();

        for socket in &fastd.sockets {
            if !socket_exists(&socket.path).await {
                debug!(socket = %socket.path.display(), "fastd socket not present");
                continue;
            }

            let stats = fastd::peer_stats(&socket.path, fastd.timeout()).await;
            if !stats.is_empty() {
                metrics.extend(with_prefix(&format!("fastd.{}", socket.name), stats));
            }
        }

        let proc_root = self.config.proc_root.clone();
        let process_name = fastd.process_name.clone();
        let drops =
            tokio::task::spawn_blocking(move || fastd::process_drops(&proc_root, &process_name))
                .await;

        match drops {
            Ok(Some(drops)) if drops > 0 => {
                metrics.insert("fastd.drops".to_string(), MetricValue::Counter(drops));
            }
            Ok(_) => {}
            Err(e) => warn!(error = %e, "fastd drop counter task failed"),
        }

        metrics
    }
}

async fn socket_exists(path: &Path) -> bool {
    tokio::fs::try_exists(path).await.unwrap_or(false)
}

#[async_trait]
impl Collector for NodeCollector {
    async fn collect(&mut self) -> anyhow::Result<MetricMap> {
        let mut metrics = self.collect_proc_tables().await;

        if self.config.collect.neighbours {
            metrics.extend(self.collect_neighbours().await);
        }

        if self.config.collect.fastd {
            metrics.extend(self.collect_fastd().await);
        }

        debug!(metrics = metrics.len(), "Collected node metrics");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CollectConfig, FastdConfig, FastdSocket};

    fn write(root: &Path, relative: &str, content: &str) {
        let path = root.join(relative);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn config_for(root: &Path) -> NodeConfig {
        NodeConfig {
            proc_root: root.to_path_buf(),
            collect: CollectConfig {
                neighbours: false,
                ..CollectConfig::default()
            },
            fastd: FastdConfig {
                sockets: vec![FastdSocket {
                    name: "0".to_string(),
                    path: root.join("missing.sock"),
                }],
                ..FastdConfig::default()
            },
            ..NodeConfig::default()
        }
    }

    #[tokio::test]
    async fn test_collect_proc_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "loadavg", "0.10 0.20 0.30 1/200 1234\n");
        write(dir.path(), "stat", "cpu 1 2 3\nctxt 42\n");
        write(dir.path(), "sys/net/netfilter/nf_conntrack_count", "17\n");

        let collector = NodeCollector::new(config_for(dir.path()));
        let metrics = collector.collect_proc_tables().await;

        assert_eq!(metrics.get("load.15"), Some(&MetricValue::Gauge(0.1)));
        assert_eq!(
            metrics.get("context_switches"),
            Some(&MetricValue::Counter(42))
        );
        assert_eq!(metrics.get("netfilter.count"), Some(&MetricValue::Counter(17)));
        assert!(!metrics.contains_key("netfilter.max"));
    }

    #[tokio::test]
    async fn test_collect_skips_disabled_tables() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "loadavg", "0.10 0.20 0.30 1/200 1234\n");

        let mut config = config_for(dir.path());
        config.collect.loadavg = false;

        let metrics = NodeCollector::new(config).collect_proc_tables().await;
        assert!(!metrics.contains_key("load.15"));
    }

    #[tokio::test]
    async fn test_collect_fastd_missing_socket() {
        let dir = tempfile::tempdir().unwrap();
        let collector = NodeCollector::new(config_for(dir.path()));

        let metrics = collector.collect_fastd().await;
        assert!(metrics.is_empty());
    }

    #[tokio::test]
    async fn test_collect_empty_root_does_not_fail() {
        let dir = tempfile::tempdir().unwrap();
        let mut collector = NodeCollector::new(config_for(dir.path()));

        let metrics = collector.collect().await.unwrap();
        assert!(metrics.is_empty());
    }
}
