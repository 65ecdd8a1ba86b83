//! Configuration for the meshviewer bridge.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use meshstat_bridge_framework::{
    BridgeConfig, BridgeError, LoggingConfig, Result, SinksConfig,
};

/// Complete bridge configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshviewerBridgeConfig {
    /// meshviewer settings.
    #[serde(default)]
    pub meshviewer: MeshviewerConfig,

    /// Sink settings.
    #[serde(default)]
    pub sinks: SinksConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// meshviewer API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeshviewerConfig {
    /// URL of the node list document.
    #[serde(default = "default_nodes_url")]
    pub nodes_url: String,

    /// URL of the link graph document.
    #[serde(default = "default_graph_url")]
    pub graph_url: String,

    /// Also fetch the graph and emit link quality (default: false).
    #[serde(default)]
    pub graph_enabled: bool,

    /// HTTP request timeout in seconds (default: 1).
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Poll interval in seconds (default: 25).
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// A node without flags counts as online if its last statistics update
    /// is younger than this (default: 600).
    #[serde(default = "default_offline_threshold")]
    pub offline_threshold_secs: u64,
}

fn default_nodes_url() -> String {
    "https://meshviewer.darmstadt.freifunk.net/data/ffda/nodes.json".to_string()
}

fn default_graph_url() -> String {
    "https://meshviewer.darmstadt.freifunk.net/data/ffda/graph.json".to_string()
}

fn default_request_timeout() -> u64 {
    1
}

fn default_poll_interval() -> u64 {
    25
}

fn default_offline_threshold() -> u64 {
    600
}

impl Default for MeshviewerConfig {
    fn default() -> Self {
        Self {
            nodes_url: default_nodes_url(),
            graph_url: default_graph_url(),
            graph_enabled: false,
            request_timeout_secs: default_request_timeout(),
            poll_interval_secs: default_poll_interval(),
            offline_threshold_secs: default_offline_threshold(),
        }
    }
}

impl MeshviewerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Offline threshold as a signed duration, `None` if it cannot be represented.
    pub fn offline_threshold(&self) -> Option<chrono::Duration> {
        i64::try_from(self.offline_threshold_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
    }
}

impl BridgeConfig for MeshviewerBridgeConfig {
    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn sinks(&self) -> &SinksConfig {
        &self.sinks
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.meshviewer.poll_interval_secs)
    }

    fn validate(&self) -> Result<()> {
        let mv = &self.meshviewer;

        for (field, url) in [("nodes_url", &mv.nodes_url), ("graph_url", &mv.graph_url)] {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(BridgeError::validation(format!(
                    "meshviewer.{} must be an http(s) URL, got '{}'",
                    field, url
                )));
            }
        }

        if mv.request_timeout_secs == 0 {
            return Err(BridgeError::validation(
                "meshviewer.request_timeout_secs must be > 0",
            ));
        }

        if mv.offline_threshold_secs == 0 || mv.offline_threshold().is_none() {
            return Err(BridgeError::validation(
                "meshviewer.offline_threshold_secs out of range",
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_config() {
        let config = MeshviewerBridgeConfig::parse("{}").unwrap();

        assert_eq!(
            config.meshviewer.nodes_url,
            "https://meshviewer.darmstadt.freifunk.net/data/ffda/nodes.json"
        );
        assert!(!config.meshviewer.graph_enabled);
        assert_eq!(config.poll_interval(), Duration::from_secs(25));
        assert_eq!(config.meshviewer.request_timeout(), Duration::from_secs(1));
        assert_eq!(
            config.meshviewer.offline_threshold(),
            Some(chrono::Duration::seconds(600))
        );
        // Cluster-wide metrics carry no host segment
        assert!(config.source().is_none());
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            meshviewer: {
                nodes_url: "http://127.0.0.1:8080/nodes.json",
                graph_url: "http://127.0.0.1:8080/graph.json",
                graph_enabled: true,
                request_timeout_secs: 5,
                poll_interval_secs: 60,
                offline_threshold_secs: 300,
            },
            sinks: {
                graphite: { host: "127.0.0.1", port: 2003 },
            },
            logging: { level: "debug", format: "json" },
        }"#;

        let config = MeshviewerBridgeConfig::parse(json).unwrap();

        assert!(config.meshviewer.graph_enabled);
        assert_eq!(config.poll_interval(), Duration::from_secs(60));
        assert_eq!(config.meshviewer.offline_threshold_secs, 300);
        assert_eq!(config.sinks.graphite.as_ref().unwrap().port, 2003);
    }

    #[test]
    fn test_validate_bad_url() {
        let result = MeshviewerBridgeConfig::parse(r#"{ meshviewer: { nodes_url: "ftp://x" } }"#);
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let result =
            MeshviewerBridgeConfig::parse("{ meshviewer: { request_timeout_secs: 0 } }");
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_unrepresentable_threshold() {
        let result = MeshviewerBridgeConfig::parse(
            "{ meshviewer: { offline_threshold_secs: 100000000000000000 } }",
        );
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));

        let result = MeshviewerBridgeConfig::parse("{ meshviewer: { offline_threshold_secs: 0 } }");
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }
}
