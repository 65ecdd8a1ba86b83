//! Configuration for the metric sinks.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::SinkError;
use crate::relabel::RelabelRules;

/// Which sinks a bridge writes to. Both are optional.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SinksConfig {
    /// Graphite line-protocol sink.
    #[serde(default)]
    pub graphite: Option<GraphiteConfig>,

    /// Prometheus textfile sink.
    #[serde(default)]
    pub textfile: Option<TextfileConfig>,
}

/// Graphite (carbon plaintext) endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphiteConfig {
    /// Carbon host (default: "localhost").
    #[serde(default = "default_graphite_host")]
    pub host: String,

    /// Carbon plaintext port (default: 2013).
    #[serde(default = "default_graphite_port")]
    pub port: u16,

    /// Metric path prefix (default: "freifunk").
    #[serde(default = "default_graphite_prefix")]
    pub prefix: String,

    /// Connect and write timeout in seconds (default: 3).
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_graphite_host() -> String {
    "localhost".to_string()
}

fn default_graphite_port() -> u16 {
    2013
}

fn default_graphite_prefix() -> String {
    "freifunk".to_string()
}

fn default_timeout() -> u64 {
    3
}

impl Default for GraphiteConfig {
    fn default() -> Self {
        Self {
            host: default_graphite_host(),
            port: default_graphite_port(),
            prefix: default_graphite_prefix(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Textfile exposition sink configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextfileConfig {
    /// File overwritten on every write (default: "/dev/shm/telemetry.prom").
    #[serde(default = "default_textfile_path")]
    pub path: PathBuf,

    /// Metric name prefix (default: "ffda").
    #[serde(default = "default_textfile_prefix")]
    pub prefix: String,

    /// Ordered relabel rules; each must contain a `key` named group.
    #[serde(default = "default_rules")]
    pub rules: Vec<String>,
}

fn default_textfile_path() -> PathBuf {
    PathBuf::from("/dev/shm/telemetry.prom")
}

fn default_textfile_prefix() -> String {
    "ffda".to_string()
}

fn default_rules() -> Vec<String> {
    vec![r"^(?P<key>fastd)\.(?P<fast_instance>.+)\.(?P<sub_key>.+)".to_string()]
}

impl Default for TextfileConfig {
    fn default() -> Self {
        Self {
            path: default_textfile_path(),
            prefix: default_textfile_prefix(),
            rules: default_rules(),
        }
    }
}

impl SinksConfig {
    /// Validate the sink configuration.
    pub fn validate(&self) -> Result<(), SinkError> {
        if let Some(graphite) = &self.graphite {
            if graphite.host.is_empty() {
                return Err(SinkError::Config("graphite.host must not be empty".into()));
            }
            if graphite.timeout_secs == 0 {
                return Err(SinkError::Config(
                    "graphite.timeout_secs must be > 0".into(),
                ));
            }
        }

        if let Some(textfile) = &self.textfile {
            if textfile.path.as_os_str().is_empty() {
                return Err(SinkError::Config("textfile.path must not be empty".into()));
            }
            RelabelRules::compile(&textfile.rules)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_empty_config() {
        let config: SinksConfig = json5::from_str("{}").unwrap();
        assert!(config.graphite.is_none());
        assert!(config.textfile.is_none());
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_defaults() {
        let config: SinksConfig = json5::from_str("{ graphite: {}, textfile: {} }").unwrap();

        let graphite = config.graphite.as_ref().unwrap();
        assert_eq!(graphite.host, "localhost");
        assert_eq!(graphite.port, 2013);
        assert_eq!(graphite.prefix, "freifunk");
        assert_eq!(graphite.timeout_secs, 3);

        let textfile = config.textfile.as_ref().unwrap();
        assert_eq!(textfile.path, PathBuf::from("/dev/shm/telemetry.prom"));
        assert_eq!(textfile.prefix, "ffda");
        assert_eq!(textfile.rules.len(), 1);

        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            graphite: {
                host: "stats.darmstadt.freifunk.net",
                port: 2003,
                prefix: "ffda",
                timeout_secs: 1,
            },
            textfile: {
                path: "/tmp/out.prom",
                prefix: "mesh",
                rules: ["^(?P<key>load)\\.(?P<period>\\d+)"],
            },
        }"#;

        let config: SinksConfig = json5::from_str(json).unwrap();
        config.validate().unwrap();

        assert_eq!(config.graphite.as_ref().unwrap().port, 2003);
        assert_eq!(
            config.textfile.as_ref().unwrap().rules,
            vec![r"^(?P<key>load)\.(?P<period>\d+)".to_string()]
        );
    }

    #[test]
    fn test_validate_rule_without_key_group() {
        let config = SinksConfig {
            graphite: None,
            textfile: Some(TextfileConfig {
                rules: vec![r"^(?P<interface>[^.]+)\.rx".to_string()],
                ..TextfileConfig::default()
            }),
        };

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("key"));
    }

    #[test]
    fn test_validate_zero_timeout() {
        let config = SinksConfig {
            graphite: Some(GraphiteConfig {
                timeout_secs: 0,
                ..GraphiteConfig::default()
            }),
            textfile: None,
        };

        assert!(config.validate().is_err());
    }
}
