//! Graphite plaintext (carbon) line-protocol sink.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::debug;

use meshstat_common::Batch;

use crate::config::GraphiteConfig;
use crate::{MetricSink, Result, SinkError};

/// Sends every metric as one `<path> <value> <timestamp>` line over TCP.
#[derive(Debug, Clone)]
pub struct GraphiteSink {
    config: GraphiteConfig,
}

impl GraphiteSink {
    pub fn new(config: GraphiteConfig) -> Self {
        Self { config }
    }

    fn target(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Build the metric path for a key: `<prefix>[.<source>].<key>`.
    pub fn metric_path(&self, source: Option<&str>, key: &str) -> String {
        let mut path = String::with_capacity(self.config.prefix.len() + key.len() + 16);
        for segment in [Some(self.config.prefix.as_str()), source].into_iter().flatten() {
            if !segment.is_empty() {
                path.push_str(segment);
                path.push('.');
            }
        }
        path.push_str(key);
        path
    }

    /// Render the whole batch in line protocol.
    pub fn render(&self, batch: &Batch) -> String {
        let source = batch.source.as_deref();
        let mut out = String::new();
        for (key, value) in &batch.metrics {
            out.push_str(&format!(
                "{} {} {}\n",
                self.metric_path(source, key),
                value,
                batch.timestamp
            ));
        }
        out
    }
}

#[async_trait]
impl MetricSink for GraphiteSink {
    fn name(&self) -> &str {
        "graphite"
    }

    async fn write(&self, batch: &Batch) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        let target = self.target();
        let secs = self.config.timeout_secs;
        let timeout = Duration::from_secs(secs);
        let payload = self.render(batch);

        let send = async {
            let mut stream = TcpStream::connect(&target).await?;
            stream.write_all(payload.as_bytes()).await?;
            stream.shutdown().await?;
            Ok::<_, std::io::Error>(())
        };

        tokio::time::timeout(timeout, send)
            .await
            .map_err(|_| SinkError::Timeout {
                target: target.clone(),
                secs,
            })??;

        debug!(target = %target, metrics = batch.len(), "Sent metrics to graphite");
        Ok(batch.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstat_common::{MetricMap, MetricValue};

    fn sink(prefix: &str) -> GraphiteSink {
        GraphiteSink::new(GraphiteConfig {
            prefix: prefix.to_string(),
            ..GraphiteConfig::default()
        })
    }

    #[test]
    fn test_metric_path() {
        let sink = sink("freifunk");
        assert_eq!(
            sink.metric_path(Some("gw01"), "load.15"),
            "freifunk.gw01.load.15"
        );
        assert_eq!(sink.metric_path(None, "clients"), "freifunk.clients");
        assert_eq!(self::sink("").metric_path(None, "clients"), "clients");
    }

    #[test]
    fn test_render_lines() {
        let mut metrics = MetricMap::new();
        metrics.insert("load.15".to_string(), MetricValue::Gauge(0.1));
        metrics.insert("peers.count".to_string(), MetricValue::Counter(2));

        let batch = Batch {
            timestamp: 1_700_000_000,
            source: Some("gw01".to_string()),
            metrics,
        };

        assert_eq!(
            sink("freifunk").render(&batch),
            "freifunk.gw01.load.15 0.1 1700000000\nfreifunk.gw01.peers.count 2 1700000000\n"
        );
    }

    #[tokio::test]
    async fn test_write_empty_batch_skips_connect() {
        // Port 1 is never listening; an empty batch must not even try.
        let sink = GraphiteSink::new(GraphiteConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            ..GraphiteConfig::default()
        });

        let written = sink.write(&Batch::default()).await.unwrap();
        assert_eq!(written, 0);
    }
}
