//! Prometheus textfile exposition sink.
//!
//! Writes a full snapshot of the relabeled metrics to a file that a
//! node-exporter textfile collector scrapes. The file is overwritten on
//! every write.
//!
//! One line per metric, each terminated by a newline:
//!
//! ```text
//! <prefix>_<key>[_<sub_key>]{<label>="<value>",...} <number>
//! ```
//!
//! Label values are quoted and escaped. The braces are left out when a
//! rule yields no labels, and metrics with non-numeric values are dropped.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use meshstat_common::Batch;

use crate::config::TextfileConfig;
use crate::mapping::{format_labels, format_value};
use crate::relabel::RelabelRules;
use crate::{MetricSink, Result};

/// Relabels metrics and writes them to a textfile.
#[derive(Debug, Clone)]
pub struct TextfileSink {
    path: PathBuf,
    prefix: String,
    rules: RelabelRules,
}

impl TextfileSink {
    /// Create a sink, compiling its relabel rules.
    pub fn new(config: TextfileConfig) -> Result<Self> {
        let rules = RelabelRules::compile(&config.rules)?;
        if rules.is_empty() {
            warn!(path = %config.path.display(), "No relabel rules, textfile will stay empty");
        } else {
            debug!(path = %config.path.display(), rules = rules.len(), "Compiled relabel rules");
        }
        Ok(Self {
            path: config.path,
            prefix: config.prefix,
            rules,
        })
    }

    /// Render the exposition lines for a batch.
    ///
    /// Metrics without a matching rule, and values that are not numeric,
    /// are left out.
    pub fn render(&self, batch: &Batch) -> Vec<String> {
        let mut lines = Vec::new();

        for (metric, value) in &batch.metrics {
            let Some(relabeled) = self.rules.apply(&self.prefix, metric) else {
                continue;
            };
            let Some(number) = value.as_f64() else {
                trace!(metric = %metric, value = %value, "Skipping non-numeric value");
                continue;
            };

            lines.push(format!(
                "{}{} {}",
                relabeled.name,
                format_labels(&relabeled.labels),
                format_value(number)
            ));
        }

        lines
    }
}

#[async_trait]
impl MetricSink for TextfileSink {
    fn name(&self) -> &str {
        "textfile"
    }

    async fn write(&self, batch: &Batch) -> Result<usize> {
        let lines = self.render(batch);
        let mut content = lines.join("\n");
        if !content.is_empty() {
            content.push('\n');
        }

        tokio::fs::write(&self.path, content).await?;

        debug!(path = %self.path.display(), metrics = lines.len(), "Wrote textfile");
        Ok(lines.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstat_common::{MetricMap, MetricValue};

    fn batch() -> Batch {
        let mut metrics = MetricMap::new();
        metrics.insert("fastd.0.drops".to_string(), MetricValue::Counter(7));
        metrics.insert("fastd.1.online".to_string(), MetricValue::Counter(3));
        metrics.insert("load.15".to_string(), MetricValue::Gauge(0.1));
        metrics.insert("fastd.0.state".to_string(), MetricValue::from("up"));
        Batch {
            timestamp: 0,
            source: None,
            metrics,
        }
    }

    #[test]
    fn test_render_default_rules() {
        let sink = TextfileSink::new(TextfileConfig::default()).unwrap();
        let lines = sink.render(&batch());

        assert_eq!(
            lines,
            vec![
                "ffda_fastd_drops{fast_instance=\"0\"} 7".to_string(),
                "ffda_fastd_online{fast_instance=\"1\"} 3".to_string(),
            ]
        );
    }

    #[test]
    fn test_render_without_labels() {
        let sink = TextfileSink::new(TextfileConfig {
            rules: vec![r"^(?P<key>load)\.(?P<sub_key>\d+)".to_string()],
            ..TextfileConfig::default()
        })
        .unwrap();

        assert_eq!(sink.render(&batch()), vec!["ffda_load_15 0.1".to_string()]);
    }

    #[tokio::test]
    async fn test_write_overwrites_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telemetry.prom");
        std::fs::write(&path, "stale content that must disappear\n".repeat(10)).unwrap();

        let sink = TextfileSink::new(TextfileConfig {
            path: path.clone(),
            ..TextfileConfig::default()
        })
        .unwrap();

        let written = sink.write(&batch()).await.unwrap();
        assert_eq!(written, 2);

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "ffda_fastd_drops{fast_instance=\"0\"} 7\nffda_fastd_online{fast_instance=\"1\"} 3\n"
        );
    }
}
