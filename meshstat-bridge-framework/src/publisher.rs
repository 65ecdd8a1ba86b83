//! Fan-out of metric batches to the configured sinks.

use std::fmt;

use meshstat_common::Batch;
use meshstat_sink::{MetricSink, SinksConfig, build_sinks};

use crate::error::Result;

/// Publisher for sending batches to every configured sink.
///
/// A failing sink is logged and does not keep the others from receiving
/// the batch.
pub struct Publisher {
    sinks: Vec<Box<dyn MetricSink>>,
}

impl fmt::Debug for Publisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|s| s.name()).collect();
        f.debug_struct("Publisher").field("sinks", &names).finish()
    }
}

impl Publisher {
    /// Create a publisher over an explicit list of sinks.
    pub fn new(sinks: Vec<Box<dyn MetricSink>>) -> Self {
        Self { sinks }
    }

    /// Build the publisher from sink configuration.
    pub fn from_config(config: &SinksConfig) -> Result<Self> {
        Ok(Self::new(build_sinks(config)?))
    }

    /// Number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Publish a batch to every sink.
    ///
    /// Returns per-sink statistics and logs errors.
    pub async fn publish(&self, batch: &Batch) -> PublishStats {
        let mut stats = PublishStats::default();

        for sink in &self.sinks {
            match sink.write(batch).await {
                Ok(written) => {
                    stats.success += 1;
                    stats.metrics_written += written;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!(sink = sink.name(), error = %e, "Failed to write metrics");
                }
            }
        }

        stats
    }
}

/// Statistics from a publish operation.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishStats {
    /// Number of sinks that accepted the batch.
    pub success: usize,
    /// Number of sinks that failed.
    pub failed: usize,
    /// Sum of metrics reported written by the sinks.
    pub metrics_written: usize,
}

impl PublishStats {
    /// Total number of attempted sink writes.
    pub fn total(&self) -> usize {
        self.success + self.failed
    }

    /// Success rate as a percentage.
    pub fn success_rate(&self) -> f64 {
        if self.total() == 0 {
            100.0
        } else {
            (self.success as f64 / self.total() as f64) * 100.0
        }
    }
}
