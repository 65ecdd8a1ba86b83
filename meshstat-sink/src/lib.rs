//! Metric sinks for meshstat.
//!
//! A sink takes one poll cycle's [`Batch`] and pushes it somewhere:
//!
//! ```text
//!                    ┌──────────────────┐
//!               ┌───>│  GraphiteSink    │──> TCP  "<prefix>.<host>.<key> <value> <ts>\n"
//! ┌─────────┐   │    └──────────────────┘
//! │  Batch  │───┤
//! └─────────┘   │    ┌──────────────────┐
//!               └───>│  TextfileSink    │──> file "<name>{<label>=\"..\"} <value>"
//!                    └──────────────────┘
//! ```
//!
//! # Configuration
//!
//! See [`config::SinksConfig`] for configuration options.

pub mod config;
pub mod graphite;
pub mod mapping;
pub mod relabel;
pub mod textfile;

use async_trait::async_trait;
use thiserror::Error;

use meshstat_common::Batch;

pub use config::{GraphiteConfig, SinksConfig, TextfileConfig};
pub use graphite::GraphiteSink;
pub use relabel::{RelabelRules, Relabeled};
pub use textfile::TextfileSink;

/// Errors raised by sinks.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Sink configuration error: {0}")]
    Config(String),

    #[error("Invalid relabel rule '{pattern}': {message}")]
    Rule { pattern: String, message: String },

    #[error("Timed out after {secs}s talking to {target}")]
    Timeout { target: String, secs: u64 },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`SinkError`].
pub type Result<T> = std::result::Result<T, SinkError>;

/// Destination for flat metric batches.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Short name used in log messages.
    fn name(&self) -> &str;

    /// Write one batch. Returns the number of metrics written.
    async fn write(&self, batch: &Batch) -> Result<usize>;
}

/// Build every sink enabled in the configuration.
pub fn build_sinks(config: &SinksConfig) -> Result<Vec<Box<dyn MetricSink>>> {
    let mut sinks: Vec<Box<dyn MetricSink>> = Vec::new();

    if let Some(graphite) = &config.graphite {
        sinks.push(Box::new(GraphiteSink::new(graphite.clone())));
    }

    if let Some(textfile) = &config.textfile {
        sinks.push(Box::new(TextfileSink::new(textfile.clone())?));
    }

    Ok(sinks)
}
