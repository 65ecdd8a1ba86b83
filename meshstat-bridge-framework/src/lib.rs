//! meshstat Bridge Framework
//!
//! Common abstractions for building bridges that poll telemetry sources and
//! push flat metric batches to Graphite and textfile sinks.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`Collector`] trait for one poll cycle's worth of data gathering
//! - [`BridgeRunner`] for the poll loop (startup, fixed delay, shutdown)
//! - [`Publisher`] for fanning batches out to every configured sink
//! - [`BridgeArgs`] for common CLI argument parsing
//!
//! # Example
//!
//! ```ignore
//! use meshstat_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse_with_default("mybridge.json5");
//!     let config = MyBridgeConfig::load(&args.config)?;
//!
//!     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
//!     let collector = MyCollector::new(&runner.config().my_section);
//!
//!     // Run until Ctrl+C
//!     runner.run(collector).await
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;

pub use args::BridgeArgs;
pub use config::BridgeConfig;
pub use error::{BridgeError, Result};
pub use publisher::{PublishStats, Publisher};
pub use runner::{BridgeRunner, Collector};

// Re-export commonly used types
pub use async_trait::async_trait;
pub use meshstat_common::{Batch, LoggingConfig, MetricMap, MetricValue};
pub use meshstat_sink::SinksConfig;
