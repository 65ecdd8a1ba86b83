//! Bridge runner for lifecycle management.

use std::time::Instant;

use async_trait::async_trait;

use meshstat_common::{Batch, LoggingConfig, MetricMap, init_tracing, resolve_hostname};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::{PublishStats, Publisher};

/// One data-gathering pass of a bridge.
///
/// Implementations fetch their sources and return the merged metric
/// mapping. Per-source failures should be absorbed inside `collect`; an
/// error returned here abandons the whole cycle.
#[async_trait]
pub trait Collector: Send {
    async fn collect(&mut self) -> anyhow::Result<MetricMap>;
}

/// Bridge runner that manages the lifecycle of a bridge.
///
/// Handles:
/// - Logging initialization
/// - Sink construction
/// - The poll loop with a fixed delay between cycles
/// - Isolation of failed cycles
/// - Graceful shutdown on Ctrl+C / SIGTERM
///
/// # Example
///
/// ```ignore
/// use meshstat_bridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let args = BridgeArgs::parse_with_default("mybridge.json5");
///     let config = MyBridgeConfig::load(&args.config)?;
///
///     let runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))?;
///     let collector = MyCollector::new(runner.config());
///
///     runner.run(collector).await
/// }
/// ```
pub struct BridgeRunner<C: BridgeConfig> {
    /// Bridge name for logging.
    name: String,
    /// Bridge version.
    version: String,
    /// The loaded configuration.
    config: C,
    /// Fan-out to the sinks.
    publisher: Publisher,
    /// Stop after the first cycle.
    once: bool,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Create a new bridge runner.
    pub fn new(name: impl Into<String>, config: C) -> Result<Self> {
        Self::new_with_args(name, config, None)
    }

    /// Create a new bridge runner with CLI args for log level override.
    ///
    /// This will:
    /// 1. Initialize logging based on config (with optional CLI override)
    /// 2. Build the configured sinks
    pub fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let name = name.into();

        let log_config = match args.and_then(|a| a.log_level.as_ref()) {
            Some(level) => LoggingConfig {
                level: level.clone(),
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        let publisher = Publisher::from_config(config.sinks())?;

        let mut runner = Self::with_publisher(name, config, publisher);
        runner.once = args.is_some_and(|a| a.once);

        tracing::info!(
            bridge = %runner.name,
            version = %runner.version,
            sinks = runner.publisher.len(),
            "Starting bridge"
        );

        Ok(runner)
    }

    /// Create a runner around an existing publisher.
    ///
    /// Does not touch global logging state.
    pub fn with_publisher(name: impl Into<String>, config: C, publisher: Publisher) -> Self {
        Self {
            name: name.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            config,
            publisher,
            once: false,
        }
    }

    /// Run a single cycle and stop.
    pub fn once(mut self, once: bool) -> Self {
        self.once = once;
        self
    }

    /// Get the bridge name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get the bridge version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get a reference to the configuration.
    pub fn config(&self) -> &C {
        &self.config
    }

    /// Resolve the source hostname for the current cycle.
    pub fn current_source(&self) -> Option<String> {
        self.config.source().map(resolve_hostname)
    }

    /// Collect once and publish the result.
    pub async fn run_cycle<K: Collector>(&self, collector: &mut K) -> Result<PublishStats> {
        let started = Instant::now();

        let metrics = collector
            .collect()
            .await
            .map_err(|e| BridgeError::Collect(format!("{:#}", e)))?;

        let batch = Batch::new(self.current_source(), metrics);
        let stats = self.publisher.publish(&batch).await;

        tracing::debug!(
            bridge = %self.name,
            metrics = batch.len(),
            sinks_ok = stats.success,
            sinks_failed = stats.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cycle complete"
        );

        Ok(stats)
    }

    /// Run the poll loop until Ctrl+C or SIGTERM is received.
    ///
    /// A failed cycle is logged and the loop continues after the usual
    /// delay.
    pub async fn run<K: Collector>(self, mut collector: K) -> anyhow::Result<()> {
        let interval = self.config.poll_interval();

        tracing::info!(
            bridge = %self.name,
            interval_secs = interval.as_secs(),
            once = self.once,
            "Bridge running. Press Ctrl+C to stop."
        );

        loop {
            if let Err(e) = self.run_cycle(&mut collector).await {
                tracing::error!(bridge = %self.name, error = %e, "Poll cycle failed");
            }

            if self.once {
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_signal() => {
                    tracing::info!(bridge = %self.name, "Received shutdown signal");
                    break;
                }
            }
        }

        tracing::info!(bridge = %self.name, "Goodbye!");
        Ok(())
    }
}

/// Resolves when Ctrl+C or (on Unix) SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshstat_common::MetricValue;
    use meshstat_sink::{TextfileConfig, TextfileSink};
    use serde::Deserialize;
    use std::time::Duration;

    use crate::{LoggingConfig, SinksConfig};

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        #[serde(default)]
        logging: LoggingConfig,
        #[serde(default)]
        sinks: SinksConfig,
        source: Option<String>,
    }

    impl BridgeConfig for TestConfig {
        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }

        fn sinks(&self) -> &SinksConfig {
            &self.sinks
        }

        fn poll_interval(&self) -> Duration {
            Duration::from_secs(1)
        }

        fn source(&self) -> Option<&str> {
            self.source.as_deref()
        }
    }

    struct FixedCollector {
        calls: usize,
    }

    #[async_trait]
    impl Collector for FixedCollector {
        async fn collect(&mut self) -> anyhow::Result<MetricMap> {
            self.calls += 1;
            let mut metrics = MetricMap::new();
            metrics.insert("fastd.0.drops".to_string(), MetricValue::Counter(4));
            Ok(metrics)
        }
    }

    struct FailingCollector;

    #[async_trait]
    impl Collector for FailingCollector {
        async fn collect(&mut self) -> anyhow::Result<MetricMap> {
            anyhow::bail!("Invalid version: 7")
        }
    }

    fn runner_writing_to(path: &std::path::Path) -> BridgeRunner<TestConfig> {
        let sink = TextfileSink::new(TextfileConfig {
            path: path.to_path_buf(),
            ..TextfileConfig::default()
        })
        .unwrap();

        let config = TestConfig {
            logging: LoggingConfig::default(),
            sinks: SinksConfig::default(),
            source: Some("gw01.darmstadt.freifunk.net".to_string()),
        };

        BridgeRunner::with_publisher("test", config, Publisher::new(vec![Box::new(sink)]))
    }

    #[tokio::test]
    async fn test_run_cycle_publishes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.prom");
        let runner = runner_writing_to(&path);

        let mut collector = FixedCollector { calls: 0 };
        let stats = runner.run_cycle(&mut collector).await.unwrap();

        assert_eq!(stats.success, 1);
        assert_eq!(stats.metrics_written, 1);
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "ffda_fastd_drops{fast_instance=\"0\"} 4\n"
        );
    }

    #[tokio::test]
    async fn test_run_cycle_collect_error() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_writing_to(&dir.path().join("out.prom"));

        let result = runner.run_cycle(&mut FailingCollector).await;
        assert!(matches!(result, Err(BridgeError::Collect(msg)) if msg.contains("Invalid version")));
    }

    #[tokio::test]
    async fn test_run_once_survives_failed_cycle() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_writing_to(&dir.path().join("out.prom")).once(true);

        runner.run(FailingCollector).await.unwrap();
    }

    #[test]
    fn test_current_source_truncated() {
        let dir = tempfile::tempdir().unwrap();
        let runner = runner_writing_to(&dir.path().join("out.prom"));
        assert_eq!(runner.current_source(), Some("gw01".to_string()));
    }
}
