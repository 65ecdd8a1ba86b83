//! Configuration traits and utilities.

use std::path::Path;
use std::time::Duration;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{LoggingConfig, SinksConfig};

/// Trait for bridge configuration types.
///
/// Implement this trait for your bridge's configuration struct to get
/// automatic loading, validation, and access to common config fields.
///
/// # Example
///
/// ```ignore
/// use serde::Deserialize;
/// use meshstat_bridge_framework::{BridgeConfig, LoggingConfig, SinksConfig};
///
/// #[derive(Debug, Deserialize)]
/// pub struct MyBridgeConfig {
///     pub logging: LoggingConfig,
///     pub sinks: SinksConfig,
///     pub poll_interval_secs: u64,
/// }
///
/// impl BridgeConfig for MyBridgeConfig {
///     fn logging(&self) -> &LoggingConfig {
///         &self.logging
///     }
///
///     fn sinks(&self) -> &SinksConfig {
///         &self.sinks
///     }
///
///     fn poll_interval(&self) -> Duration {
///         Duration::from_secs(self.poll_interval_secs)
///     }
/// }
/// ```
pub trait BridgeConfig: Sized + DeserializeOwned {
    /// Get the logging configuration.
    fn logging(&self) -> &LoggingConfig;

    /// Get the sink configuration.
    fn sinks(&self) -> &SinksConfig;

    /// Fixed delay between the end of one poll cycle and the next.
    fn poll_interval(&self) -> Duration;

    /// Configured source hostname, if this bridge reports per host.
    ///
    /// `"auto"` is resolved by the runner at the start of every cycle.
    fn source(&self) -> Option<&str> {
        None
    }

    /// Validate the configuration.
    ///
    /// Called automatically after loading. Override to add custom validation.
    fn validate(&self) -> Result<()> {
        Ok(())
    }

    /// Load configuration from a file path.
    ///
    /// Supports JSON5 format. Validates the sinks and calls
    /// [`validate`](Self::validate) after loading.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate configuration from a JSON5 string.
    fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;

        config
            .sinks()
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))?;
        if config.poll_interval().is_zero() {
            return Err(BridgeError::validation("poll_interval_secs must be > 0"));
        }
        config.validate()?;

        Ok(config)
    }
}
