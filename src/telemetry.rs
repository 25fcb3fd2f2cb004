//! Tracing subscriber setup
//!
//! The library only emits `tracing` events. Binaries embedding it can install
//! a subscriber with [`init_subscriber`].
//!
//! ## Example
//!
//! ```rust,ignore
//! use gcp_base_hook::telemetry::{init_subscriber, OutputFormat, SubscriberConfig};
//!
//! init_subscriber(
//!     SubscriberConfig::builder()
//!         .log_level(tracing::Level::DEBUG)
//!         .output_format(OutputFormat::Json)
//!         .build(),
//! )?;
//! ```

use tracing_subscriber::EnvFilter;

use crate::error::{HookError, Result};

/// Output format for tracing logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable text format
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Configuration for tracing subscriber
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    /// Log level used when `RUST_LOG` is unset
    pub log_level: tracing::Level,
    /// Output format
    pub output_format: OutputFormat,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            output_format: OutputFormat::Text,
        }
    }
}

impl SubscriberConfig {
    /// Create a new builder for SubscriberConfig
    pub fn builder() -> SubscriberConfigBuilder {
        SubscriberConfigBuilder::default()
    }

    /// Create a debug configuration
    pub fn debug() -> Self {
        Self {
            log_level: tracing::Level::DEBUG,
            output_format: OutputFormat::Text,
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.log_level.to_string().to_lowercase()))
    }
}

/// Builder for SubscriberConfig
#[derive(Debug, Default)]
pub struct SubscriberConfigBuilder {
    log_level: Option<tracing::Level>,
    output_format: Option<OutputFormat>,
}

impl SubscriberConfigBuilder {
    /// Set the log level
    pub fn log_level(mut self, level: tracing::Level) -> Self {
        self.log_level = Some(level);
        self
    }

    /// Set the log level from a string
    pub fn log_level_str(mut self, level: &str) -> Result<Self> {
        let level = level.parse::<tracing::Level>().map_err(|_| {
            HookError::TelemetryInit(format!(
                "Invalid log level: {level}. Valid options: trace, debug, info, warn, error"
            ))
        })?;
        self.log_level = Some(level);
        Ok(self)
    }

    /// Set the output format
    pub fn output_format(mut self, format: OutputFormat) -> Self {
        self.output_format = Some(format);
        self
    }

    /// Build the configuration
    pub fn build(self) -> SubscriberConfig {
        let default = SubscriberConfig::default();
        SubscriberConfig {
            log_level: self.log_level.unwrap_or(default.log_level),
            output_format: self.output_format.unwrap_or(default.output_format),
        }
    }
}

/// Install a global `tracing-subscriber` fmt subscriber.
///
/// Fails if a global subscriber is already set.
pub fn init_subscriber(config: SubscriberConfig) -> Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(config.env_filter());
    let res = match config.output_format {
        OutputFormat::Text => builder.try_init(),
        OutputFormat::Json => builder.json().try_init(),
    };
    res.map_err(|e| HookError::TelemetryInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_to_info_text() {
        let config = SubscriberConfig::builder().build();
        assert_eq!(config.log_level, tracing::Level::INFO);
        assert_eq!(config.output_format, OutputFormat::Text);
    }

    #[test]
    fn log_level_str_parses_and_rejects() {
        let config = SubscriberConfig::builder()
            .log_level_str("debug")
            .unwrap()
            .output_format(OutputFormat::Json)
            .build();
        assert_eq!(config.log_level, tracing::Level::DEBUG);
        assert_eq!(config.output_format, OutputFormat::Json);

        assert!(matches!(
            SubscriberConfig::builder().log_level_str("loud"),
            Err(HookError::TelemetryInit(_))
        ));
    }
}
