//! Configuration types.

use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use trellis_core::{
    Executor, Provider, RequestExecutorsProvider, ResponseExecutorsProvider, RuntimeExecutor,
};
use trellis_telemetry::LogConfig;

/// Complete Trellis configuration.
///
/// # Example
///
/// ```
/// use trellis_config::{ExecutorKind, TrellisConfig};
///
/// let config = TrellisConfig::default();
/// assert_eq!(config.server.base_path, "/");
/// assert_eq!(config.executors.requesting, ExecutorKind::Inline);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct TrellisConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Client configuration.
    #[serde(default)]
    pub client: ClientConfig,

    /// Executor selection for both phases.
    #[serde(default)]
    pub executors: ExecutorsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LogConfig,
}

impl TrellisConfig {
    /// Creates a development preset with pretty debug logs and error details.
    #[must_use]
    pub fn development() -> Self {
        Self {
            server: ServerConfig {
                include_error_details: true,
                ..ServerConfig::default()
            },
            logging: LogConfig::development(),
            ..Self::default()
        }
    }

    /// Creates a production preset with JSON logs.
    #[must_use]
    pub fn production() -> Self {
        Self {
            logging: LogConfig::production(),
            ..Self::default()
        }
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.server.base_path.starts_with('/') {
            return Err(ConfigError::invalid_value(
                "server.base_path",
                format!("must start with '/': {}", self.server.base_path),
            ));
        }

        if self.server.suspend_timeout_ms == Some(0) {
            return Err(ConfigError::invalid_value(
                "server.suspend_timeout_ms",
                "must be greater than zero",
            ));
        }

        for accept in &self.client.default_accept {
            if accept.parse::<mime::Mime>().is_err() {
                return Err(ConfigError::invalid_value(
                    "client.default_accept",
                    format!("invalid media type: {accept}"),
                ));
            }
        }

        if self.logging.enabled && self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid_value("logging.level", "must not be empty"));
        }

        Ok(())
    }
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Path prefix under which the application is mounted.
    pub base_path: String,

    /// Whether error responses carry the full error message.
    pub include_error_details: bool,

    /// Default timeout for suspended requests, in milliseconds.
    pub suspend_timeout_ms: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_path: "/".to_string(),
            include_error_details: false,
            suspend_timeout_ms: None,
        }
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// Media types accepted when a request does not name any.
    pub default_accept: Vec<String>,

    /// Free-form properties visible through the client configuration.
    pub properties: BTreeMap<String, String>,
}

/// Where a processing phase runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutorKind {
    /// On the caller's task.
    #[default]
    Inline,
    /// Spawned onto the current Tokio runtime.
    Runtime,
}

impl ExecutorKind {
    fn executor(self, field: &str) -> Result<Option<Arc<dyn Executor>>, ConfigError> {
        match self {
            Self::Inline => Ok(None),
            Self::Runtime => RuntimeExecutor::try_current()
                .map(|executor| Some(Arc::new(executor) as Arc<dyn Executor>))
                .ok_or_else(|| {
                    ConfigError::invalid_value(field, "runtime executor requires a Tokio runtime")
                }),
        }
    }
}

/// Executor selection for the requesting and responding phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorsConfig {
    /// Executor running the stage chain.
    pub requesting: ExecutorKind,

    /// Executor delivering outcomes.
    pub responding: ExecutorKind,
}

impl ExecutorsConfig {
    /// Turns the configuration into an executor provider.
    ///
    /// Only phases configured as [`ExecutorKind::Runtime`] are exposed; an
    /// all-inline configuration yields `None` since inline is the default.
    /// Must be called from within a Tokio runtime if any phase uses it.
    pub fn provider(&self) -> Result<Option<ConfiguredExecutors>, ConfigError> {
        let requesting = self.requesting.executor("executors.requesting")?;
        let responding = self.responding.executor("executors.responding")?;

        if requesting.is_none() && responding.is_none() {
            return Ok(None);
        }

        Ok(Some(ConfiguredExecutors {
            requesting,
            responding,
        }))
    }
}

/// An executor provider built from [`ExecutorsConfig`].
#[derive(Debug, Clone)]
pub struct ConfiguredExecutors {
    requesting: Option<Arc<dyn Executor>>,
    responding: Option<Arc<dyn Executor>>,
}

impl RequestExecutorsProvider for ConfiguredExecutors {
    fn requesting_executor(&self) -> Arc<dyn Executor> {
        self.requesting
            .clone()
            .unwrap_or_else(|| Arc::new(trellis_core::InlineExecutor))
    }
}

impl ResponseExecutorsProvider for ConfiguredExecutors {
    fn responding_executor(&self) -> Arc<dyn Executor> {
        self.responding
            .clone()
            .unwrap_or_else(|| Arc::new(trellis_core::InlineExecutor))
    }
}

impl Provider for ConfiguredExecutors {
    fn name(&self) -> &str {
        "configured-executors"
    }

    fn as_request_executors(&self) -> Option<&dyn RequestExecutorsProvider> {
        self.requesting.as_ref().map(|_| self as &dyn RequestExecutorsProvider)
    }

    fn as_response_executors(&self) -> Option<&dyn ResponseExecutorsProvider> {
        self.responding.as_ref().map(|_| self as &dyn ResponseExecutorsProvider)
    }
}
