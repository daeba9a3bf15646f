//! Typed configuration for Trellis.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides (`TRELLIS__SECTION__KEY`)
//! - Strict parsing that fails on unknown fields
//! - Layering: defaults, then file, then environment
//!
//! # Configuration File Format
//!
//! ```toml
//! [server]
//! base_path = "/api"
//! include_error_details = false
//! suspend_timeout_ms = 30000
//!
//! [client]
//! default_accept = ["application/json"]
//!
//! [client.properties]
//! user_agent = "trellis"
//!
//! [executors]
//! requesting = "inline"
//! responding = "runtime"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```

#![doc(html_root_url = "https://docs.rs/trellis-config/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config;
mod error;
mod loader;

pub use config::{
    ClientConfig, ConfiguredExecutors, ExecutorKind, ExecutorsConfig, ServerConfig, TrellisConfig,
};
pub use error::ConfigError;
pub use loader::{ConfigLoader, DEFAULT_ENV_PREFIX};
pub use trellis_telemetry::{LogConfig, LogFormat};
