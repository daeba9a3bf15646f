//! Layered configuration loading.

use std::env;
use std::fs;
use std::path::Path;

use crate::{ConfigError, ExecutorKind, TrellisConfig};
use trellis_telemetry::LogFormat;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "TRELLIS";

/// Configuration loader.
///
/// Later layers override earlier ones:
/// 1. Default values
/// 2. Configuration file (TOML or JSON)
/// 3. Environment variables
///
/// # Example
///
/// ```no_run
/// use trellis_config::ConfigLoader;
///
/// # fn main() -> Result<(), trellis_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_dotenv()
///     .with_optional_file("trellis.toml")?
///     .with_env_prefix("TRELLIS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ConfigLoader {
    config: TrellisConfig,
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Creates a loader starting from the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from the development preset.
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = TrellisConfig::development();
        self
    }

    /// Starts from the production preset.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = TrellisConfig::production();
        self
    }

    /// Loads a configuration file.
    ///
    /// The format is chosen by the `.toml` or `.json` extension.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat {
                format: path.display().to_string(),
            })?;

        self.config = parse(&content, &format)?;
        tracing::debug!(path = %path.display(), "configuration file loaded");
        Ok(self)
    }

    /// Loads a configuration file if it exists.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Loads configuration from a string in the given format.
    ///
    /// # Example
    ///
    /// ```
    /// use trellis_config::{ConfigLoader, ExecutorKind};
    ///
    /// let toml = r#"
    ///     [server]
    ///     base_path = "/api"
    ///
    ///     [executors]
    ///     responding = "runtime"
    /// "#;
    ///
    /// let config = ConfigLoader::new().with_string(toml, "toml").unwrap().load().unwrap();
    /// assert_eq!(config.server.base_path, "/api");
    /// assert_eq!(config.executors.responding, ExecutorKind::Runtime);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Sets the prefix of environment variable overrides.
    ///
    /// Variables use the form `PREFIX__SECTION__KEY`, for example
    /// `TRELLIS__SERVER__BASE_PATH=/api`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Loads a `.env` file into the process environment if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), ".env file loaded");
        }
        self
    }

    /// Applies environment overrides and validates the result.
    pub fn load(mut self) -> Result<TrellisConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env(&prefix, env::vars())?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Returns the configuration without overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> TrellisConfig {
        self.config
    }

    fn apply_env(
        &mut self,
        prefix: &str,
        vars: impl IntoIterator<Item = (String, String)>,
    ) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        for (key, value) in vars {
            if let Some(path) = key.strip_prefix(&marker) {
                let parts: Vec<&str> = path.split("__").collect();
                self.apply_env_var(&key, &parts, &value)?;
            }
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, parts: &[&str], value: &str) -> Result<(), ConfigError> {
        let config = &mut self.config;
        match parts {
            ["SERVER", "BASE_PATH"] => config.server.base_path = value.to_string(),
            ["SERVER", "INCLUDE_ERROR_DETAILS"] => {
                config.server.include_error_details = parse_bool(key, value)?;
            }
            ["SERVER", "SUSPEND_TIMEOUT_MS"] => {
                config.server.suspend_timeout_ms = if value.eq_ignore_ascii_case("none") {
                    None
                } else {
                    Some(value.parse().map_err(|_| {
                        ConfigError::env_parse_error(key, "expected integer or 'none'")
                    })?)
                };
            }

            ["CLIENT", "DEFAULT_ACCEPT"] => {
                config.client.default_accept = value
                    .split(',')
                    .map(str::trim)
                    .filter(|accept| !accept.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            ["CLIENT", "PROPERTIES", name] => {
                config
                    .client
                    .properties
                    .insert(name.to_lowercase(), value.to_string());
            }

            ["EXECUTORS", "REQUESTING"] => config.executors.requesting = parse_executor(key, value)?,
            ["EXECUTORS", "RESPONDING"] => config.executors.responding = parse_executor(key, value)?,

            ["LOGGING", "ENABLED"] => config.logging.enabled = parse_bool(key, value)?,
            ["LOGGING", "LEVEL"] => config.logging.level = value.to_string(),
            ["LOGGING", "FORMAT"] => {
                config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => return Err(ConfigError::env_parse_error(key, "expected 'json' or 'pretty'")),
                };
            }

            _ => tracing::debug!(var = key, "ignoring unknown configuration variable"),
        }
        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<TrellisConfig, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat {
            format: other.to_string(),
        }),
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::env_parse_error(key, "expected boolean")),
    }
}

fn parse_executor(key: &str, value: &str) -> Result<ExecutorKind, ConfigError> {
    match value.to_lowercase().as_str() {
        "inline" => Ok(ExecutorKind::Inline),
        "runtime" => Ok(ExecutorKind::Runtime),
        _ => Err(ConfigError::env_parse_error(key, "expected 'inline' or 'runtime'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_loader_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config, TrellisConfig::default());
    }

    #[test]
    fn test_loader_with_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            r#"
            [server]
            base_path = "/api"
            include_error_details = true

            [logging]
            level = "warn"
            format = "pretty"
            "#
        )
        .unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.server.base_path, "/api");
        assert!(config.server.include_error_details);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_loader_with_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"client": {{"default_accept": ["application/json"]}}}}"#).unwrap();

        let config = ConfigLoader::new().with_file(file.path()).unwrap().load().unwrap();
        assert_eq!(config.client.default_accept, vec!["application/json"]);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result = ConfigLoader::new().with_string("[server]\nport = 80\n", "toml");
        assert!(matches!(result, Err(ConfigError::TomlError(_))));
    }

    #[test]
    fn test_unsupported_format() {
        let file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        assert!(matches!(
            ConfigLoader::new().with_file(file.path()),
            Err(ConfigError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn test_file_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");

        assert!(matches!(
            ConfigLoader::new().with_file(&missing),
            Err(ConfigError::FileNotFound { .. })
        ));
        assert!(ConfigLoader::new().with_optional_file(&missing).is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut loader = ConfigLoader::new();
        loader
            .apply_env(
                "TRELLIS",
                vars(&[
                    ("TRELLIS__SERVER__BASE_PATH", "/v2"),
                    ("TRELLIS__SERVER__SUSPEND_TIMEOUT_MS", "1500"),
                    ("TRELLIS__EXECUTORS__REQUESTING", "runtime"),
                    ("TRELLIS__CLIENT__DEFAULT_ACCEPT", "application/json, text/plain"),
                    ("TRELLIS__CLIENT__PROPERTIES__USER_AGENT", "trellis-test"),
                    ("TRELLIS__LOGGING__ENABLED", "off"),
                    ("OTHER__SERVER__BASE_PATH", "/ignored"),
                ]),
            )
            .unwrap();

        let config = loader.load_unvalidated();
        assert_eq!(config.server.base_path, "/v2");
        assert_eq!(config.server.suspend_timeout_ms, Some(1500));
        assert_eq!(config.executors.requesting, ExecutorKind::Runtime);
        assert_eq!(config.client.default_accept, vec!["application/json", "text/plain"]);
        assert_eq!(
            config.client.properties.get("user_agent").map(String::as_str),
            Some("trellis-test")
        );
        assert!(!config.logging.enabled);
    }

    #[test]
    fn test_env_invalid_value() {
        let mut loader = ConfigLoader::new();
        let result = loader.apply_env(
            "TRELLIS",
            vars(&[("TRELLIS__EXECUTORS__RESPONDING", "threadpool")]),
        );
        assert!(matches!(result, Err(ConfigError::EnvParseError { .. })));
    }

    #[test]
    fn test_validation_runs_on_load() {
        let result = ConfigLoader::new()
            .with_string("[server]\nbase_path = \"api\"\n", "toml")
            .unwrap()
            .load();
        assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
    }
}
