//! Service configuration

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Default config file, without extension
pub const DEFAULT_CONFIG_PATH: &str = "config/default";

/// Prefix for environment overrides, e.g. `POTABILITY__MODEL__PATH`
pub const ENV_PREFIX: &str = "POTABILITY";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub model: ModelConfig,
    pub inference: InferenceConfig,
    pub logging: LoggingConfig,
}

/// HTTP listener
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Model artifact location and hot reload
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Path to the ensemble artifact
    pub path: PathBuf,
    /// Seconds between artifact checks; 0 disables the watcher
    pub reload_interval_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/water_potability.json"),
            reload_interval_secs: 30,
        }
    }
}

impl ModelConfig {
    pub fn reload_interval(&self) -> Option<Duration> {
        (self.reload_interval_secs > 0).then(|| Duration::from_secs(self.reload_interval_secs))
    }
}

/// Per-request inference limits
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    /// Deadline for one classification (ms)
    pub timeout_ms: u64,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self { timeout_ms: 250 }
    }
}

impl InferenceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

impl ServiceConfig {
    /// Load from the default config file plus environment overrides
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load from a specific file (optional) plus environment overrides
    pub fn load_from(path: &str) -> Result<Self, ConfigError> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: &str, env: Environment) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name(path).required(false))
            .add_source(env.separator("__").try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8000");
        assert_eq!(config.model.path, PathBuf::from("models/water_potability.json"));
        assert_eq!(config.model.reload_interval(), Some(Duration::from_secs(30)));
        assert_eq!(config.inference.timeout(), Duration::from_millis(250));
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_zero_interval_disables_watcher() {
        let model = ModelConfig {
            reload_interval_secs: 0,
            ..Default::default()
        };
        assert_eq!(model.reload_interval(), None);
    }

    #[test]
    fn test_load_from_file_fills_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[model]\npath = \"/srv/models/rf.json\"").unwrap();
        writeln!(file, "\n[logging]\nformat = \"json\"").unwrap();

        let config = ServiceConfig::load_from(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.model.path, PathBuf::from("/srv/models/rf.json"));
        assert_eq!(config.model.reload_interval_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_missing_file_is_not_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let config = ServiceConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.model.path, PathBuf::from("models/water_potability.json"));
    }

    fn environment(vars: &[(&str, &str)]) -> Environment {
        let vars: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(vars))
    }

    #[test]
    fn test_environment_override() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent");
        let env = environment(&[
            ("POTABILITY__SERVER__PORT", "9100"),
            ("POTABILITY__MODEL__PATH", "/srv/models/rf.json"),
            ("OTHER__SERVER__PORT", "1"),
        ]);

        let config = ServiceConfig::load_with_env(path.to_str().unwrap(), env).unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.model.path, PathBuf::from("/srv/models/rf.json"));
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn test_environment_overrides_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[inference]\ntimeout_ms = 100").unwrap();
        let env = environment(&[("POTABILITY__INFERENCE__TIMEOUT_MS", "900")]);

        let config = ServiceConfig::load_with_env(file.path().to_str().unwrap(), env).unwrap();
        assert_eq!(config.inference.timeout(), Duration::from_millis(900));
    }
}
