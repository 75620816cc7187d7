use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::validation::middleware::DEFAULT_BODY_LIMIT;
use crate::validation::Location;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub validation: ValidationConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// YAML or JSON schema served on `/api/validate`.
    pub schema_path: Option<PathBuf>,
    pub default_locations: Vec<Location>,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `pretty` or `json`.
    pub format: String,
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
            shutdown_timeout_seconds: 10,
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            schema_path: None,
            default_locations: Location::ALL.to_vec(),
            max_body_bytes: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: "pretty".to_string(),
            level: "info".to_string(),
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let file = std::path::Path::new("config.toml")
            .exists()
            .then(|| PathBuf::from("config.toml"));
        Self::load_from(file)
    }

    /// Defaults, then `file` when given, then `APP__SECTION__KEY` variables.
    pub fn load_from(file: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .add_source(Config::try_from(&AppConfig::default())?);

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        builder = builder.add_source(
            Environment::with_prefix("APP")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let app_config: AppConfig = config.try_deserialize()?;

        app_config.validate()?;

        Ok(app_config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port cannot be 0".to_string()));
        }

        if self.validation.max_body_bytes == 0 {
            return Err(ConfigError::Message(
                "Max body bytes must be greater than 0".to_string(),
            ));
        }

        if self.validation.default_locations.is_empty() {
            return Err(ConfigError::Message(
                "At least one default location is required".to_string(),
            ));
        }

        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::Message(format!(
                "Unknown log format '{}', expected 'pretty' or 'json'",
                self.logging.format
            )));
        }

        if let Some(path) = &self.validation.schema_path {
            if !path.exists() {
                tracing::warn!(path = %path.display(), "configured schema file does not exist");
            }
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.validation.default_locations, Location::ALL.to_vec());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.port = 0;
        assert!(config.validate().is_err());

        config.server.port = 3000;
        config.validation.max_body_bytes = 0;
        assert!(config.validate().is_err());

        config.validation.max_body_bytes = 1024;
        config.validation.default_locations.clear();
        assert!(config.validate().is_err());

        config.validation.default_locations = vec![Location::Body];
        config.logging.format = "xml".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_bind_address() {
        let config = AppConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:3000");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[server]\nport = 8081\n\n[validation]\ndefault_locations = [\"query\", \"body\"]\nmax_body_bytes = 2048\n"
        )
        .unwrap();

        let config = AppConfig::load_from(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(config.server.port, 8081);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.validation.default_locations, vec![Location::Query, Location::Body]);
        assert_eq!(config.validation.max_body_bytes, 2048);
        assert_eq!(config.logging.level, "info");
    }
}
