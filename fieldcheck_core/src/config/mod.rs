//! Layered application configuration.

mod settings;

pub use settings::{AppConfig, LoggingConfig, ServerConfig, ValidationConfig};
