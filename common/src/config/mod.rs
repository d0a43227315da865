use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8081;
pub const DEFAULT_MODEL_PATH: &str = "models/catboost_churn_model.json";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_model_path() -> String {
    DEFAULT_MODEL_PATH.to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
        }
    }
}

impl ServiceConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_toml(&config_str)
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        toml::from_str(config_str).with_context(|| "Failed to parse config file")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults_for_empty_file() -> Result<()> {
        let config = ServiceConfig::from_toml("")?;
        assert_eq!(config, ServiceConfig::default());
        assert_eq!(config.bind_addr(), "0.0.0.0:8081");
        Ok(())
    }

    #[test]
    fn test_load_config_file() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        writeln!(
            file,
            r#"
[server]
host = "127.0.0.1"
port = 9090

[model]
path = "/srv/models/churn.json"
"#
        )?;

        let config = ServiceConfig::from_file(file.path())?;
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.model.path, "/srv/models/churn.json");
        Ok(())
    }

    #[test]
    fn test_partial_section_keeps_defaults() -> Result<()> {
        let config = ServiceConfig::from_toml("[server]\nport = 1234\n")?;
        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, 1234);
        assert_eq!(config.model.path, DEFAULT_MODEL_PATH);
        Ok(())
    }

    #[test]
    fn test_missing_and_invalid_file() {
        assert!(ServiceConfig::from_file("/nonexistent/churn.toml").is_err());
        assert!(ServiceConfig::from_toml("[server]\nport = \"abc\"\n").is_err());
    }
}
