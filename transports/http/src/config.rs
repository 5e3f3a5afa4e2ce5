//! Configuration for the pipehost HTTP server
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use pipehost_core::DispatchOptions;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the pipehost HTTP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Dispatcher configuration
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

impl ServerConfig {
    /// Bind address string ("host:port")
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    /// Invocation deadline in seconds; 0 disables the timeout
    #[serde(default = "default_invoke_timeout")]
    pub invoke_timeout_seconds: u64,

    /// Concurrency ceiling for batch calls without a per-request override
    #[serde(default = "default_batch_concurrency")]
    pub batch_max_concurrency: usize,

    /// Capacity of the channel between a stream producer and its consumer
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
}

fn default_invoke_timeout() -> u64 {
    60
}

fn default_batch_concurrency() -> usize {
    8
}

fn default_stream_buffer() -> usize {
    32
}

impl DispatchConfig {
    /// Convert into dispatcher options
    pub fn options(&self) -> DispatchOptions {
        DispatchOptions {
            invoke_timeout: (self.invoke_timeout_seconds > 0)
                .then(|| Duration::from_secs(self.invoke_timeout_seconds)),
            batch_max_concurrency: self.batch_max_concurrency,
            stream_buffer: self.stream_buffer,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            invoke_timeout_seconds: default_invoke_timeout(),
            batch_max_concurrency: default_batch_concurrency(),
            stream_buffer: default_stream_buffer(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            dispatch: DispatchConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("PIPEHOST_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("PIPEHOST_PORT") {
            if let Ok(p) = port.parse() {
                config.server.port = p;
            }
        }

        if let Ok(timeout) = std::env::var("PIPEHOST_INVOKE_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                config.dispatch.invoke_timeout_seconds = t;
            }
        }
        if let Ok(limit) = std::env::var("PIPEHOST_BATCH_CONCURRENCY") {
            if let Ok(l) = limit.parse() {
                config.dispatch.batch_max_concurrency = l;
            }
        }
        if let Ok(buffer) = std::env::var("PIPEHOST_STREAM_BUFFER") {
            if let Ok(b) = buffer.parse() {
                config.dispatch.stream_buffer = b;
            }
        }

        config
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                return Self::from_file(p);
            }
        }
        Ok(Self::from_env())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("IO error: {0}")]
    Io(String),

    /// File could not be parsed
    #[error("parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.server.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.dispatch.invoke_timeout_seconds, 60);
        assert_eq!(config.dispatch.batch_max_concurrency, 8);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9090

[dispatch]
invoke_timeout_seconds = 15
batch_max_concurrency = 4
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.dispatch.invoke_timeout_seconds, 15);
        assert_eq!(config.dispatch.batch_max_concurrency, 4);
        // Unset fields keep their defaults
        assert_eq!(config.dispatch.stream_buffer, 32);
    }

    #[test]
    fn test_zero_timeout_disables_deadline() {
        let config = DispatchConfig {
            invoke_timeout_seconds: 0,
            ..DispatchConfig::default()
        };
        assert!(config.options().invoke_timeout.is_none());
    }

    #[test]
    fn test_options_conversion() {
        let options = DispatchConfig::default().options();
        assert_eq!(options.invoke_timeout, Some(Duration::from_secs(60)));
        assert_eq!(options.batch_max_concurrency, 8);
        assert_eq!(options.stream_buffer, 32);
    }

    #[test]
    fn test_load_from_file() {
        use std::io::Write;

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server]\nport = 7777").unwrap();

        let config = Config::load(Some(file.path())).unwrap();
        assert_eq!(config.server.port, 7777);
    }
}
