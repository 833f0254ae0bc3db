use termchat_core::DEFAULT_LOG_CAPACITY;
use termchat_protocol::{DEFAULT_HOST, DEFAULT_PORT};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("message log capacity must be at least 1")]
    ZeroCapacity,
    #[error("listen host must not be empty")]
    EmptyHost,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub log_capacity: usize,
}

impl ServerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.log_capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.host.trim().is_empty() {
            return Err(ConfigError::EmptyHost);
        }
        Ok(())
    }

    /// Host names are resolved at bind time, so `localhost` works as well as IP
    /// literals.
    pub fn bind_address(&self) -> (&str, u16) {
        (self.host.as_str(), self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            log_capacity: DEFAULT_LOG_CAPACITY,
        }
    }
}
