use std::env;
use std::num::ParseIntError;

#[derive(Debug, Clone)]
/// Application configuration loaded from environment variables.
pub struct Config {
    /// Port the WebSocket/HTTP server listens on.
    pub port: u16,
    /// Port for the HTTP metrics server (Prometheus).
    pub metrics_port: u16,
    /// Logging level (e.g., "info", "debug").
    pub rust_log: String,
    /// STUN server URL handed to every peer connection's ICE configuration.
    pub stun_url: String,
}

#[derive(Debug)]
/// Errors that can occur during configuration loading.
pub enum ConfigError {
    MissingVariable(String),
    InvalidPort(String, ParseIntError),
    PortOutOfRange(u16),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingVariable(var) => write!(f, "{} is required", var),
            ConfigError::InvalidPort(val, err) => {
                write!(
                    f,
                    "{} must be a valid port number (got '{}': {})",
                    val, val, err
                )
            }
            ConfigError::PortOutOfRange(port) => {
                write!(f, "PORT must be between 1 and 65535 (got {})", port)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Validates environment variables and returns a Config object.
/// Returns an error if any required variable is missing or invalid.
pub fn validate_env() -> Result<Config, ConfigError> {
    let port_str = env::var("PORT").map_err(|_| ConfigError::MissingVariable("PORT".to_string()))?;

    let port: u16 = port_str
        .parse()
        .map_err(|e| ConfigError::InvalidPort("PORT".to_string(), e))?;

    if port == 0 {
        return Err(ConfigError::PortOutOfRange(port));
    }

    let rust_log = env::var("RUST_LOG").unwrap_or_else(|_| {
        eprintln!("RUST_LOG not set, using default: info");
        "info".to_string()
    });

    let stun_url = env::var("STUN_URL").unwrap_or_else(|_| {
        eprintln!("STUN_URL not set, using default: stun:stun.l.google.com:19302");
        "stun:stun.l.google.com:19302".to_string()
    });

    let metrics_port: u16 = env::var("METRICS_PORT")
        .unwrap_or_else(|_| "3030".to_string())
        .parse()
        .map_err(|e| ConfigError::InvalidPort("METRICS_PORT".to_string(), e))?;

    Ok(Config {
        port,
        metrics_port,
        rust_log,
        stun_url,
    })
}
