//! Server configuration loaded from the environment
//!
//! Every field can be set through a `BRAMBLE_`-prefixed variable, optionally
//! read from a `.env` file first:
//!
//! | Variable | Default |
//! |----------|---------|
//! | `BRAMBLE_HOST` | `127.0.0.1` |
//! | `BRAMBLE_PORT` | `8080` |
//! | `BRAMBLE_BODY_LIMIT` | `1048576` |
//! | `BRAMBLE_LOG_FILTER` | `info,bramble=debug` |
//!
//! ```ignore
//! use bramble::{App, ServerConfig};
//!
//! let config = ServerConfig::from_env()?;
//! App::from_config(config).get("/", hello).serve().await?;
//! ```

use serde::Deserialize;
use std::fmt;
use std::net::SocketAddr;
use thiserror::Error;

/// Prefix shared by every configuration variable
pub const ENV_PREFIX: &str = "BRAMBLE_";

/// Default request body limit (1 MiB)
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

/// Default tracing filter directive
pub const DEFAULT_LOG_FILTER: &str = "info,bramble=debug";

/// Error type for configuration loading failures
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A variable is present but cannot be parsed
    #[error("Configuration error: {0}")]
    Env(#[from] envy::Error),

    /// `host:port` does not form a socket address
    #[error("Invalid listen address `{0}`")]
    InvalidAddress(String),
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_body_limit() -> usize {
    DEFAULT_BODY_LIMIT
}

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Listener and request settings
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum request body size in bytes
    #[serde(default = "default_body_limit")]
    pub body_limit: usize,
    /// `tracing_subscriber::EnvFilter` directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            body_limit: default_body_limit(),
            log_filter: default_log_filter(),
        }
    }
}

impl ServerConfig {
    /// Load from `BRAMBLE_*` variables after reading `.env` if present.
    ///
    /// Existing variables take precedence over `.env` values.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Ok(envy::prefixed(ENV_PREFIX).from_env()?)
    }

    /// Load from explicit `(name, value)` pairs using the same prefix rules
    pub fn from_vars<I>(vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        Ok(envy::prefixed(ENV_PREFIX).from_iter(vars)?)
    }

    /// `host:port`
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = self.addr();
        addr.parse().map_err(|_| ConfigError::InvalidAddress(addr))
    }
}

/// Deployment profile, read from `BRAMBLE_ENV`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
    Custom(String),
}

impl Environment {
    /// Detect the current environment.
    ///
    /// `production`/`prod` and `development`/`dev` are recognised, an unset
    /// variable means development and anything else is kept as a custom name.
    pub fn current() -> Self {
        match std::env::var("BRAMBLE_ENV") {
            Ok(name) => Self::from_name(&name),
            Err(_) => Self::Development,
        }
    }

    pub fn from_name(name: &str) -> Self {
        match name {
            "production" | "prod" => Self::Production,
            "development" | "dev" => Self::Development,
            other => Self::Custom(other.to_string()),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }

    /// Filter directive suited to this profile
    pub fn default_log_filter(&self) -> &'static str {
        match self {
            Self::Development => DEFAULT_LOG_FILTER,
            Self::Production | Self::Custom(_) => "info",
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
