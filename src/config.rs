use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{info, error};

/// Application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Environment (dev, staging, prod)
    #[serde(default = "default_environment")]
    pub environment: String,

    /// CORS allowed origins, comma separated
    #[serde(default = "default_cors_origins")]
    pub cors_origins: String,

    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Execution provider endpoint
    #[serde(default = "default_jdoodle_url")]
    pub jdoodle_url: String,
    pub jdoodle_client_id: Option<String>,
    pub jdoodle_client_secret: Option<String>,

    /// Upper bound for one call to the execution provider
    #[serde(default = "default_compile_timeout_secs")]
    pub compile_timeout_secs: u64,

    /// Frames buffered per connection before deliveries to it are dropped
    #[serde(default = "default_outbox_capacity")]
    pub outbox_capacity: usize,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            // Fallback to .env file
            dotenvy::dotenv().ok();
        }

        // Load from environment variables using envy
        let loaded = envy::from_env::<Config>()
            .map_err(ConfigError::EnvError)
            .and_then(Config::validate);
        match loaded {
            Ok(config) => {
                info!("✅ Configuration loaded successfully");
                Ok(config)
            }
            Err(e) => {
                error!("❌ Failed to load configuration: {}", e);
                Err(e)
            }
        }
    }

    /// Reject values the server cannot run with
    pub fn validate(self) -> Result<Self, ConfigError> {
        if self.outbox_capacity == 0 {
            return Err(ConfigError::Invalid("OUTBOX_CAPACITY must be at least 1".to_string()));
        }
        if self.compile_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "COMPILE_TIMEOUT_SECS must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Configured CORS origins, trimmed, empties dropped
    pub fn cors_origin_list(&self) -> Vec<String> {
        self.cors_origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn compile_timeout(&self) -> Duration {
        Duration::from_secs(self.compile_timeout_secs)
    }

    /// Check if running in development mode
    pub fn is_development(&self) -> bool {
        self.environment.to_lowercase() == "dev" || self.environment.to_lowercase() == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            cors_origins: default_cors_origins(),
            service_name: default_service_name(),
            jdoodle_url: default_jdoodle_url(),
            jdoodle_client_id: None,
            jdoodle_client_secret: None,
            compile_timeout_secs: default_compile_timeout_secs(),
            outbox_capacity: default_outbox_capacity(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    EnvError(envy::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::EnvError(e) => write!(f, "Environment variable error: {}", e),
            ConfigError::Invalid(reason) => write!(f, "Invalid configuration: {}", reason),
        }
    }
}

impl std::error::Error for ConfigError {}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    12345
}

fn default_service_name() -> String {
    "coderoom-relay".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_cors_origins() -> String {
    "http://localhost:3000".to_string()
}

fn default_jdoodle_url() -> String {
    "https://api.jdoodle.com/v1/execute".to_string()
}

fn default_compile_timeout_secs() -> u64 {
    10
}

fn default_outbox_capacity() -> usize {
    256
}
