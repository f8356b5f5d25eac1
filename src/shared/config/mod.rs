//! Hub configuration module
//!
//! Configuration is layered: built-in defaults, then an optional TOML file
//! named by `XFHUB_CONFIG`, then environment variables (a `.env` file is
//! loaded first when present).

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_JWT_SECRET: &str = "your-secret-key-change-in-production";

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Interface to bind
    pub bind_address: String,
    /// Port to listen on
    pub port: u16,
    /// PostgreSQL URL; without it the in-memory store is used
    pub database_url: Option<String>,
    /// HS256 secret shared with the auth service
    pub jwt_secret: String,
    /// Token required on `/internal` routes; routes are disabled when unset
    pub internal_token: Option<String>,
    /// Upper bound for every call into the durable store
    pub store_timeout: Duration,
    /// Interval between server pings
    pub heartbeat_interval: Duration,
    /// How long to wait for a pong before closing
    pub heartbeat_timeout: Duration,
    /// Silence after which the sweeper drops a connection
    pub connection_grace: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
            port: 3000,
            database_url: None,
            jwt_secret: DEFAULT_JWT_SECRET.to_string(),
            internal_token: None,
            store_timeout: Duration::from_millis(5_000),
            heartbeat_interval: Duration::from_secs(30),
            heartbeat_timeout: Duration::from_secs(10),
            connection_grace: Duration::from_secs(90),
            sweep_interval: Duration::from_secs(30),
        }
    }
}

/// Optional overrides read from the TOML file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    bind_address: Option<String>,
    port: Option<u16>,
    database_url: Option<String>,
    jwt_secret: Option<String>,
    internal_token: Option<String>,
    store_timeout_ms: Option<u64>,
    heartbeat_interval_secs: Option<u64>,
    heartbeat_timeout_secs: Option<u64>,
    connection_grace_secs: Option<u64>,
    sweep_interval_secs: Option<u64>,
}

impl HubConfig {
    /// Create a new HubConfigBuilder
    pub fn builder() -> HubConfigBuilder {
        HubConfigBuilder::default()
    }

    /// Load configuration from defaults, `XFHUB_CONFIG` and the environment
    pub fn load() -> Result<Self, ConfigError> {
        #[cfg(feature = "ssr")]
        dotenv::dotenv().ok();

        let mut config = Self::default();
        if let Ok(path) = std::env::var("XFHUB_CONFIG") {
            let path = PathBuf::from(path);
            let contents = std::fs::read_to_string(&path)
                .map_err(|source| ConfigError::Io { path: path.clone(), source })?;
            config.apply_toml(&contents)?;
        }
        config.apply_env(|key| std::env::var(key).ok())?;

        if config.jwt_secret == DEFAULT_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set, using the development default");
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse a complete configuration from TOML on top of the defaults
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_toml(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_toml(&mut self, contents: &str) -> Result<(), ConfigError> {
        let file: FileConfig = toml::from_str(contents)?;
        if let Some(v) = file.bind_address {
            self.bind_address = v;
        }
        if let Some(v) = file.port {
            self.port = v;
        }
        if file.database_url.is_some() {
            self.database_url = file.database_url;
        }
        if let Some(v) = file.jwt_secret {
            self.jwt_secret = v;
        }
        if file.internal_token.is_some() {
            self.internal_token = file.internal_token;
        }
        if let Some(v) = file.store_timeout_ms {
            self.store_timeout = Duration::from_millis(v);
        }
        if let Some(v) = file.heartbeat_interval_secs {
            self.heartbeat_interval = Duration::from_secs(v);
        }
        if let Some(v) = file.heartbeat_timeout_secs {
            self.heartbeat_timeout = Duration::from_secs(v);
        }
        if let Some(v) = file.connection_grace_secs {
            self.connection_grace = Duration::from_secs(v);
        }
        if let Some(v) = file.sweep_interval_secs {
            self.sweep_interval = Duration::from_secs(v);
        }
        Ok(())
    }

    /// Apply environment overrides through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("BIND_ADDRESS") {
            self.bind_address = v;
        }
        if let Some(v) = lookup("SERVER_PORT") {
            self.port = parse_value("SERVER_PORT", &v)?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = Some(v);
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.jwt_secret = v;
        }
        if let Some(v) = lookup("INTERNAL_TOKEN") {
            self.internal_token = Some(v);
        }
        if let Some(v) = lookup("STORE_TIMEOUT_MS") {
            self.store_timeout = Duration::from_millis(parse_value("STORE_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("HEARTBEAT_INTERVAL_SECS") {
            self.heartbeat_interval = Duration::from_secs(parse_value("HEARTBEAT_INTERVAL_SECS", &v)?);
        }
        if let Some(v) = lookup("HEARTBEAT_TIMEOUT_SECS") {
            self.heartbeat_timeout = Duration::from_secs(parse_value("HEARTBEAT_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = lookup("CONNECTION_GRACE_SECS") {
            self.connection_grace = Duration::from_secs(parse_value("CONNECTION_GRACE_SECS", &v)?);
        }
        if let Some(v) = lookup("SWEEP_INTERVAL_SECS") {
            self.sweep_interval = Duration::from_secs(parse_value("SWEEP_INTERVAL_SECS", &v)?);
        }
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingValue("jwt_secret"));
        }
        for (name, value) in [
            ("store_timeout", self.store_timeout),
            ("heartbeat_interval", self.heartbeat_interval),
            ("heartbeat_timeout", self.heartbeat_timeout),
            ("connection_grace", self.connection_grace),
            ("sweep_interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
            }
        }
        // A healthy idle connection is touched once per heartbeat round trip.
        if self.connection_grace <= self.heartbeat_interval + self.heartbeat_timeout {
            return Err(ConfigError::Invalid(
                "connection_grace must exceed heartbeat_interval + heartbeat_timeout".to_string(),
            ));
        }
        Ok(())
    }

    /// Socket address string to bind
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_address, self.port)
    }
}

fn parse_value<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Builder for HubConfig
#[derive(Debug, Default)]
pub struct HubConfigBuilder {
    config: HubConfig,
}

impl HubConfigBuilder {
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.config.database_url = Some(url.into());
        self
    }

    pub fn jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.config.jwt_secret = secret.into();
        self
    }

    pub fn internal_token(mut self, token: impl Into<String>) -> Self {
        self.config.internal_token = Some(token.into());
        self
    }

    pub fn store_timeout(mut self, timeout: Duration) -> Self {
        self.config.store_timeout = timeout;
        self
    }

    pub fn heartbeat(mut self, interval: Duration, timeout: Duration) -> Self {
        self.config.heartbeat_interval = interval;
        self.config.heartbeat_timeout = timeout;
        self
    }

    pub fn connection_grace(mut self, grace: Duration) -> Self {
        self.config.connection_grace = grace;
        self
    }

    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.config.sweep_interval = interval;
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<HubConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
