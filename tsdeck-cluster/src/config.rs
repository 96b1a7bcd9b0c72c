use crate::node::{Node, Protocol};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tsdeck::{ConsoleError, Result};

pub const DEFAULT_CONNECTION_TIMEOUT_SECS: f64 = 5.0;
pub const DEFAULT_HEALTHCHECK_INTERVAL_SECS: f64 = 15.0;
pub const DEFAULT_NUM_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_INTERVAL_SECS: f64 = 1.0;

/// Client configuration. Unset timing/retry fields take the defaults above.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub nodes: Vec<Node>,
    pub api_key: String,
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_seconds: f64,
    /// Carried for compatibility with existing config files; nodes are never
    /// checked in the background.
    #[serde(default = "default_healthcheck_interval")]
    pub healthcheck_interval_seconds: f64,
    #[serde(default = "default_num_retries")]
    pub num_retries: u32,
    #[serde(default = "default_retry_interval")]
    pub retry_interval_seconds: f64,
}

fn default_connection_timeout() -> f64 {
    DEFAULT_CONNECTION_TIMEOUT_SECS
}

fn default_healthcheck_interval() -> f64 {
    DEFAULT_HEALTHCHECK_INTERVAL_SECS
}

fn default_num_retries() -> u32 {
    DEFAULT_NUM_RETRIES
}

fn default_retry_interval() -> f64 {
    DEFAULT_RETRY_INTERVAL_SECS
}

impl ClientConfig {
    pub fn new(nodes: Vec<Node>, api_key: impl Into<String>) -> Self {
        ClientConfig {
            nodes,
            api_key: api_key.into(),
            connection_timeout_seconds: DEFAULT_CONNECTION_TIMEOUT_SECS,
            healthcheck_interval_seconds: DEFAULT_HEALTHCHECK_INTERVAL_SECS,
            num_retries: DEFAULT_NUM_RETRIES,
            retry_interval_seconds: DEFAULT_RETRY_INTERVAL_SECS,
        }
    }

    pub fn with_connection_timeout(mut self, seconds: f64) -> Self {
        self.connection_timeout_seconds = seconds;
        self
    }

    pub fn with_healthcheck_interval(mut self, seconds: f64) -> Self {
        self.healthcheck_interval_seconds = seconds;
        self
    }

    pub fn with_num_retries(mut self, retries: u32) -> Self {
        self.num_retries = retries;
        self
    }

    pub fn with_retry_interval(mut self, seconds: f64) -> Self {
        self.retry_interval_seconds = seconds;
        self
    }

    pub fn connection_timeout(&self) -> Result<Duration> {
        seconds_to_duration("connectionTimeoutSeconds", self.connection_timeout_seconds)
    }

    pub fn retry_interval(&self) -> Result<Duration> {
        seconds_to_duration("retryIntervalSeconds", self.retry_interval_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            return Err(ConsoleError::Config(
                "At least one node is required".to_string(),
            ));
        }
        if self.api_key.trim().is_empty() {
            return Err(ConsoleError::Config("API key is required".to_string()));
        }
        for node in &self.nodes {
            if node.host.trim().is_empty() {
                return Err(ConsoleError::Config("Node host is empty".to_string()));
            }
            if node.port == 0 {
                return Err(ConsoleError::Config(format!(
                    "Invalid port 0 for node {}",
                    node.host
                )));
            }
        }
        for (name, value) in [
            ("connectionTimeoutSeconds", self.connection_timeout_seconds),
            ("healthcheckIntervalSeconds", self.healthcheck_interval_seconds),
            ("retryIntervalSeconds", self.retry_interval_seconds),
        ] {
            seconds_to_duration(name, value)?;
        }
        if self.connection_timeout_seconds == 0.0 {
            return Err(ConsoleError::Config(
                "connectionTimeoutSeconds must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Load from a JSON file when `path` exists, otherwise from `TSDECK_*`
    /// environment variables. The result is validated either way.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p).map_err(|e| {
                    ConsoleError::Config(format!("Failed to read {}: {}", p.display(), e))
                })?;
                let config: ClientConfig = serde_json::from_str(&content).map_err(|e| {
                    ConsoleError::Config(format!("Failed to parse {}: {}", p.display(), e))
                })?;
                tracing::info!(
                    "Loaded client config from {}: nodes={}",
                    p.display(),
                    config.nodes.len()
                );
                config
            }
            _ => Self::from_env()?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Read `TSDECK_NODES` (comma-separated URLs), `TSDECK_API_KEY` and the
    /// optional timing overrides.
    pub fn from_env() -> Result<Self> {
        let nodes = std::env::var("TSDECK_NODES")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(Node::parse)
            .collect::<Result<Vec<_>>>()?;

        let api_key = std::env::var("TSDECK_API_KEY").unwrap_or_default();
        let mut config = ClientConfig::new(nodes, api_key);

        if let Some(v) = env_number::<f64>("TSDECK_CONNECTION_TIMEOUT_SECONDS")? {
            config.connection_timeout_seconds = v;
        }
        if let Some(v) = env_number::<u32>("TSDECK_NUM_RETRIES")? {
            config.num_retries = v;
        }
        if let Some(v) = env_number::<f64>("TSDECK_RETRY_INTERVAL_SECONDS")? {
            config.retry_interval_seconds = v;
        }

        tracing::info!(
            "Loaded client config from environment: nodes={}",
            config.nodes.len()
        );
        Ok(config)
    }
}

/// Rejects negative, non-finite and out-of-range values instead of panicking.
fn seconds_to_duration(name: &str, value: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(value).map_err(|_| {
        ConsoleError::Config(format!(
            "{} must be a non-negative number of seconds within range, got {}",
            name, value
        ))
    })
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConsoleError::Config(format!("{} is not a valid number: {}", name, raw))),
        _ => Ok(None),
    }
}

/// A saved connection as the console's history stores it.
///
/// Persistence lives elsewhere; this crate only reads the record to build a
/// [`ClientConfig`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionConfig {
    pub id: String,
    pub name: String,
    pub host: String,
    /// Kept as text; empty means the protocol's default port.
    pub port: String,
    pub protocol: Protocol,
    pub api_key: String,
    pub created_at: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
}

impl ConnectionConfig {
    /// `protocol://host[:port]`
    pub fn default_name(host: &str, port: &str, protocol: Protocol) -> String {
        if port.is_empty() {
            format!("{}://{}", protocol, host)
        } else {
            format!("{}://{}:{}", protocol, host, port)
        }
    }

    pub fn resolved_port(&self) -> Result<u16> {
        let port = self.port.trim();
        if port.is_empty() {
            return Ok(self.protocol.default_port());
        }
        port.parse::<u16>()
            .map_err(|_| ConsoleError::Config(format!("Invalid port '{}'", self.port)))
    }

    pub fn node(&self) -> Result<Node> {
        Ok(Node::new(
            self.host.trim(),
            self.resolved_port()?,
            self.protocol,
        ))
    }
}

impl TryFrom<&ConnectionConfig> for ClientConfig {
    type Error = ConsoleError;

    fn try_from(conn: &ConnectionConfig) -> Result<Self> {
        let config = ClientConfig::new(vec![conn.node()?], conn.api_key.clone());
        config.validate()?;
        Ok(config)
    }
}
