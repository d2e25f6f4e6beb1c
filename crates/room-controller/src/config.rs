//! Room Controller configuration.
//!
//! Configuration is loaded from environment variables. Every variable has a
//! default, so the service runs with an empty environment.

use std::collections::HashMap;
use std::env;
use thiserror::Error;

/// Default bind address for the HTTP surface (WebSocket, health, metrics).
pub const DEFAULT_HEALTH_BIND_ADDRESS: &str = "0.0.0.0:8080";

/// Default graceful shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default per-room mailbox capacity.
pub const DEFAULT_ROOM_MAILBOX_CAPACITY: usize = 256;

/// Default RC instance ID prefix.
pub const DEFAULT_RC_ID_PREFIX: &str = "rc";

/// Room Controller configuration.
///
/// Loaded from environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Unique identifier for this RC instance.
    pub rc_id: String,

    /// Bind address for the HTTP surface (default: "0.0.0.0:8080").
    /// Serves the WebSocket endpoint plus health and metrics probes.
    pub health_bind_address: String,

    /// Graceful shutdown timeout in seconds (default: 30).
    pub shutdown_timeout_secs: u64,

    /// Mailbox capacity for each room actor (default: 256).
    pub room_mailbox_capacity: usize,

    /// Emit logs as JSON instead of the human-readable format (default: false).
    pub log_json: bool,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a `HashMap` (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let health_bind_address = vars
            .get("RC_HEALTH_BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| DEFAULT_HEALTH_BIND_ADDRESS.to_string());

        let shutdown_timeout_secs = vars
            .get("RC_SHUTDOWN_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_SHUTDOWN_TIMEOUT_SECS);

        let room_mailbox_capacity = vars
            .get("RC_ROOM_MAILBOX_CAPACITY")
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_ROOM_MAILBOX_CAPACITY);

        // tokio mpsc panics on zero-capacity channels
        if room_mailbox_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "RC_ROOM_MAILBOX_CAPACITY must be at least 1".to_string(),
            ));
        }

        let log_json = vars
            .get("RC_LOG_JSON")
            .and_then(|s| s.parse().ok())
            .unwrap_or(false);

        // Generate RC instance ID
        let rc_id = vars.get("RC_ID").cloned().unwrap_or_else(|| {
            let hostname = std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string());
            let uuid_suffix = uuid::Uuid::new_v4().to_string();
            let short_suffix = uuid_suffix.get(..8).unwrap_or("00000000");
            format!("{DEFAULT_RC_ID_PREFIX}-{hostname}-{short_suffix}")
        });

        Ok(Config {
            rc_id,
            health_bind_address,
            shutdown_timeout_secs,
            room_mailbox_capacity,
            log_json,
        })
    }
}
