//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development. Engine policy (reveal threshold,
//! deleted-message handling) is loaded separately via
//! [`veil_engine::EngineConfig::from_env`].

use std::net::SocketAddr;
use std::path::PathBuf;

use veil_shared::constants::DEFAULT_HTTP_PORT;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit database file path. When unset, the platform data
    /// directory is used.
    /// Env: `VEIL_DB_PATH`
    pub db_path: Option<PathBuf>,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"Veil Node"`
    pub instance_name: String,

    /// Sustained message sends per second allowed per sender.
    /// Env: `VEIL_SEND_RATE`
    /// Default: `1.0`
    pub send_rate: f64,

    /// Burst capacity of the per-sender send throttle.
    /// Env: `VEIL_SEND_BURST`
    /// Default: `10.0`
    pub send_burst: f64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            db_path: None,
            instance_name: "Veil Node".to_string(),
            send_rate: 1.0,
            send_burst: 10.0,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default"
                );
            }
        }

        if let Ok(path) = std::env::var("VEIL_DB_PATH") {
            if !path.is_empty() {
                config.db_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(name) = std::env::var("INSTANCE_NAME") {
            config.instance_name = name;
        }

        if let Ok(val) = std::env::var("VEIL_SEND_RATE") {
            match val.parse::<f64>() {
                Ok(rate) if rate > 0.0 => config.send_rate = rate,
                _ => tracing::warn!(value = %val, "Invalid VEIL_SEND_RATE, using default"),
            }
        }

        if let Ok(val) = std::env::var("VEIL_SEND_BURST") {
            match val.parse::<f64>() {
                Ok(burst) if burst >= 1.0 => config.send_burst = burst,
                _ => tracing::warn!(value = %val, "Invalid VEIL_SEND_BURST, using default"),
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}
