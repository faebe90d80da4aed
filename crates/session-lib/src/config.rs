// ============================
// ricecoco-session/src/config.rs
// ============================
//! Configuration management.
use crate::error::{Result, SessionError};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "ricecoco.toml";
/// Prefix of environment overrides, e.g. `RICECOCO_SOCKET_URL`
pub const ENV_PREFIX: &str = "RICECOCO_";

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Client settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the REST API (without trailing slash)
    pub api_base_url: String,
    /// Websocket URL of the session service
    pub socket_url: String,
    /// Bearer token attached to REST calls
    pub auth_token: Option<String>,
    /// Distance to the restaurant under which the user counts as arrived
    pub arrival_radius_m: f64,
    /// How long to wait for the session service to acknowledge a request
    pub ack_timeout_secs: u64,
    /// Interval between location samples
    pub location_interval_ms: u64,
    /// Log level
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:3000".to_string(),
            socket_url: "ws://127.0.0.1:3000/ws".to_string(),
            auth_token: None,
            arrival_radius_m: 500.0,
            ack_timeout_secs: 10,
            location_interval_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

impl Settings {
    /// Load from `ricecoco.toml` and `RICECOCO_*` on top of the defaults
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_FILE)
    }

    /// Load from an explicit file; a missing file falls back to defaults
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.api_base_url.starts_with("http://") && !self.api_base_url.starts_with("https://") {
            return Err(SessionError::Config(format!(
                "api_base_url must be an http(s) URL, got {}",
                self.api_base_url
            )));
        }
        if !self.socket_url.starts_with("ws://") && !self.socket_url.starts_with("wss://") {
            return Err(SessionError::Config(format!(
                "socket_url must be a ws(s) URL, got {}",
                self.socket_url
            )));
        }
        if !self.arrival_radius_m.is_finite() || self.arrival_radius_m < 0.0 {
            return Err(SessionError::Config(
                "arrival_radius_m must be a non-negative distance".to_string(),
            ));
        }
        if self.ack_timeout_secs == 0 {
            return Err(SessionError::Config("ack_timeout_secs must be positive".to_string()));
        }
        if self.location_interval_ms == 0 {
            return Err(SessionError::Config(
                "location_interval_ms must be positive".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(SessionError::Config(format!("unknown log level {}", self.log_level)));
        }
        Ok(())
    }

    pub fn ack_timeout(&self) -> Duration {
        Duration::from_secs(self.ack_timeout_secs)
    }

    pub fn location_interval(&self) -> Duration {
        Duration::from_millis(self.location_interval_ms)
    }
}
