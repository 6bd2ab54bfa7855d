//! Configuration for the signaling relay

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Origins that are always allowed, covering the usual local dev-server
/// ports of the frontend.
pub const LOCAL_DEV_ORIGINS: &[&str] = &[
    "http://localhost:5173",
    "http://localhost:5000",
    "http://localhost:8080",
];

/// Default number of participants per room (1:1 calls)
pub const DEFAULT_ROOM_CAPACITY: usize = 2;

/// Default ceiling on simultaneously connected sessions
pub const DEFAULT_MAX_SESSIONS: usize = 1024;

/// Main configuration for the signaling relay
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalingConfig {
    /// Address the WebSocket listener binds to
    pub bind_addr: String,

    /// Maximum participants per room (default: 2, for 1:1 calls)
    pub room_capacity: usize,

    /// Maximum live sessions before registration is refused
    pub max_sessions: usize,

    /// Deployed frontend base URL, allowed as a cross-origin caller in
    /// addition to the fixed local-development origins
    pub frontend_url: Option<String>,
}

impl Default for SignalingConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
            room_capacity: DEFAULT_ROOM_CAPACITY,
            max_sessions: DEFAULT_MAX_SESSIONS,
            frontend_url: None,
        }
    }
}

impl SignalingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.bind_addr.is_empty() {
            return Err(Error::Config("bind_addr must not be empty".to_string()));
        }
        if self.room_capacity < 2 {
            return Err(Error::Config(format!(
                "room_capacity must be at least 2, got {}",
                self.room_capacity
            )));
        }
        if self.max_sessions == 0 {
            return Err(Error::Config("max_sessions must be non-zero".to_string()));
        }
        if let Some(url) = &self.frontend_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err(Error::Config(format!(
                    "frontend_url must be an http(s) origin, got {url}"
                )));
            }
        }
        Ok(())
    }

    /// The full origin allow-list: fixed dev origins plus the configured
    /// frontend URL, if any.
    pub fn allowed_origins(&self) -> Vec<String> {
        let mut origins: Vec<String> = LOCAL_DEV_ORIGINS.iter().map(|o| o.to_string()).collect();
        if let Some(url) = &self.frontend_url {
            origins.push(url.trim_end_matches('/').to_string());
        }
        origins
    }

    /// Whether a browser `Origin` header value is allowed to connect.
    pub fn origin_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/');
        self.allowed_origins()
            .iter()
            .any(|allowed| allowed.trim_end_matches('/').eq_ignore_ascii_case(origin))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SignalingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.room_capacity, 2);
    }

    #[test]
    fn test_room_capacity_below_two_rejected() {
        let config = SignalingConfig {
            room_capacity: 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_frontend_url_must_be_http() {
        let config = SignalingConfig {
            frontend_url: Some("ftp://example.com".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_local_dev_origins_always_allowed() {
        let config = SignalingConfig::default();
        assert!(config.origin_allowed("http://localhost:5173"));
        assert!(config.origin_allowed("http://localhost:8080/"));
        assert!(!config.origin_allowed("http://evil.example.com"));
    }

    #[test]
    fn test_frontend_url_joins_allow_list() {
        let config = SignalingConfig {
            frontend_url: Some("https://app.example.com/".to_string()),
            ..Default::default()
        };
        assert!(config.validate().is_ok());
        assert!(config.origin_allowed("https://app.example.com"));
        assert!(config.origin_allowed("HTTPS://APP.EXAMPLE.COM"));
    }
}
