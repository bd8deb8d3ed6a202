//! Client configuration
//!
//! This module contains all configuration options for the remote client.
//! The UI layer owns persistence; the client only receives a value.

use crate::error::{ClientError, Result};
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::time::Duration;
use url::Url;

/// Main configuration for the remote client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Hostname of the daemon
    pub hostname: String,

    /// RPC port of the daemon
    pub port: u16,

    /// Connect using HTTPS
    pub tls: bool,

    /// Username for HTTP basic auth (empty = none)
    #[serde(default)]
    pub username: String,

    /// Password for HTTP basic auth (empty = none)
    #[serde(default)]
    pub password: String,

    /// Seconds between periodic torrent refreshes
    pub refresh_interval_secs: u64,

    /// Seconds between session-get refreshes
    #[serde(default = "default_session_interval_secs")]
    pub session_interval_secs: u64,

    /// Delay before an out-of-band refresh runs, so the daemon has
    /// time to reflect a just-made change
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// HTTP configuration
    #[serde(default)]
    pub http: HttpConfig,
}

/// HTTP-specific configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Connection timeout in seconds
    pub connect_timeout: u64,

    /// Read timeout in seconds
    pub read_timeout: u64,

    /// User agent sent with every request
    pub user_agent: String,

    /// Whether to accept invalid TLS certificates (self-signed daemons)
    pub accept_invalid_certs: bool,
}

fn default_session_interval_secs() -> u64 {
    300
}

fn default_settle_delay_ms() -> u64 {
    250
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            hostname: "localhost".to_string(),
            port: 9091,
            tls: false,
            username: String::new(),
            password: String::new(),
            refresh_interval_secs: 30,
            session_interval_secs: 300,
            settle_delay_ms: 250,
            http: HttpConfig::default(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            connect_timeout: 15,
            read_timeout: 60,
            user_agent: format!("trg/{}", env!("CARGO_PKG_VERSION")),
            accept_invalid_certs: false,
        }
    }
}

impl ClientConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the daemon hostname
    pub fn hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the daemon port
    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Use HTTPS
    pub fn tls(mut self, tls: bool) -> Self {
        self.tls = tls;
        self
    }

    /// Set basic auth credentials
    pub fn credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = username.into();
        self.password = password.into();
        self
    }

    /// Set the periodic refresh interval
    pub fn refresh_interval_secs(mut self, secs: u64) -> Self {
        self.refresh_interval_secs = secs;
        self
    }

    /// Set the one-shot refresh settle delay
    pub fn settle_delay_ms(mut self, ms: u64) -> Self {
        self.settle_delay_ms = ms;
        self
    }

    /// Whether both username and password are set
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// `{http|https}://{host}:{port}/transmission/rpc`
    pub fn rpc_url(&self) -> Result<Url> {
        let scheme = if self.tls { "https" } else { "http" };
        let host = match self.hostname.parse::<IpAddr>() {
            Ok(IpAddr::V6(addr)) => format!("[{}]", addr),
            _ => self.hostname.clone(),
        };
        Ok(Url::parse(&format!(
            "{}://{}:{}/transmission/rpc",
            scheme, host, self.port
        ))?)
    }

    /// Whether the daemon is on this machine and so always reachable
    pub fn is_loopback(&self) -> bool {
        let host = self.hostname.trim_start_matches('[').trim_end_matches(']');
        host.eq_ignore_ascii_case("localhost")
            || host
                .parse::<IpAddr>()
                .map(|ip| ip.is_loopback())
                .unwrap_or(false)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn session_interval(&self) -> Duration {
        Duration::from_secs(self.session_interval_secs)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.hostname.trim().is_empty() {
            return Err(ClientError::invalid_input("hostname", "Must not be empty"));
        }

        if self.port == 0 {
            return Err(ClientError::invalid_input("port", "Must be between 1 and 65535"));
        }

        if self.refresh_interval_secs == 0 {
            return Err(ClientError::invalid_input(
                "refresh_interval_secs",
                "Must be at least 1",
            ));
        }

        if self.session_interval_secs == 0 {
            return Err(ClientError::invalid_input(
                "session_interval_secs",
                "Must be at least 1",
            ));
        }

        self.rpc_url().map_err(|e| {
            ClientError::invalid_input("hostname", format!("Cannot build RPC URL: {}", e))
        })?;

        Ok(())
    }
}
