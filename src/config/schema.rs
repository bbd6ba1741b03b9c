//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the gate.
//! All types derive Serde traits for (de)serialization from TOML.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::auth::TotpSettings;

/// Root configuration file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FileConfig {
    /// Signing secret for session cookies and CSRF tokens.
    pub secret: String,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Request and connection limits.
    pub limits: LimitsConfig,

    /// One-time code parameters.
    pub totp: TotpSettings,

    /// Protected services.
    pub endpoints: Vec<EndpointConfig>,

    /// Accounts that may be authorized on endpoints.
    pub users: Vec<UserConfig>,
}

/// One protected backend.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct EndpointConfig {
    /// Unique endpoint identifier.
    pub id: u64,

    /// Display name, used as the login page title.
    #[serde(default)]
    pub name: String,

    /// Address to accept clients on (`host[:port]`, port defaults to 80).
    pub listen: String,

    /// Backend address to relay authorized traffic to.
    pub upstream: String,

    /// Enabled widgets; the first one is shown by default.
    #[serde(default = "default_widgets")]
    pub widgets: Vec<String>,

    /// Ids of users allowed through.
    #[serde(default)]
    pub users: BTreeSet<u64>,

    /// Headers forcibly set on every request forwarded upstream.
    #[serde(default)]
    pub headers_rewrite: BTreeMap<String, String>,
}

fn default_widgets() -> Vec<String> {
    vec!["totp".to_string()]
}

/// One account.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct UserConfig {
    /// Unique user identifier; this is what session cookies carry.
    pub id: u64,

    /// Login name (matched case-insensitively).
    pub login: String,

    /// Base32 TOTP secret for the `totp` widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub totp_secret: Option<String>,

    /// Hex SHA-256 of the password for the `password` widget.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_sha256: Option<String>,
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// How long to wait for a complete request head, in seconds.
    pub idle_secs: u64,

    /// Close a relayed connection after this long without traffic in
    /// either direction. 0 disables the limit.
    pub relay_idle_secs: u64,

    /// How long shutdown waits for in-flight connections, in seconds.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            idle_secs: 60,
            relay_idle_secs: 0,
            shutdown_grace_secs: 10,
        }
    }
}

/// Request and connection limits.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum size of a request line plus headers, in bytes.
    pub max_head_bytes: usize,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Maximum concurrent connections per endpoint (backpressure).
    pub max_connections: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_head_bytes: 64 * 1024,
            max_body_bytes: 2 * 1024 * 1024, // 2MB
            max_connections: 1_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_file_uses_defaults() {
        let config: FileConfig = toml::from_str(
            r#"
            secret = "abc"

            [[endpoints]]
            id = 1
            listen = "0.0.0.0:8080"
            upstream = "127.0.0.1:3000"
            "#,
        )
        .unwrap();

        assert_eq!(config.timeouts, TimeoutConfig::default());
        assert_eq!(config.totp, TotpSettings::default());
        assert_eq!(config.endpoints[0].widgets, ["totp"]);
        assert!(config.endpoints[0].users.is_empty());
        assert!(config.users.is_empty());
    }

    #[test]
    fn full_endpoint_and_user() {
        let config: FileConfig = toml::from_str(
            r#"
            secret = "abc"

            [totp]
            skew_steps = 0

            [[endpoints]]
            id = 7
            name = "grafana"
            listen = "0.0.0.0:8080"
            upstream = "127.0.0.1:3000"
            widgets = ["password", "totp"]
            users = [1, 2]

            [endpoints.headers_rewrite]
            Host = "grafana.internal"

            [[users]]
            id = 1
            login = "alice"
            totp_secret = "JBSWY3DPEHPK3PXP"
            "#,
        )
        .unwrap();

        let endpoint = &config.endpoints[0];
        assert_eq!(endpoint.users, BTreeSet::from([1, 2]));
        assert_eq!(endpoint.headers_rewrite["Host"], "grafana.internal");
        assert_eq!(config.totp.skew_steps, 0);
        assert_eq!(config.totp.step_secs, 30);
        assert_eq!(config.users[0].password_sha256, None);
    }
}
