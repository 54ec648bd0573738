//! Serde data structures for the hashlb configuration file.
//!
//! [`Config`] is the root. Every field has a default, so an empty file
//! is a valid config that reproduces the built-in deployment of three
//! backends on port 8080. Unknown fields are rejected.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8090;
pub const DEFAULT_TIMEOUT_SEC: u64 = 3;
pub const DEFAULT_HEALTH_INTERVAL_SECS: u64 = 10;

const fn default_port() -> u16 {
    DEFAULT_PORT
}

const fn default_timeout_sec() -> u64 {
    DEFAULT_TIMEOUT_SEC
}

const fn default_health_interval_secs() -> u64 {
    DEFAULT_HEALTH_INTERVAL_SECS
}

fn default_backends() -> Vec<String> {
    vec![
        "server1:8080".to_string(),
        "server2:8080".to_string(),
        "server3:8080".to_string(),
    ]
}

fn is_false(v: &bool) -> bool {
    !*v
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bound on every outbound call, health probes included.
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,

    #[serde(default, skip_serializing_if = "is_false")]
    pub https: bool,

    /// Adds the `lb-from` header to proxied responses.
    #[serde(default, skip_serializing_if = "is_false")]
    pub trace: bool,

    #[serde(default = "default_health_interval_secs")]
    pub health_interval_secs: u64,

    #[serde(default = "default_backends")]
    pub backends: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: default_port(),
            timeout_sec: default_timeout_sec(),
            https: false,
            trace: false,
            health_interval_secs: default_health_interval_secs(),
            backends: default_backends(),
        }
    }
}

impl Config {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    #[must_use]
    pub const fn health_interval(&self) -> Duration {
        Duration::from_secs(self.health_interval_secs)
    }

    #[must_use]
    pub const fn scheme(&self) -> Scheme {
        if self.https {
            Scheme::Https
        } else {
            Scheme::Http
        }
    }
}

/// Scheme used for every outbound call to a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    Http,
    Https,
}

impl Scheme {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Http => "http",
            Self::Https => "https",
        }
    }
}

impl std::fmt::Display for Scheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
