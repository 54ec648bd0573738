//! Configuration loading, merging, and validation.
//!
//! A [`Config`] starts from built-in defaults or a config file (see
//! [`sources`]), then [`Overrides`] collected from CLI flags and
//! environment variables are layered on top. The merged result is
//! checked by [`validation::validate`] before the registry is built.

pub mod model;
pub mod sources;
pub mod validation;

use crate::error::BalancerError;
use model::Config;

/// Values supplied on the command line. `None` (or `false` for the
/// toggles, or an empty list) leaves the underlying value untouched.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub timeout_sec: Option<u64>,
    pub https: bool,
    pub trace: bool,
    pub health_interval_secs: Option<u64>,
    pub backends: Vec<String>,
}

impl Config {
    #[must_use]
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(timeout_sec) = overrides.timeout_sec {
            self.timeout_sec = timeout_sec;
        }
        if let Some(interval) = overrides.health_interval_secs {
            self.health_interval_secs = interval;
        }
        self.https |= overrides.https;
        self.trace |= overrides.trace;
        if !overrides.backends.is_empty() {
            self.backends.clone_from(&overrides.backends);
        }
        self
    }
}

/// Merge overrides into `base` and validate the result.
pub fn resolve(base: Config, overrides: &Overrides) -> Result<Config, BalancerError> {
    let config = base.with_overrides(overrides);
    validation::validate(&config).map_err(|errors| BalancerError::ConfigValidation { errors })?;
    Ok(config)
}
