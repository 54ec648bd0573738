//! Configuration validation with detailed error reporting.
//!
//! The [`validate`] function checks a resolved [`Config`] for structural
//! errors such as an empty backend list, malformed or duplicate backend
//! addresses, and zero timeouts. All problems are collected into a list
//! of [`ValidationError`] values with per-field suggestions.

use std::collections::HashSet;

use url::Url;

use super::model::Config;
use crate::error::ValidationError;

/// Validate a single backend address. Backends are bare `host:port`
/// pairs; the scheme is chosen globally by the `https` toggle.
pub fn validate_backend_address(address: &str) -> Result<(), String> {
    if address.is_empty() {
        return Err("address cannot be empty".into());
    }
    if address.contains("://") {
        return Err(format!("'{address}' must not include a scheme"));
    }
    if address.contains(['/', '?', '#']) {
        return Err(format!("'{address}' must be a bare host:port without a path"));
    }

    let Some((host, port)) = address.rsplit_once(':') else {
        return Err(format!("'{address}' is missing a port"));
    };
    if host.is_empty() {
        return Err(format!("'{address}' is missing a host"));
    }
    if port.parse::<u16>().is_err() {
        return Err(format!("'{port}' is not a valid port"));
    }

    match Url::parse(&format!("http://{address}")) {
        Ok(parsed) if parsed.host_str().is_some() => Ok(()),
        _ => Err(format!("'{address}' is not a valid host:port")),
    }
}

/// Suggest a bare `host:port` for addresses written as URLs.
fn suggest_address(address: &str) -> Option<String> {
    let (_, rest) = address.split_once("://")?;
    let bare = rest.split(['/', '?', '#']).next().unwrap_or(rest);
    if bare.is_empty() {
        None
    } else {
        Some(format!("did you mean '{bare}'?"))
    }
}

pub fn validate(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.timeout_sec == 0 {
        errors.push(ValidationError {
            field: "timeout_sec".into(),
            message: "must be greater than 0".into(),
            suggestion: Some(format!(
                "the default is {}",
                super::model::DEFAULT_TIMEOUT_SEC
            )),
        });
    }

    if config.health_interval_secs == 0 {
        errors.push(ValidationError {
            field: "health_interval_secs".into(),
            message: "must be greater than 0".into(),
            suggestion: Some(format!(
                "the default is {}",
                super::model::DEFAULT_HEALTH_INTERVAL_SECS
            )),
        });
    }

    if config.backends.is_empty() {
        errors.push(ValidationError {
            field: "backends".into(),
            message: "at least one backend must be defined".into(),
            suggestion: None,
        });
        return Err(errors);
    }

    let mut seen = HashSet::new();
    for (i, address) in config.backends.iter().enumerate() {
        let field = format!("backends[{i}]");

        if let Err(msg) = validate_backend_address(address) {
            errors.push(ValidationError {
                field: field.clone(),
                message: msg,
                suggestion: suggest_address(address),
            });
        }

        if !seen.insert(address) {
            errors.push(ValidationError {
                field,
                message: format!("duplicate backend '{address}'"),
                suggestion: None,
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
