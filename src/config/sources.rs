//! File-based config loading.
//!
//! Provides [`parse_config_str`] for format-specific deserialization
//! (YAML, JSON, TOML, gated by feature flags), [`load_file`] which picks
//! the format from the file extension, and [`detect_file`] for finding a
//! config in the working directory when none was given.

use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::config::model::Config;
use crate::error::BalancerError;

/// File names probed, in order, when `--config` is not given.
pub const CANDIDATES: &[&str] = &["hashlb.yaml", "hashlb.yml", "hashlb.json", "hashlb.toml"];

/// Parse a config string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<Config, BalancerError> {
    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| BalancerError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| BalancerError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| BalancerError::ConfigParse {
            path: path_display.to_string(),
            source: Box::new(e),
        }),

        other => Err(BalancerError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Read and parse a config file. Returns the config together with a
/// short content hash that is logged at startup to identify the revision.
pub async fn load_file(path: &Path) -> Result<(Config, String), BalancerError> {
    let content = tokio::fs::read_to_string(path).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            BalancerError::ConfigFileNotFound {
                path: path.to_path_buf(),
            }
        } else {
            BalancerError::Io(e)
        }
    })?;

    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    let config = parse_config_str(ext, &content, &path.display().to_string())?;

    let hash = sha256_hex(content.as_bytes());
    let short = hash.get(..8).unwrap_or(&hash).to_string();
    Ok((config, short))
}

/// Look for one of [`CANDIDATES`] inside `dir`.
pub async fn detect_file(dir: &Path) -> Option<PathBuf> {
    for name in CANDIDATES {
        let path = dir.join(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Some(path);
        }
    }
    None
}
