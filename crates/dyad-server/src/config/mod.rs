//! Server config loader (strict parsing).

pub mod schema;

use std::fs;
use std::io::ErrorKind;

use dyad_core::error::{DyadError, Result};

pub use schema::{DyadConfig, ServerSection, SettingsSection, StreamSection};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "DYAD_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "dyad.yaml";

pub fn load_from_file(path: &str) -> Result<DyadConfig> {
    let s = fs::read_to_string(path)
        .map_err(|e| DyadError::Internal(format!("read config failed: {e}")))?;
    load_from_str(&s)
}

/// Like [`load_from_file`], but a missing file yields the built-in defaults.
pub fn load_or_default(path: &str) -> Result<DyadConfig> {
    match fs::read_to_string(path) {
        Ok(s) => load_from_str(&s),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::info!(path, "config file not found, using defaults");
            Ok(DyadConfig::default())
        }
        Err(e) => Err(DyadError::Internal(format!("read config failed: {e}"))),
    }
}

pub fn load_from_str(s: &str) -> Result<DyadConfig> {
    let cfg: DyadConfig = serde_yaml::from_str(s)
        .map_err(|e| DyadError::BadRequest(format!("invalid yaml: {e}")))?;
    cfg.validate()?;
    Ok(cfg)
}
