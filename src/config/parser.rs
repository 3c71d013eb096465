//! Configuration file parsing (JSON or HOCON).

use std::path::Path;

use hocon::HoconLoader;

use crate::common::error::ConfigError;
use crate::config::types::Config;

/// Load configuration from a file.
///
/// `.json` files are read with serde_json; anything else is treated as HOCON,
/// which also accepts plain JSON.
pub fn load_config(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let is_json = path
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if is_json {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;
        return load_config_str(&content);
    }

    HoconLoader::new()
        .load_file(path)
        .map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
        })?
        .resolve()
        .map_err(|e| ConfigError::ParseError {
            message: e.to_string(),
        })
}

/// Load configuration from a JSON string.
pub fn load_config_str(content: &str) -> Result<Config, ConfigError> {
    serde_json::from_str(content).map_err(|e| ConfigError::ParseError {
        message: e.to_string(),
    })
}
