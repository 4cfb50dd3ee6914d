use std::path::Path;

use serde::de::DeserializeOwned;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("bad config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Прочитать TOML-конфиг. Отсутствующий файл — не ошибка, берутся
/// значения по умолчанию; битый существующий файл — ошибка.
pub fn load_optional<T: DeserializeOwned + Default>(path: &str) -> Result<T, ConfigError> {
    if !Path::new(path).exists() {
        tracing::debug!(config = %path, "config file not found, using defaults");
        return Ok(T::default());
    }
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_string(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })
}
