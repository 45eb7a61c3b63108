//! Generic YAML loading for list-shaped configuration files
//! (`subscriptions.yaml`, `channels.yaml`, `assets.yaml`).

use std::{fs, path::PathBuf};

use config::{Config, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Error when reading the configuration file.
    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    /// Error when parsing the configuration file.
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] config::ConfigError),

    /// Error when the configuration format is unsupported.
    #[error("Unsupported configuration format")]
    UnsupportedFormat,
}

/// Reads one top-level list out of a YAML file.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a new `ConfigLoader`.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Deserializes the list stored under `key` (e.g. "subscriptions").
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.is_yaml_file() {
            return Err(LoaderError::UnsupportedFormat);
        }

        let raw = fs::read_to_string(&self.path)?;
        let config = Config::builder().add_source(File::from_str(&raw, FileFormat::Yaml)).build()?;

        Ok(config.get(key)?)
    }

    fn is_yaml_file(&self) -> bool {
        matches!(self.path.extension().and_then(|ext| ext.to_str()), Some("yaml") | Some("yml"))
    }
}

/// A configuration item that lives in a list under a fixed top-level key.
pub trait Loadable: Sized + DeserializeOwned {
    /// The top-level key in the YAML file.
    const KEY: &'static str;

    /// The error type reported for this item.
    type Error: From<LoaderError>;

    /// Post-deserialization validation. No-op by default.
    fn validate(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Loads and validates every `T` in the file.
pub fn load_config<T: Loadable>(path: PathBuf) -> Result<Vec<T>, T::Error> {
    let mut items: Vec<T> = ConfigLoader::new(path).load(T::KEY)?;
    for item in &mut items {
        item.validate()?;
    }
    Ok(items)
}

/// Like [`load_config`], but a missing file yields an empty list.
pub fn load_optional_config<T: Loadable>(path: PathBuf) -> Result<Vec<T>, T::Error> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), key = T::KEY, "Optional config file absent.");
        return Ok(Vec::new());
    }
    load_config(path)
}
