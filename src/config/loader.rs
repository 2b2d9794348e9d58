//! Generic loader for YAML item lists, used for the collections file.

use std::{fs, path::PathBuf};

use config::{Config, File, FileFormat};
use serde::de::DeserializeOwned;
use thiserror::Error;

/// Errors that can occur while loading a configuration file.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// The file could not be read.
    #[error("Failed to read configuration file: {0}")]
    Io(#[from] std::io::Error),

    /// The file could not be parsed or was missing the expected key.
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] config::ConfigError),

    /// The file does not use a supported extension.
    #[error("Unsupported configuration format")]
    UnsupportedFormat,
}

/// Loads a list of items from a top-level key in a YAML file.
pub struct ConfigLoader {
    path: PathBuf,
}

impl ConfigLoader {
    /// Creates a loader for the given file path.
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the items under `key` (e.g. `"collections"`).
    pub fn load<T: DeserializeOwned>(&self, key: &str) -> Result<Vec<T>, LoaderError> {
        if !self.is_yaml_file() {
            return Err(LoaderError::UnsupportedFormat);
        }

        let config_str = fs::read_to_string(&self.path)?;

        let config = Config::builder()
            .add_source(File::from_str(&config_str, FileFormat::Yaml))
            .build()?;

        let items = config.get(key)?;

        Ok(items)
    }

    fn is_yaml_file(&self) -> bool {
        matches!(
            self.path.extension().and_then(|ext| ext.to_str()),
            Some("yaml") | Some("yml")
        )
    }
}
