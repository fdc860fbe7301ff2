//! JSON config file adapter.
//!
//! Implements [`ConfigPort`] over a file on disk. Every field is optional
//! in the document; omitted fields take their defaults. The result is
//! range-checked before it is handed out.

use std::fs;
use std::io;
use std::path::PathBuf;

use log::info;

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::FanConfig;

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<FanConfig, ConfigError> {
        let text = fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound,
            kind => ConfigError::IoError(kind),
        })?;
        let config: FanConfig =
            serde_json::from_str(&text).map_err(|e| ConfigError::Corrupted(e.to_string()))?;
        config.validate()?;
        info!("Config loaded from {}", self.path.display());
        Ok(config)
    }
}
