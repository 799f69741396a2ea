//! Engine configuration
//!
//! Read from a JSON file; every field is optional:
//!
//! ```json
//! {"definitions_dir": "./definitions", "default_policy": "schema", "log_level": "WARN"}
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::observability::{log_event_with_fields, Event, Logger, Severity};
use crate::schema::{ConstructorPolicy, DefinitionLoader};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read { path: String, source: io::Error },

    #[error("Invalid config JSON in {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Directory scanned for `*.json` definition files
    pub definitions_dir: PathBuf,
    /// Policy of root types whose definition names none
    pub default_policy: ConstructorPolicy,
    /// Minimum severity written to the log
    pub log_level: Severity,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            definitions_dir: PathBuf::from("./definitions"),
            default_policy: ConstructorPolicy::Schema,
            log_level: Severity::Warn,
        }
    }
}

impl EngineConfig {
    /// Load configuration from file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;

        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: display,
                source,
            })?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.definitions_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "definitions_dir must not be empty".into(),
            ));
        }
        Ok(())
    }

    /// Install the log threshold
    pub fn apply(&self) {
        Logger::set_threshold(self.log_level);
        log_event_with_fields(
            Event::ConfigLoaded,
            &[
                ("definitions_dir", &self.definitions_dir.display().to_string()),
                ("default_policy", self.default_policy.as_str()),
                ("log_level", self.log_level.as_str()),
            ],
        );
    }

    /// A loader over the configured directory; nothing is read yet
    pub fn loader(&self) -> DefinitionLoader {
        DefinitionLoader::new(&self.definitions_dir).with_default_policy(self.default_policy)
    }
}
