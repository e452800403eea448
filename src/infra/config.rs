use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::domain::ids::MessageNamespace;
use crate::infra::error::StoreError;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct EngineConfig {
    pub logging: LogConfig,
    pub validation: ValidationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

/// Message namespaces whose historical counts may be unknown locally when a
/// peer first joins a group. Their group counters are flagged for external
/// revalidation instead of being adjusted by delta.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ValidationConfig {
    pub namespaces: Vec<MessageNamespace>,
}

impl ValidationConfig {
    pub fn requires_validation(&self, namespace: MessageNamespace) -> bool {
        self.namespaces.contains(&namespace)
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileConfig {
    logging: Option<FileLogConfig>,
    validation: Option<FileValidationConfig>,
}

impl FileConfig {
    fn merge_into(self, config: &mut EngineConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(validation) = self.validation {
            validation.merge_into(&mut config.validation);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileLogConfig {
    level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct FileValidationConfig {
    namespaces: Option<Vec<MessageNamespace>>,
}

impl FileValidationConfig {
    fn merge_into(self, config: &mut ValidationConfig) {
        if let Some(namespaces) = self.namespaces {
            config.namespaces = namespaces;
        }
    }
}

pub fn load(path: Option<&Path>) -> Result<EngineConfig, StoreError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let mut config = EngineConfig::default();

    if !config_path.exists() {
        return Ok(config);
    }

    let raw = fs::read_to_string(&config_path).map_err(|source| StoreError::ConfigRead {
        path: config_path.clone(),
        source,
    })?;

    let file_config: FileConfig = toml::from_str(&raw).map_err(|source| StoreError::ConfigParse {
        path: config_path,
        source,
    })?;

    file_config.merge_into(&mut config);
    Ok(config)
}
