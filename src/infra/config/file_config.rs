use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, HubConfig, LogConfig, StorageConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub hub: Option<FileHubConfig>,
    pub storage: Option<FileStorageConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(hub) = self.hub {
            hub.merge_into(&mut config.hub);
        }

        if let Some(storage) = self.storage {
            storage.merge_into(&mut config.storage);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileHubConfig {
    pub idle_timeout_ms: Option<u64>,
    pub scrollback: Option<usize>,
}

impl FileHubConfig {
    fn merge_into(self, config: &mut HubConfig) {
        if let Some(idle_timeout_ms) = self.idle_timeout_ms {
            config.idle_timeout_ms = idle_timeout_ms;
        }

        if let Some(scrollback) = self.scrollback {
            config.scrollback = scrollback;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileStorageConfig {
    pub rules_file: Option<PathBuf>,
}

impl FileStorageConfig {
    fn merge_into(self, config: &mut StorageConfig) {
        if let Some(rules_file) = self.rules_file {
            config.rules_file = Some(rules_file);
        }
    }
}
