use std::{env, fs, path::PathBuf};

use crate::infra::{config::StorageConfig, error::AppError};

const APP_DIR_NAME: &str = "chatwatch";
const RULES_FILE_NAME: &str = "rules.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageLayout {
    pub config_dir: PathBuf,
    pub rules_file: PathBuf,
}

impl StorageLayout {
    pub fn resolve(config: &StorageConfig) -> Result<Self, AppError> {
        let config_base = env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(dirs::config_dir)
            .ok_or_else(|| AppError::StoragePathResolution {
                details: "unable to resolve config base directory (XDG_CONFIG_HOME/HOME)".into(),
            })?;

        let config_dir = config_base.join(APP_DIR_NAME);
        let rules_file = config
            .rules_file
            .clone()
            .unwrap_or_else(|| config_dir.join(RULES_FILE_NAME));

        Ok(Self {
            config_dir,
            rules_file,
        })
    }

    pub fn ensure_dirs(&self) -> Result<(), AppError> {
        let rules_dir = self.rules_file.parent().map(PathBuf::from);
        for dir in std::iter::once(self.config_dir.clone()).chain(rules_dir) {
            if dir.as_os_str().is_empty() {
                continue;
            }
            fs::create_dir_all(&dir).map_err(|source| AppError::StorageDirCreate {
                path: dir.clone(),
                source,
            })?;
        }

        Ok(())
    }
}
