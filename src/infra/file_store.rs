use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use fs2::FileExt;
use toml::{Table, Value};

use crate::infra::{contracts::KeyValueStore, error::StorageError};

const RULES_FILE_SLOT_IGNORED: &str = "STORAGE_RULES_FILE_SLOT_IGNORED";
const RULES_FILE_SET_ASIDE: &str = "STORAGE_RULES_FILE_SET_ASIDE";

/// TOML file with one string array per slot.
///
/// Writes run under an exclusive lock file and land through a temp file
/// rename, so readers see either the old or the new document.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    path: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock_path(&self) -> PathBuf {
        self.path.with_extension("lock")
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("toml.tmp")
    }

    fn corrupt_path(&self) -> PathBuf {
        self.path.with_extension("toml.corrupt")
    }

    /// Document to write over. An unparsable file is moved to the
    /// `.corrupt` path and replaced by an empty document.
    fn document_for_write(&self) -> Result<Table, StorageError> {
        match self.read_document() {
            Err(StorageError::Parse { source, .. }) => {
                let corrupt_path = self.corrupt_path();
                fs::rename(&self.path, &corrupt_path).map_err(|source| StorageError::Write {
                    path: corrupt_path.clone(),
                    source,
                })?;
                tracing::warn!(
                    code = RULES_FILE_SET_ASIDE,
                    path = %self.path.display(),
                    moved_to = %corrupt_path.display(),
                    error = %source,
                    "rules file unparsable; starting from an empty document"
                );
                Ok(Table::new())
            }
            other => other,
        }
    }

    fn read_document(&self) -> Result<Table, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == io::ErrorKind::NotFound => return Ok(Table::new()),
            Err(source) => {
                return Err(StorageError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        raw.parse::<Table>().map_err(|source| StorageError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn write_document(&self, document: &Table) -> Result<(), StorageError> {
        let rendered = toml::to_string(document)?;
        let temp_path = self.temp_path();

        fs::write(&temp_path, rendered).map_err(|source| StorageError::Write {
            path: temp_path.clone(),
            source,
        })?;

        fs::rename(&temp_path, &self.path).map_err(|source| StorageError::Write {
            path: self.path.clone(),
            source,
        })
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn read_set(&self, slot: &str) -> Result<Vec<String>, StorageError> {
        let document = self.read_document()?;

        let Some(value) = document.get(slot) else {
            return Ok(Vec::new());
        };

        let Some(values) = value.as_array() else {
            tracing::warn!(
                code = RULES_FILE_SLOT_IGNORED,
                slot,
                path = %self.path.display(),
                "rules slot is not an array; treating as empty"
            );
            return Ok(Vec::new());
        };

        Ok(values
            .iter()
            .filter_map(|value| value.as_str().map(str::to_owned))
            .collect())
    }

    fn write_set(&self, slot: &str, values: &[String]) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StorageError::Write {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let lock_path = self.lock_path();
        let lock_file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|source| StorageError::Lock {
                path: lock_path.clone(),
                source,
            })?;
        FileExt::lock_exclusive(&lock_file).map_err(|source| StorageError::Lock {
            path: lock_path.clone(),
            source,
        })?;

        let result = self.document_for_write().and_then(|mut document| {
            document.insert(
                slot.to_owned(),
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
            self.write_document(&document)
        });

        let _ = FileExt::unlock(&lock_file);
        result
    }
}
