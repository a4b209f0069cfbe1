use anyhow::Result;

use crate::infra::{config::AppConfig, error::StorageError};

pub trait ConfigAdapter {
    fn load(&self) -> Result<AppConfig>;
}

/// Durable whole-set storage. Each slot holds a set of opaque strings that
/// is read and replaced as a unit.
pub trait KeyValueStore: Send + Sync {
    fn read_set(&self, slot: &str) -> Result<Vec<String>, StorageError>;
    fn write_set(&self, slot: &str, values: &[String]) -> Result<(), StorageError>;
}
