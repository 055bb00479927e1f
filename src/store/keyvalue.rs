use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::fs;

use super::backend::{BackendError, StorageBackend};

/// Key-value fallback: a JSON object of string keys to string values shared
/// with other consumers, of which this backend owns exactly one key.
#[derive(Debug, Clone)]
pub struct KeyValueBackend {
    path: PathBuf,
    key: String,
}

impl KeyValueBackend {
    pub fn new(path: PathBuf, key: impl Into<String>) -> Self {
        Self {
            path,
            key: key.into(),
        }
    }

    pub async fn get(&self, key: &str) -> Result<Option<String>, BackendError> {
        Ok(self.entries().await?.remove(key))
    }

    pub async fn set(&self, key: &str, value: &str) -> Result<(), BackendError> {
        let mut entries = self.entries().await?;
        entries.insert(key.to_string(), value.to_string());
        self.store(&entries).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let mut entries = self.entries().await?;
        if entries.remove(key).is_none() {
            return Ok(());
        }
        self.store(&entries).await
    }

    async fn store(&self, entries: &BTreeMap<String, String>) -> Result<(), BackendError> {
        let text = serde_json::to_string_pretty(entries).map_err(|source| {
            BackendError::Malformed {
                backend: self.name().to_string(),
                source,
            }
        })?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| self.io_error(e))?;
        }
        fs::write(&self.path, text)
            .await
            .map_err(|e| self.io_error(e))
    }

    async fn entries(&self) -> Result<BTreeMap<String, String>, BackendError> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let content = fs::read_to_string(&self.path)
            .await
            .map_err(|e| self.io_error(e))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|source| BackendError::Malformed {
            backend: self.name().to_string(),
            source,
        })
    }

    fn io_error(&self, source: std::io::Error) -> BackendError {
        BackendError::Io {
            backend: self.name().to_string(),
            source,
        }
    }
}

#[async_trait]
impl StorageBackend for KeyValueBackend {
    fn name(&self) -> &str {
        "key-value"
    }

    async fn read(&self) -> Result<Option<String>, BackendError> {
        self.get(&self.key).await
    }

    async fn write(&self, text: &str) -> Result<(), BackendError> {
        self.set(&self.key, text).await
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.delete(&self.key).await
    }
}
