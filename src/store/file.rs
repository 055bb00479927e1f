use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

use super::backend::{BackendError, StorageBackend};

/// Structured-file backend: one JSON file in the profile's data directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
    file_name: String,
}

impl FileBackend {
    pub fn new(dir: PathBuf, file_name: impl Into<String>) -> Self {
        Self {
            dir,
            file_name: file_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    fn io_error(&self, source: std::io::Error) -> BackendError {
        BackendError::Io {
            backend: self.name().to_string(),
            source,
        }
    }
}

#[async_trait]
impl StorageBackend for FileBackend {
    fn name(&self) -> &str {
        "file"
    }

    async fn read(&self) -> Result<Option<String>, BackendError> {
        let path = self.path();
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&path)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(Some(content))
    }

    async fn write(&self, text: &str) -> Result<(), BackendError> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| self.io_error(e))?;
        fs::write(self.path(), text)
            .await
            .map_err(|e| self.io_error(e))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), BackendError> {
        match fs::remove_file(self.path()).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}
