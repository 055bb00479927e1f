use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::ColorMap;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("I/O error in {backend} backend: {source}")]
    Io {
        backend: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed data in {backend} backend: {source}")]
    Malformed {
        backend: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Backend {backend} unavailable: {reason}")]
    Unavailable { backend: String, reason: String },

    #[error("No storage backend accepted the write")]
    Exhausted,
}

/// A medium able to hold the whole color mapping as one text record.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    fn name(&self) -> &str;

    /// `Ok(None)` when nothing has been written yet.
    async fn read(&self) -> Result<Option<String>, BackendError>;

    async fn write(&self, text: &str) -> Result<(), BackendError>;

    /// Drop the stored record so later reads yield `Ok(None)`.
    async fn clear(&self) -> Result<(), BackendError>;
}

/// Backends in priority order.
///
/// Reads walk the chain until one yields a parseable mapping; writes go to the
/// first backend that accepts them and to no other.
///
/// Once a write lands on a lower-priority backend, the backends above it hold
/// stale data: they are cleared, and reads start at the backend that took the
/// write even if clearing failed.
pub struct BackendChain {
    backends: Vec<Box<dyn StorageBackend>>,
    active: AtomicUsize,
}

impl BackendChain {
    pub fn new(backends: Vec<Box<dyn StorageBackend>>) -> Self {
        Self {
            backends,
            active: AtomicUsize::new(0),
        }
    }

    pub fn primary_with_fallback(
        primary: Box<dyn StorageBackend>,
        fallback: Box<dyn StorageBackend>,
    ) -> Self {
        Self::new(vec![primary, fallback])
    }

    /// First mapping any backend can produce, with the backend's name.
    pub async fn read_first(&self) -> Option<(String, ColorMap)> {
        let start = self.active.load(Ordering::SeqCst);
        for backend in self.backends.iter().skip(start) {
            match backend.read().await {
                Ok(Some(text)) => match serde_json::from_str::<ColorMap>(&text) {
                    Ok(mut map) => {
                        map.retain(|_, color| !color.is_empty());
                        return Some((backend.name().to_string(), map));
                    }
                    Err(source) => {
                        let err = BackendError::Malformed {
                            backend: backend.name().to_string(),
                            source,
                        };
                        warn!("{}", err);
                    }
                },
                Ok(None) => debug!("No saved colors in {} backend", backend.name()),
                Err(e) => warn!("Failed to read colors: {}", e),
            }
        }
        None
    }

    /// Write `map` pretty-printed to the first backend that accepts it.
    pub async fn write_first(&self, map: &ColorMap) -> Result<String, BackendError> {
        let text = serde_json::to_string_pretty(map).map_err(|source| BackendError::Malformed {
            backend: "serializer".to_string(),
            source,
        })?;

        for (index, backend) in self.backends.iter().enumerate() {
            match backend.write(&text).await {
                Ok(()) => {
                    self.active.store(index, Ordering::SeqCst);
                    self.clear_above(index).await;
                    return Ok(backend.name().to_string());
                }
                Err(e) => warn!("Failed to write colors, trying next backend: {}", e),
            }
        }
        Err(BackendError::Exhausted)
    }

    async fn clear_above(&self, index: usize) {
        for backend in &self.backends[..index] {
            match backend.clear().await {
                Ok(()) => debug!("Cleared stale colors in {} backend", backend.name()),
                Err(e) => warn!("Failed to clear stale colors: {}", e),
            }
        }
    }
}

#[cfg(test)]
pub mod mock_backend {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// In-memory backend whose reads and writes can be made to fail.
    #[derive(Clone, Default)]
    pub struct MockBackend {
        name: String,
        content: Arc<Mutex<Option<String>>>,
        fail_read: Arc<AtomicBool>,
        fail_write: Arc<AtomicBool>,
        fail_clear: Arc<AtomicBool>,
        writes: Arc<AtomicUsize>,
    }

    impl MockBackend {
        pub fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                ..Default::default()
            }
        }

        pub fn with_content(self, text: &str) -> Self {
            *self.content.lock().unwrap() = Some(text.to_string());
            self
        }

        pub fn set_fail_read(&self, fail: bool) {
            self.fail_read.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_write(&self, fail: bool) {
            self.fail_write.store(fail, Ordering::SeqCst);
        }

        pub fn set_fail_clear(&self, fail: bool) {
            self.fail_clear.store(fail, Ordering::SeqCst);
        }

        pub fn content(&self) -> Option<String> {
            self.content.lock().unwrap().clone()
        }

        pub fn map(&self) -> Option<ColorMap> {
            self.content().map(|t| serde_json::from_str(&t).unwrap())
        }

        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StorageBackend for MockBackend {
        fn name(&self) -> &str {
            &self.name
        }

        async fn read(&self) -> Result<Option<String>, BackendError> {
            if self.fail_read.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable {
                    backend: self.name.clone(),
                    reason: "read disabled".to_string(),
                });
            }
            Ok(self.content())
        }

        async fn write(&self, text: &str) -> Result<(), BackendError> {
            if self.fail_write.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable {
                    backend: self.name.clone(),
                    reason: "write disabled".to_string(),
                });
            }
            *self.content.lock().unwrap() = Some(text.to_string());
            self.writes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn clear(&self) -> Result<(), BackendError> {
            if self.fail_clear.load(Ordering::SeqCst) {
                return Err(BackendError::Unavailable {
                    backend: self.name.clone(),
                    reason: "clear disabled".to_string(),
                });
            }
            *self.content.lock().unwrap() = None;
            Ok(())
        }
    }
}
