mod loader;

#[allow(unused_imports)]
pub use loader::{Config, FaviconConfig, FolderConfig, StorageConfig, TimingConfig};
