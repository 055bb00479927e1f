mod backend;
mod color_store;
mod file;
mod keyvalue;

#[allow(unused_imports)]
pub use backend::{BackendChain, BackendError, StorageBackend};
pub use color_store::{paint, ColorStore, RemoveOutcome};
#[allow(unused_imports)]
pub use file::FileBackend;
#[allow(unused_imports)]
pub use keyvalue::KeyValueBackend;

#[cfg(test)]
pub use backend::mock_backend;
