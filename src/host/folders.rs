use serde::{Deserialize, Serialize};

use super::HostResult;
use crate::models::ItemId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRequest {
    pub label: String,
    pub workspace_id: Option<String>,
}

/// Folder subsystem of the host.
pub trait FolderService: Send + Sync {
    fn active_workspace(&self) -> Option<String>;

    /// Create a folder holding `items`; returns the new folder's id.
    fn create_folder(&self, items: &[ItemId], request: &FolderRequest) -> HostResult<String>;
}
