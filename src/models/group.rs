use serde::{Deserialize, Serialize};

/// Stable identifier the host assigns to a tab group
pub type GroupId = String;

/// Identifier of any node in the host tree (groups, containers, tabs)
pub type NodeId = String;

/// Identifier of a member item (tab) of a group
pub type ItemId = String;

/// Style property carrying the group color
pub const COLOR_PROPERTY: &str = "--tab-group-color";

/// Style property carrying the inverted group color (always mirrors the primary)
pub const COLOR_INVERT_PROPERTY: &str = "--tab-group-color-invert";

/// Marker attribute set on a group once its controls are attached
pub const AUGMENTED_MARKER: &str = "data-close-button-added";

/// Attribute carrying the workspace a group belongs to
pub const WORKSPACE_ATTRIBUTE: &str = "zen-workspace-id";

/// A member tab as seen through the host contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberItem {
    pub id: ItemId,
    /// Favicon source; `None` when the tab has no icon loaded.
    #[serde(default)]
    pub favicon: Option<String>,
}

impl MemberItem {
    pub fn new(id: impl Into<ItemId>) -> Self {
        Self {
            id: id.into(),
            favicon: None,
        }
    }

    pub fn with_favicon(mut self, src: impl Into<String>) -> Self {
        self.favicon = Some(src.into());
        self
    }
}

/// Read-only view of a group used for reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub id: GroupId,
    pub label: String,
    pub collapsed: bool,
    pub color: Option<String>,
    pub augmented: bool,
}
