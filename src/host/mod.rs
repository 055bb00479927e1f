//! Contracts for the host application that owns the tab-group tree.
//!
//! Nothing in this crate creates or destroys groups. Everything it knows about
//! a group, and everything it does to one, goes through [`GroupTree`]; the
//! color picker, folder subsystem and favicon pipeline are separate
//! collaborators the host may or may not provide.

mod decoder;
mod folders;
mod memory;
mod picker;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::models::{GroupId, MemberItem, MenuAction, NodeId};

#[allow(unused_imports)]
pub use decoder::{DecodeError, DecodedImage, FaviconDecoder, FileFaviconDecoder};
pub use folders::{FolderRequest, FolderService};
#[allow(unused_imports)]
pub use memory::{
    GroupNode, GroupSpec, MemoryFolders, MemoryPicker, MemoryTree, NodeSpec, ThemeHooks,
};
#[allow(unused_imports)]
pub use picker::{ColorPicker, DotColor, PickerError, PickerHooks};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HostError {
    #[error("Group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Group {group} is missing its {part}")]
    StructureMissing { group: GroupId, part: &'static str },

    #[error("Host rejected operation: {0}")]
    Rejected(String),

    #[error("Mutation observer already connected")]
    AlreadyObserving,
}

pub type HostResult<T> = Result<T, HostError>;

/// One delivery of structural changes: the nodes inserted since the last one.
///
/// An inserted node may carry a whole subtree (e.g. a restored window).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationBatch {
    pub added: Vec<NodeId>,
}

impl MutationBatch {
    pub fn new(added: Vec<NodeId>) -> Self {
        Self { added }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditorKey {
    Enter,
    Escape,
}

/// User interaction routed back from the controls this crate attached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    CloseClicked { group: GroupId },
    LabelDoubleClicked { group: GroupId },
    MenuCommand { group: GroupId, action: MenuAction },
    EditorKey { key: EditorKey, value: String },
    EditorBlurred,
    PickerClosed,
    Shutdown,
}

/// The host's tab-group tree.
///
/// Methods are synchronous: the host model is only touched from the single
/// event loop, between suspension points.
pub trait GroupTree {
    fn root(&self) -> NodeId;

    /// Start delivering [`MutationBatch`]es for insertions under `root`.
    fn observe(&mut self, root: &NodeId) -> HostResult<UnboundedReceiver<MutationBatch>>;

    /// Release the mutation subscription.
    fn disconnect(&mut self);

    /// Every group currently present, in tree order.
    fn all_groups(&self) -> Vec<GroupId>;

    /// The group `node` itself is, if it is one.
    fn group_at(&self, node: &NodeId) -> Option<GroupId>;

    /// Groups nested anywhere below `node` (not including `node`).
    fn groups_within(&self, node: &NodeId) -> Vec<GroupId>;

    fn contains_group(&self, group: &GroupId) -> bool;

    /// Whether the node is a folder variant (class or attribute `zen-folder`).
    fn is_folder(&self, group: &GroupId) -> bool;

    fn has_label_container(&self, group: &GroupId) -> bool;
    fn has_label_element(&self, group: &GroupId) -> bool;
    fn has_close_control(&self, group: &GroupId) -> bool;

    fn label(&self, group: &GroupId) -> Option<String>;
    fn set_label(&mut self, group: &GroupId, label: &str) -> HostResult<()>;

    fn is_collapsed(&self, group: &GroupId) -> bool;
    fn set_collapsed(&mut self, group: &GroupId, collapsed: bool) -> HostResult<()>;

    fn style_property(&self, group: &GroupId, name: &str) -> Option<String>;
    fn set_style_property(&mut self, group: &GroupId, name: &str, value: &str) -> HostResult<()>;
    fn remove_style_property(&mut self, group: &GroupId, name: &str) -> HostResult<()>;

    fn attribute(&self, group: &GroupId, name: &str) -> Option<String>;
    fn set_attribute(&mut self, group: &GroupId, name: &str, value: &str) -> HostResult<()>;

    fn has_attribute(&self, group: &GroupId, name: &str) -> bool {
        self.attribute(group, name).is_some()
    }

    fn member_items(&self, group: &GroupId) -> Vec<MemberItem>;

    fn insert_icon_slot(&mut self, group: &GroupId) -> HostResult<()>;
    fn append_close_control(&mut self, group: &GroupId) -> HostResult<()>;
    fn remove_icon_slot(&mut self, group: &GroupId);

    /// Route double-activation on the label back as [`UiEvent::LabelDoubleClicked`].
    fn bind_rename_gesture(&mut self, group: &GroupId) -> HostResult<()>;

    /// Attach a context menu to the label container; selections come back
    /// as [`UiEvent::MenuCommand`].
    fn install_context_menu(&mut self, group: &GroupId, entries: &[MenuAction]) -> HostResult<()>;

    fn set_label_hidden(&mut self, group: &GroupId, hidden: bool) -> HostResult<()>;

    /// Insert a focused, fully selected text input next to the label.
    fn insert_label_input(&mut self, group: &GroupId, initial: &str) -> HostResult<()>;
    fn remove_label_input(&mut self, group: &GroupId);

    fn remove_group(&mut self, group: &GroupId) -> HostResult<()>;
}
