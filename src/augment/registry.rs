use std::collections::HashMap;

use crate::models::GroupId;

/// Per-group augmentation status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AugmentStatus {
    /// Controls have been attached to the group node.
    pub augmented: bool,
    /// The context menu has been installed. Tracked separately so a failed
    /// menu install never unmarks the group.
    pub menu_built: bool,
}

/// Registry of which groups have been fitted with controls.
///
/// The registry is the authority within one process lifetime. The host-side
/// marker attribute is still consulted: a group the registry remembers but
/// whose node lost the marker has been re-rendered by the host and must be
/// augmented again, while a marked node the registry has never seen was
/// augmented before a restart and must be left alone.
#[derive(Debug, Clone, Default)]
pub struct AugmentationRegistry {
    groups: HashMap<GroupId, AugmentStatus>,
}

impl AugmentationRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self, group: &str) -> AugmentStatus {
        self.groups.get(group).copied().unwrap_or_default()
    }

    pub fn is_augmented(&self, group: &str) -> bool {
        self.status(group).augmented
    }

    pub fn is_menu_built(&self, group: &str) -> bool {
        self.status(group).menu_built
    }

    pub fn mark_augmented(&mut self, group: &GroupId) {
        self.groups.entry(group.clone()).or_default().augmented = true;
    }

    pub fn mark_menu_built(&mut self, group: &GroupId) {
        self.groups.entry(group.clone()).or_default().menu_built = true;
    }

    /// Forget a group whose node was replaced; returns whether it was known.
    pub fn reset(&mut self, group: &str) -> bool {
        self.groups.remove(group).is_some()
    }

    /// Drop entries for groups that no longer exist.
    pub fn retain_present(&mut self, present: impl Fn(&GroupId) -> bool) {
        self.groups.retain(|id, _| present(id));
    }

    pub fn len(&self) -> usize {
        self.groups.values().filter(|s| s.augmented).count()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
