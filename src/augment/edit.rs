use tracing::{debug, warn};

use crate::host::{EditorKey, GroupTree, HostError, HostResult};
use crate::models::GroupId;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum EditState {
    #[default]
    Idle,
    Editing {
        group: GroupId,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Renamed { group: GroupId, label: String },
    /// Committed a blank value or the label it already had.
    Unchanged { group: GroupId },
    Cancelled { group: GroupId },
    /// No session was active; the event is stale.
    NotEditing,
}

/// The single inline rename interaction.
///
/// `begin` is only honored from [`EditState::Idle`]; every exit path goes
/// through the same teardown so the label is always restored.
#[derive(Debug, Default)]
pub struct EditSession {
    state: EditState,
}

impl EditSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.state != EditState::Idle
    }

    pub fn active_group(&self) -> Option<&GroupId> {
        match &self.state {
            EditState::Editing { group } => Some(group),
            EditState::Idle => None,
        }
    }

    /// Open the editor on `group`. Returns `Ok(false)` when another session
    /// is already active.
    pub fn begin(&mut self, tree: &mut dyn GroupTree, group: &GroupId) -> HostResult<bool> {
        if self.is_active() {
            debug!("Rename of {} ignored: a session is already active", group);
            return Ok(false);
        }
        if !tree.has_label_element(group) {
            return Err(HostError::StructureMissing {
                group: group.clone(),
                part: "label",
            });
        }
        let current = tree
            .label(group)
            .ok_or_else(|| HostError::GroupNotFound(group.clone()))?;

        tree.set_label_hidden(group, true)?;
        if let Err(e) = tree.insert_label_input(group, &current) {
            if let Err(restore) = tree.set_label_hidden(group, false) {
                debug!("Label of {} not restored: {}", group, restore);
            }
            return Err(e);
        }

        self.state = EditState::Editing {
            group: group.clone(),
        };
        Ok(true)
    }

    pub fn handle_key(
        &mut self,
        tree: &mut dyn GroupTree,
        key: EditorKey,
        value: &str,
    ) -> EditOutcome {
        let Some(group) = self.active_group().cloned() else {
            return EditOutcome::NotEditing;
        };

        let outcome = match key {
            EditorKey::Enter => {
                let label = value.trim();
                let current = tree.label(&group).unwrap_or_default();
                if label.is_empty() || label == current {
                    EditOutcome::Unchanged {
                        group: group.clone(),
                    }
                } else {
                    match tree.set_label(&group, label) {
                        Ok(()) => EditOutcome::Renamed {
                            group: group.clone(),
                            label: label.to_string(),
                        },
                        Err(e) => {
                            warn!("Failed to rename group {}: {}", group, e);
                            EditOutcome::Unchanged {
                                group: group.clone(),
                            }
                        }
                    }
                }
            }
            EditorKey::Escape => EditOutcome::Cancelled {
                group: group.clone(),
            },
        };

        self.teardown(tree, &group);
        outcome
    }

    /// Focus left the editor.
    pub fn blur(&mut self, tree: &mut dyn GroupTree) -> EditOutcome {
        match self.active_group().cloned() {
            Some(group) => {
                self.teardown(tree, &group);
                EditOutcome::Cancelled { group }
            }
            None => EditOutcome::NotEditing,
        }
    }

    fn teardown(&mut self, tree: &mut dyn GroupTree, group: &GroupId) {
        tree.remove_label_input(group);
        if let Err(e) = tree.set_label_hidden(group, false) {
            debug!("Label of {} not restored: {}", group, e);
        }
        self.state = EditState::Idle;
    }
}
