use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use super::edit::{EditOutcome, EditSession};
use super::favicon::{average_favicon_color, FaviconSummary};
use super::picker_lease::{PickerLease, PickerRedirect};
use super::registry::AugmentationRegistry;
use crate::config::{Config, FaviconConfig};
use crate::host::{
    ColorPicker, EditorKey, FaviconDecoder, FolderRequest, FolderService, GroupTree, HostError,
    PickerError,
};
use crate::models::{GroupId, MenuAction, AUGMENTED_MARKER, WORKSPACE_ATTRIBUTE};
use crate::store::{paint, BackendError, ColorStore, RemoveOutcome};

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("{0} is not available")]
    CollaboratorMissing(&'static str),

    #[error("Host operation failed: {0}")]
    HostOperation(#[from] HostError),

    #[error("Color picker failed: {0}")]
    Picker(#[from] PickerError),

    #[error("Color storage failed: {0}")]
    Backend(#[from] BackendError),
}

/// What `process` did with a group. None of these is an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Augmented,
    AlreadyProcessed,
    FolderVariant,
    StructureMissing,
}

/// Optional host subsystems the augmenter borrows for individual actions.
#[derive(Clone, Default)]
pub struct Collaborators {
    pub picker: Option<Arc<dyn ColorPicker>>,
    pub folders: Option<Arc<dyn FolderService>>,
    pub decoder: Option<Arc<dyn FaviconDecoder>>,
}

/// Fits groups with controls and carries out what those controls ask for.
pub struct GroupAugmenter {
    registry: AugmentationRegistry,
    edit: EditSession,
    collaborators: Collaborators,
    lease: Option<PickerLease>,
    redirects: UnboundedSender<PickerRedirect>,
    favicon: FaviconConfig,
    folder_label: String,
}

impl GroupAugmenter {
    pub fn new(
        collaborators: Collaborators,
        config: &Config,
        redirects: UnboundedSender<PickerRedirect>,
    ) -> Self {
        Self {
            registry: AugmentationRegistry::new(),
            edit: EditSession::new(),
            collaborators,
            lease: None,
            redirects,
            favicon: config.favicon,
            folder_label: config.folders.default_label.clone(),
        }
    }

    pub fn registry(&self) -> &AugmentationRegistry {
        &self.registry
    }

    pub fn edit_session(&self) -> &EditSession {
        &self.edit
    }

    pub fn leased_group(&self) -> Option<GroupId> {
        self.lease.as_ref().and_then(PickerLease::group)
    }

    /// Attach controls to `group` unless it already has them or cannot take
    /// them.
    pub fn process(&mut self, tree: &mut dyn GroupTree, group: &GroupId) -> ProcessOutcome {
        if !tree.contains_group(group) {
            return ProcessOutcome::StructureMissing;
        }

        let marked = tree.has_attribute(group, AUGMENTED_MARKER);
        match (self.registry.is_augmented(group), marked) {
            (true, true) => {
                self.build_menu(tree, group);
                return ProcessOutcome::AlreadyProcessed;
            }
            (true, false) => {
                debug!("Group {} was re-rendered, augmenting again", group);
                self.registry.reset(group);
            }
            (false, true) => {
                self.registry.mark_augmented(group);
                self.registry.mark_menu_built(group);
                return ProcessOutcome::AlreadyProcessed;
            }
            (false, false) => {}
        }

        if tree.is_folder(group) {
            return ProcessOutcome::FolderVariant;
        }
        if !tree.has_label_container(group) {
            debug!("Group {} has no label container yet", group);
            return ProcessOutcome::StructureMissing;
        }
        if tree.has_close_control(group) {
            return ProcessOutcome::AlreadyProcessed;
        }

        if let Err(e) = tree.insert_icon_slot(group) {
            warn!("Failed to attach icon slot to group {}: {}", group, e);
            return ProcessOutcome::StructureMissing;
        }
        if let Err(e) = tree.append_close_control(group) {
            warn!("Failed to attach close control to group {}: {}", group, e);
            tree.remove_icon_slot(group);
            return ProcessOutcome::StructureMissing;
        }
        if let Err(e) = tree.set_attribute(group, AUGMENTED_MARKER, "true") {
            warn!("Failed to mark group {}: {}", group, e);
        }
        self.registry.mark_augmented(group);

        if let Err(e) = tree.bind_rename_gesture(group) {
            warn!("Failed to bind rename gesture on group {}: {}", group, e);
        }
        self.build_menu(tree, group);

        debug!("Augmented group {}", group);
        ProcessOutcome::Augmented
    }

    fn build_menu(&mut self, tree: &mut dyn GroupTree, group: &GroupId) {
        if self.registry.is_menu_built(group) {
            return;
        }
        match tree.install_context_menu(group, &MenuAction::ALL) {
            Ok(()) => self.registry.mark_menu_built(group),
            Err(e) => error!("Failed to add context menu to group {}: {}", group, e),
        }
    }

    /// Close control: drop the color record, then the group. Both steps are
    /// attempted regardless of the other.
    pub async fn close(&mut self, tree: &mut dyn GroupTree, store: &ColorStore, group: &GroupId) {
        if self.edit.active_group() == Some(group) {
            self.edit.blur(tree);
        }
        self.forget_picker_target(group);

        match store.remove(group).await {
            Ok(RemoveOutcome::Removed) => debug!("Removed saved color of group {}", group),
            Ok(_) => {}
            Err(e) => error!("Failed to remove color of group {}: {}", group, e),
        }
        match tree.remove_group(group) {
            Ok(()) => info!("Closed group {}", group),
            Err(e) => error!("Failed to remove group {}: {}", group, e),
        }
        self.registry.reset(group);
    }

    pub fn begin_rename(&mut self, tree: &mut dyn GroupTree, group: &GroupId) {
        match self.edit.begin(tree, group) {
            Ok(true) => debug!("Renaming group {}", group),
            Ok(false) => {}
            Err(e) => warn!("Cannot rename group {}: {}", group, e),
        }
    }

    pub fn editor_key(&mut self, tree: &mut dyn GroupTree, key: EditorKey, value: &str) {
        if let EditOutcome::Renamed { group, label } = self.edit.handle_key(tree, key, value) {
            info!("Renamed group {} to {:?}", group, label);
        }
    }

    pub fn editor_blurred(&mut self, tree: &mut dyn GroupTree) {
        self.edit.blur(tree);
    }

    /// Lease the picker for `group` and open its panel.
    pub fn start_color_pick(&mut self, group: &GroupId) -> Result<(), ActionError> {
        let picker = self
            .collaborators
            .picker
            .clone()
            .ok_or(ActionError::CollaboratorMissing("color picker"))?;

        self.lease = None;
        let lease = PickerLease::acquire(picker, group.clone(), self.redirects.clone());
        lease.open_panel()?;
        self.lease = Some(lease);
        Ok(())
    }

    /// The user changed the dots while `group` held the picker.
    pub async fn picker_committed(
        &mut self,
        tree: &mut dyn GroupTree,
        store: &ColorStore,
        group: &GroupId,
    ) {
        let Some(lease) = self.lease.as_ref().filter(|l| l.holds(group)) else {
            debug!("Stale picker commit for group {}", group);
            return;
        };
        match lease.current_color() {
            Ok(Some(color)) => apply_and_save(tree, store, group, &color).await,
            Ok(None) => {}
            Err(e) => warn!("Failed to compute color for group {}: {}", group, e),
        }
    }

    /// Panel closed: apply the final color, then release the picker.
    pub async fn picker_closed(&mut self, tree: &mut dyn GroupTree, store: &ColorStore) {
        let Some(lease) = self.lease.take() else {
            return;
        };
        if let Some(group) = lease.group() {
            match lease.current_color() {
                Ok(Some(color)) if tree.contains_group(&group) => {
                    apply_and_save(tree, store, &group, &color).await
                }
                Ok(_) => {}
                Err(e) => warn!("Failed to compute final color for group {}: {}", group, e),
            }
        }
        drop(lease);
    }

    /// The group holding the picker is going away; let the picker behave
    /// normally until its panel closes.
    fn forget_picker_target(&mut self, group: &GroupId) {
        if let Some(lease) = self.lease.as_ref().filter(|l| l.holds(group)) {
            lease.clear_target();
        }
    }

    pub fn release_picker(&mut self) {
        self.lease = None;
    }

    pub fn clear_picker_scratch(&self) {
        if let Some(picker) = &self.collaborators.picker {
            picker.clear_dot_colors();
        }
    }

    /// Build the favicon job for `group`; it owns everything it needs so it
    /// can run on its own task.
    pub fn favicon_job(
        &self,
        tree: &dyn GroupTree,
        group: &GroupId,
    ) -> Result<impl Future<Output = FaviconSummary> + Send + 'static, ActionError> {
        let decoder = self
            .collaborators
            .decoder
            .clone()
            .ok_or(ActionError::CollaboratorMissing("favicon decoder"))?;
        if !tree.contains_group(group) {
            return Err(HostError::GroupNotFound(group.clone()).into());
        }

        let sources = tree
            .member_items(group)
            .into_iter()
            .map(|item| item.favicon)
            .collect();
        Ok(average_favicon_color(
            decoder,
            group.clone(),
            sources,
            self.favicon,
        ))
    }

    pub async fn apply_favicon_color(
        &mut self,
        tree: &mut dyn GroupTree,
        store: &ColorStore,
        summary: FaviconSummary,
    ) {
        let Some(color) = summary.color else {
            debug!(
                "No usable favicons in group {} ({} of {} failed)",
                summary.group, summary.failed, summary.total
            );
            return;
        };
        if !tree.contains_group(&summary.group) {
            debug!("Group {} closed before its favicons settled", summary.group);
            return;
        }
        apply_and_save(tree, store, &summary.group, &color.to_css()).await;
    }

    /// Replace the group with a folder holding its items.
    ///
    /// Returns the new folder's id, or `None` when the group has no items or
    /// the folder service refused.
    pub async fn convert_to_folder(
        &mut self,
        tree: &mut dyn GroupTree,
        store: &ColorStore,
        group: &GroupId,
    ) -> Result<Option<String>, ActionError> {
        let folders = self
            .collaborators
            .folders
            .clone()
            .ok_or(ActionError::CollaboratorMissing("folder service"))?;

        let items: Vec<_> = tree
            .member_items(group)
            .into_iter()
            .map(|item| item.id)
            .collect();
        if items.is_empty() {
            debug!("Group {} has no tabs to move into a folder", group);
            return Ok(None);
        }

        let label = tree
            .label(group)
            .filter(|l| !l.trim().is_empty())
            .unwrap_or_else(|| self.folder_label.clone());
        let request = FolderRequest {
            label,
            workspace_id: tree
                .attribute(group, WORKSPACE_ATTRIBUTE)
                .or_else(|| folders.active_workspace()),
        };

        let folder = match folders.create_folder(&items, &request) {
            Ok(folder) => folder,
            Err(e) => {
                error!("Failed to convert group {} to folder: {}", group, e);
                return Ok(None);
            }
        };
        info!("Converted group {} to folder {}", group, folder);

        self.forget_picker_target(group);
        if let Err(e) = tree.remove_group(group) {
            error!("Failed to remove converted group {}: {}", group, e);
        }
        if let Err(e) = store.remove(group).await {
            error!("Failed to remove color of group {}: {}", group, e);
        }
        self.registry.reset(group);
        Ok(Some(folder))
    }

    /// Context-menu entries other than the favicon color, which runs as a
    /// background job owned by the caller.
    pub async fn menu_action(
        &mut self,
        tree: &mut dyn GroupTree,
        store: &ColorStore,
        group: &GroupId,
        action: MenuAction,
    ) -> Result<(), ActionError> {
        match action {
            MenuAction::SetColor => self.start_color_pick(group)?,
            MenuAction::ConvertToFolder => {
                self.convert_to_folder(tree, store, group).await?;
            }
            MenuAction::Rename => self.begin_rename(tree, group),
            MenuAction::Close => self.close(tree, store, group).await,
            MenuAction::ToggleCollapse => {
                let collapsed = tree.is_collapsed(group);
                tree.set_collapsed(group, !collapsed)?;
            }
            MenuAction::Expand => tree.set_collapsed(group, false)?,
            MenuAction::FaviconColor => {
                debug!("Favicon color for {} is scheduled by the app", group);
            }
        }
        Ok(())
    }

    /// Forget groups the host no longer has.
    pub fn prune(&mut self, tree: &dyn GroupTree) {
        self.registry.retain_present(|id| tree.contains_group(id));
    }
}

async fn apply_and_save(tree: &mut dyn GroupTree, store: &ColorStore, group: &GroupId, color: &str) {
    if let Err(e) = paint(tree, group, color) {
        warn!("Failed to apply color to group {}: {}", group, e);
        return;
    }
    debug!("Applied color {} to group {}", color, group);
    if let Err(e) = store.save_all(tree).await {
        error!("Failed to save group colors: {}", e);
    }
}
