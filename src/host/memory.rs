//! In-process host: a tab-group tree, color picker and folder subsystem
//! kept entirely in memory. Drives `atg replay` and the test suites.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::folders::{FolderRequest, FolderService};
use super::picker::{ColorPicker, DotColor, PickerError, PickerHooks};
use super::{GroupTree, HostError, HostResult, MutationBatch};
use crate::models::{
    ColorSample, GroupId, ItemId, MemberItem, MenuAction, NodeId, COLOR_INVERT_PROPERTY,
    COLOR_PROPERTY, WORKSPACE_ATTRIBUTE,
};

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSpec {
    pub id: GroupId,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub collapsed: bool,
    #[serde(default)]
    pub folder: bool,
    #[serde(default = "default_true")]
    pub label_container: bool,
    #[serde(default)]
    pub workspace: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub items: Vec<MemberItem>,
}

impl GroupSpec {
    pub fn new(id: impl Into<GroupId>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            collapsed: false,
            folder: false,
            label_container: true,
            workspace: None,
            color: None,
            items: Vec::new(),
        }
    }

    pub fn folder(mut self) -> Self {
        self.folder = true;
        self
    }

    pub fn without_label_container(mut self) -> Self {
        self.label_container = false;
        self
    }

    pub fn with_items(mut self, items: Vec<MemberItem>) -> Self {
        self.items = items;
        self
    }

    pub fn with_workspace(mut self, workspace: impl Into<String>) -> Self {
        self.workspace = Some(workspace.into());
        self
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeSpec {
    Group(GroupSpec),
    Container {
        id: NodeId,
        #[serde(default)]
        children: Vec<NodeSpec>,
    },
}

impl NodeSpec {
    pub fn container(id: impl Into<NodeId>, children: Vec<NodeSpec>) -> Self {
        Self::Container {
            id: id.into(),
            children,
        }
    }

    fn id(&self) -> &NodeId {
        match self {
            NodeSpec::Group(g) => &g.id,
            NodeSpec::Container { id, .. } => id,
        }
    }
}

impl From<GroupSpec> for NodeSpec {
    fn from(spec: GroupSpec) -> Self {
        NodeSpec::Group(spec)
    }
}

/// Host-side state of one group element, including the controls attached to it.
#[derive(Debug, Clone, Default)]
pub struct GroupNode {
    pub label: String,
    pub collapsed: bool,
    pub folder: bool,
    pub label_container: bool,
    pub label_hidden: bool,
    pub input: Option<String>,
    pub styles: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
    pub items: Vec<MemberItem>,
    pub icon_slots: usize,
    pub close_controls: usize,
    pub rename_bindings: usize,
    pub context_menus: usize,
    pub menu_entries: Vec<MenuAction>,
}

impl GroupNode {
    fn from_spec(spec: &GroupSpec) -> Self {
        let mut node = Self {
            label: spec.label.clone(),
            collapsed: spec.collapsed,
            folder: spec.folder,
            label_container: spec.label_container,
            items: spec.items.clone(),
            ..Default::default()
        };
        if let Some(ws) = &spec.workspace {
            node.attributes
                .insert(WORKSPACE_ATTRIBUTE.to_string(), ws.clone());
        }
        if let Some(color) = &spec.color {
            node.styles.insert(COLOR_PROPERTY.to_string(), color.clone());
            node.styles
                .insert(COLOR_INVERT_PROPERTY.to_string(), color.clone());
        }
        node
    }

    pub fn color(&self) -> Option<&str> {
        self.styles.get(COLOR_PROPERTY).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
enum NodeKind {
    Container,
    Group(Box<GroupNode>),
}

#[derive(Debug, Clone)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// A subtree taken out of the tree with all host state intact.
#[derive(Debug, Clone)]
pub struct DetachedSubtree {
    root: NodeId,
    nodes: Vec<(NodeId, Node)>,
}

pub struct MemoryTree {
    root: NodeId,
    nodes: HashMap<NodeId, Node>,
    observer: Option<UnboundedSender<MutationBatch>>,
    removed: Vec<GroupId>,
    fail_removals: bool,
    fail_menu_install: bool,
    fail_close_control: bool,
    fail_label_input: bool,
}

impl MemoryTree {
    pub fn new(root: impl Into<NodeId>) -> Self {
        let root = root.into();
        let mut nodes = HashMap::new();
        nodes.insert(
            root.clone(),
            Node {
                kind: NodeKind::Container,
                parent: None,
                children: Vec::new(),
            },
        );
        Self {
            root,
            nodes,
            observer: None,
            removed: Vec::new(),
            fail_removals: false,
            fail_menu_install: false,
            fail_close_control: false,
            fail_label_input: false,
        }
    }

    pub fn set_fail_removals(&mut self, fail: bool) {
        self.fail_removals = fail;
    }

    pub fn set_fail_menu_install(&mut self, fail: bool) {
        self.fail_menu_install = fail;
    }

    pub fn set_fail_close_control(&mut self, fail: bool) {
        self.fail_close_control = fail;
    }

    pub fn set_fail_label_input(&mut self, fail: bool) {
        self.fail_label_input = fail;
    }

    pub fn is_observed(&self) -> bool {
        self.observer.is_some()
    }

    pub fn group(&self, id: &str) -> Option<&GroupNode> {
        match &self.nodes.get(id)?.kind {
            NodeKind::Group(g) => Some(&**g),
            NodeKind::Container => None,
        }
    }

    pub fn removed_groups(&self) -> &[GroupId] {
        &self.removed
    }

    /// Insert a subtree without notifying observers (initial paint).
    pub fn seed(&mut self, parent: &NodeId, spec: NodeSpec) -> HostResult<NodeId> {
        self.build(parent, &spec)?;
        Ok(spec.id().clone())
    }

    /// Insert subtrees under `parent` and deliver them as one batch.
    pub fn insert(&mut self, parent: &NodeId, specs: Vec<NodeSpec>) -> HostResult<Vec<NodeId>> {
        let mut added = Vec::with_capacity(specs.len());
        for spec in &specs {
            self.build(parent, spec)?;
            added.push(spec.id().clone());
        }
        self.emit(added.clone());
        Ok(added)
    }

    /// Take a subtree out of the tree, keeping attributes and controls.
    pub fn detach(&mut self, node: &NodeId) -> HostResult<DetachedSubtree> {
        if *node == self.root {
            return Err(HostError::Rejected("cannot detach root".to_string()));
        }
        let ids = self.subtree_ids(node)?;
        self.unlink(node);
        let nodes = ids
            .into_iter()
            .filter_map(|id| self.nodes.remove(&id).map(|n| (id, n)))
            .collect();
        Ok(DetachedSubtree {
            root: node.clone(),
            nodes,
        })
    }

    /// Put a detached subtree back under `parent` and notify observers.
    pub fn reattach(&mut self, parent: &NodeId, subtree: DetachedSubtree) -> HostResult<()> {
        self.nodes
            .get_mut(parent)
            .ok_or_else(|| HostError::NodeNotFound(parent.clone()))?
            .children
            .push(subtree.root.clone());
        for (id, mut node) in subtree.nodes {
            if id == subtree.root {
                node.parent = Some(parent.clone());
            }
            self.nodes.insert(id, node);
        }
        self.emit(vec![subtree.root]);
        Ok(())
    }

    /// Replace a group element with a freshly rendered one: same id, label,
    /// items and styles, but none of the attributes or controls added to it.
    pub fn rerender_group(&mut self, id: &GroupId) -> HostResult<()> {
        let group = self.group_mut(id)?;
        let fresh = GroupNode {
            label: group.label.clone(),
            collapsed: group.collapsed,
            folder: group.folder,
            label_container: group.label_container,
            styles: group.styles.clone(),
            attributes: group
                .attributes
                .iter()
                .filter(|(k, _)| k.as_str() == WORKSPACE_ATTRIBUTE)
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            items: group.items.clone(),
            ..Default::default()
        };
        *group = fresh;
        self.emit(vec![id.clone()]);
        Ok(())
    }

    fn build(&mut self, parent: &NodeId, spec: &NodeSpec) -> HostResult<()> {
        if !self.nodes.contains_key(parent) {
            return Err(HostError::NodeNotFound(parent.clone()));
        }
        if self.nodes.contains_key(spec.id()) {
            return Err(HostError::Rejected(format!("duplicate node id {}", spec.id())));
        }

        let kind = match spec {
            NodeSpec::Group(g) => NodeKind::Group(Box::new(GroupNode::from_spec(g))),
            NodeSpec::Container { .. } => NodeKind::Container,
        };
        self.nodes.insert(
            spec.id().clone(),
            Node {
                kind,
                parent: Some(parent.clone()),
                children: Vec::new(),
            },
        );
        if let Some(p) = self.nodes.get_mut(parent) {
            p.children.push(spec.id().clone());
        }

        if let NodeSpec::Container { id, children } = spec {
            for child in children {
                self.build(id, child)?;
            }
        }
        Ok(())
    }

    fn emit(&self, added: Vec<NodeId>) {
        if let Some(tx) = &self.observer {
            let _ = tx.send(MutationBatch::new(added));
        }
    }

    fn unlink(&mut self, node: &NodeId) {
        let parent = self.nodes.get(node).and_then(|n| n.parent.clone());
        if let Some(p) = parent.and_then(|p| self.nodes.get_mut(&p)) {
            p.children.retain(|c| c != node);
        }
    }

    fn subtree_ids(&self, node: &NodeId) -> HostResult<Vec<NodeId>> {
        if !self.nodes.contains_key(node) {
            return Err(HostError::NodeNotFound(node.clone()));
        }
        let mut ids = Vec::new();
        let mut stack = vec![node.clone()];
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get(&id) {
                stack.extend(n.children.iter().rev().cloned());
            }
            ids.push(id);
        }
        Ok(ids)
    }

    fn descendants(&self, node: &NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = match self.nodes.get(node) {
            Some(n) => n.children.iter().rev().cloned().collect(),
            None => return out,
        };
        while let Some(id) = stack.pop() {
            if let Some(n) = self.nodes.get(&id) {
                stack.extend(n.children.iter().rev().cloned());
            }
            out.push(id);
        }
        out
    }

    fn group_mut(&mut self, id: &GroupId) -> HostResult<&mut GroupNode> {
        match self.nodes.get_mut(id).map(|n| &mut n.kind) {
            Some(NodeKind::Group(g)) => Ok(&mut **g),
            _ => Err(HostError::GroupNotFound(id.clone())),
        }
    }

    fn label_container_mut(&mut self, id: &GroupId) -> HostResult<&mut GroupNode> {
        let group = self.group_mut(id)?;
        if !group.label_container {
            return Err(HostError::StructureMissing {
                group: id.clone(),
                part: "label container",
            });
        }
        Ok(group)
    }
}

impl GroupTree for MemoryTree {
    fn root(&self) -> NodeId {
        self.root.clone()
    }

    fn observe(&mut self, root: &NodeId) -> HostResult<UnboundedReceiver<MutationBatch>> {
        if self.observer.is_some() {
            return Err(HostError::AlreadyObserving);
        }
        if !self.nodes.contains_key(root) {
            return Err(HostError::NodeNotFound(root.clone()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.observer = Some(tx);
        Ok(rx)
    }

    fn disconnect(&mut self) {
        self.observer = None;
    }

    fn all_groups(&self) -> Vec<GroupId> {
        self.descendants(&self.root)
            .into_iter()
            .filter(|id| self.group(id).is_some())
            .collect()
    }

    fn group_at(&self, node: &NodeId) -> Option<GroupId> {
        self.group(node).map(|_| node.clone())
    }

    fn groups_within(&self, node: &NodeId) -> Vec<GroupId> {
        self.descendants(node)
            .into_iter()
            .filter(|id| self.group(id).is_some())
            .collect()
    }

    fn contains_group(&self, group: &GroupId) -> bool {
        self.group(group).is_some()
    }

    fn is_folder(&self, group: &GroupId) -> bool {
        self.group(group)
            .is_some_and(|g| g.folder || g.attributes.contains_key("zen-folder"))
    }

    fn has_label_container(&self, group: &GroupId) -> bool {
        self.group(group).is_some_and(|g| g.label_container)
    }

    fn has_label_element(&self, group: &GroupId) -> bool {
        self.has_label_container(group)
    }

    fn has_close_control(&self, group: &GroupId) -> bool {
        self.group(group).is_some_and(|g| g.close_controls > 0)
    }

    fn label(&self, group: &GroupId) -> Option<String> {
        self.group(group).map(|g| g.label.clone())
    }

    fn set_label(&mut self, group: &GroupId, label: &str) -> HostResult<()> {
        self.group_mut(group)?.label = label.to_string();
        Ok(())
    }

    fn is_collapsed(&self, group: &GroupId) -> bool {
        self.group(group).is_some_and(|g| g.collapsed)
    }

    fn set_collapsed(&mut self, group: &GroupId, collapsed: bool) -> HostResult<()> {
        self.group_mut(group)?.collapsed = collapsed;
        Ok(())
    }

    fn style_property(&self, group: &GroupId, name: &str) -> Option<String> {
        self.group(group)?.styles.get(name).cloned()
    }

    fn set_style_property(&mut self, group: &GroupId, name: &str, value: &str) -> HostResult<()> {
        self.group_mut(group)?
            .styles
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn remove_style_property(&mut self, group: &GroupId, name: &str) -> HostResult<()> {
        self.group_mut(group)?.styles.remove(name);
        Ok(())
    }

    fn attribute(&self, group: &GroupId, name: &str) -> Option<String> {
        self.group(group)?.attributes.get(name).cloned()
    }

    fn set_attribute(&mut self, group: &GroupId, name: &str, value: &str) -> HostResult<()> {
        self.group_mut(group)?
            .attributes
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn member_items(&self, group: &GroupId) -> Vec<MemberItem> {
        self.group(group).map(|g| g.items.clone()).unwrap_or_default()
    }

    fn insert_icon_slot(&mut self, group: &GroupId) -> HostResult<()> {
        self.label_container_mut(group)?.icon_slots += 1;
        Ok(())
    }

    fn append_close_control(&mut self, group: &GroupId) -> HostResult<()> {
        if self.fail_close_control {
            return Err(HostError::Rejected("close button rejected".to_string()));
        }
        self.label_container_mut(group)?.close_controls += 1;
        Ok(())
    }

    fn remove_icon_slot(&mut self, group: &GroupId) {
        if let Ok(node) = self.group_mut(group) {
            node.icon_slots = node.icon_slots.saturating_sub(1);
        }
    }

    fn bind_rename_gesture(&mut self, group: &GroupId) -> HostResult<()> {
        self.label_container_mut(group)?.rename_bindings += 1;
        Ok(())
    }

    fn install_context_menu(&mut self, group: &GroupId, entries: &[MenuAction]) -> HostResult<()> {
        if self.fail_menu_install {
            return Err(HostError::Rejected("menupopup unavailable".to_string()));
        }
        let node = self.label_container_mut(group)?;
        node.context_menus += 1;
        node.menu_entries = entries.to_vec();
        Ok(())
    }

    fn set_label_hidden(&mut self, group: &GroupId, hidden: bool) -> HostResult<()> {
        self.label_container_mut(group)?.label_hidden = hidden;
        Ok(())
    }

    fn insert_label_input(&mut self, group: &GroupId, initial: &str) -> HostResult<()> {
        if self.fail_label_input {
            return Err(HostError::Rejected("input element rejected".to_string()));
        }
        self.label_container_mut(group)?.input = Some(initial.to_string());
        Ok(())
    }

    fn remove_label_input(&mut self, group: &GroupId) {
        if let Ok(node) = self.group_mut(group) {
            node.input = None;
        }
    }

    fn remove_group(&mut self, group: &GroupId) -> HostResult<()> {
        if self.fail_removals {
            return Err(HostError::Rejected(format!("removeTabGroup({group}) failed")));
        }
        if !self.contains_group(group) {
            return Err(HostError::GroupNotFound(group.clone()));
        }
        let ids = self.subtree_ids(group)?;
        self.unlink(group);
        for id in ids {
            self.nodes.remove(&id);
        }
        self.removed.push(group.clone());
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Default picker hooks: stand-ins for repainting the browser theme.
#[derive(Debug, Default)]
pub struct ThemeHooks {
    commits: AtomicUsize,
    workspace_changes: AtomicUsize,
}

impl ThemeHooks {
    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub fn workspace_changes(&self) -> usize {
        self.workspace_changes.load(Ordering::SeqCst)
    }
}

impl PickerHooks for ThemeHooks {
    fn commit(&self) {
        self.commits.fetch_add(1, Ordering::SeqCst);
    }

    fn workspace_changed(&self, _workspace: Option<&str>) {
        self.workspace_changes.fetch_add(1, Ordering::SeqCst);
    }
}

struct PickerState {
    hooks: Arc<dyn PickerHooks>,
    dots: Vec<DotColor>,
    panel_open: bool,
    fail_gradient: bool,
    fail_open: bool,
}

pub struct MemoryPicker {
    theme: Arc<ThemeHooks>,
    state: Mutex<PickerState>,
}

impl MemoryPicker {
    pub fn new(dots: Vec<DotColor>) -> Self {
        let theme = Arc::new(ThemeHooks::default());
        Self {
            state: Mutex::new(PickerState {
                hooks: theme.clone(),
                dots,
                panel_open: false,
                fail_gradient: false,
                fail_open: false,
            }),
            theme,
        }
    }

    pub fn theme(&self) -> Arc<ThemeHooks> {
        self.theme.clone()
    }

    pub fn is_panel_open(&self) -> bool {
        lock(&self.state).panel_open
    }

    pub fn set_fail_gradient(&self, fail: bool) {
        lock(&self.state).fail_gradient = fail;
    }

    pub fn set_fail_open(&self, fail: bool) {
        lock(&self.state).fail_open = fail;
    }

    /// The user moved the dots: store their colors and fire the commit hook.
    pub fn drag_dots(&self, colors: &[&str]) {
        let hooks = {
            let mut state = lock(&self.state);
            for (dot, color) in state.dots.iter_mut().zip(colors) {
                dot.value = Some(color.to_string());
            }
            state.hooks.clone()
        };
        hooks.commit();
    }

    pub fn switch_workspace(&self, workspace: Option<&str>) {
        let hooks = lock(&self.state).hooks.clone();
        hooks.workspace_changed(workspace);
    }

    pub fn close_panel(&self) {
        lock(&self.state).panel_open = false;
    }
}

impl ColorPicker for MemoryPicker {
    fn hooks(&self) -> Arc<dyn PickerHooks> {
        lock(&self.state).hooks.clone()
    }

    fn set_hooks(&self, hooks: Arc<dyn PickerHooks>) {
        lock(&self.state).hooks = hooks;
    }

    fn dots(&self) -> Vec<DotColor> {
        lock(&self.state).dots.clone()
    }

    fn clear_dot_colors(&self) {
        for dot in lock(&self.state).dots.iter_mut() {
            dot.value = None;
        }
    }

    fn gradient(&self, samples: &[ColorSample]) -> Result<String, PickerError> {
        if lock(&self.state).fail_gradient {
            return Err(PickerError::Gradient("canvas unavailable".to_string()));
        }
        let mut ordered: Vec<&ColorSample> = samples.iter().collect();
        ordered.sort_by_key(|s| !s.is_primary);
        match ordered.as_slice() {
            [] => Err(PickerError::Gradient("no color samples".to_string())),
            [only] => Ok(only.rgb.to_css()),
            many => Ok(format!(
                "linear-gradient(135deg, {})",
                many.iter()
                    .map(|s| s.rgb.to_css())
                    .collect::<Vec<_>>()
                    .join(", ")
            )),
        }
    }

    fn open_panel(&self) -> Result<(), PickerError> {
        let mut state = lock(&self.state);
        if state.fail_open {
            return Err(PickerError::PanelUnavailable(
                "zenToolbarThemePicker not found".to_string(),
            ));
        }
        state.panel_open = true;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedFolder {
    pub id: String,
    pub items: Vec<ItemId>,
    pub request: FolderRequest,
}

#[derive(Debug, Default)]
pub struct MemoryFolders {
    active_workspace: Option<String>,
    created: Mutex<Vec<CreatedFolder>>,
    fail: AtomicBool,
}

impl MemoryFolders {
    pub fn new(active_workspace: Option<String>) -> Self {
        Self {
            active_workspace,
            ..Default::default()
        }
    }

    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn created(&self) -> Vec<CreatedFolder> {
        lock(&self.created).clone()
    }
}

impl FolderService for MemoryFolders {
    fn active_workspace(&self) -> Option<String> {
        self.active_workspace.clone()
    }

    fn create_folder(&self, items: &[ItemId], request: &FolderRequest) -> HostResult<String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HostError::Rejected("createFolder returned null".to_string()));
        }
        let mut created = lock(&self.created);
        let id = format!("folder-{}", created.len() + 1);
        created.push(CreatedFolder {
            id: id.clone(),
            items: items.to_vec(),
            request: request.clone(),
        });
        Ok(id)
    }
}
