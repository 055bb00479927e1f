//! Discovers groups as the host inserts them and hands each to the
//! augmenter.

use std::collections::HashSet;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};

use crate::augment::{GroupAugmenter, ProcessOutcome};
use crate::host::{GroupTree, HostResult, MutationBatch};
use crate::models::{GroupId, NodeId};

#[derive(Default)]
pub struct TreeWatcher {
    root: Option<NodeId>,
    batches: Option<UnboundedReceiver<MutationBatch>>,
}

impl TreeWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_running(&self) -> bool {
        self.batches.is_some()
    }

    /// Subscribe to insertions anywhere under the host's root.
    pub fn start(&mut self, tree: &mut dyn GroupTree) -> HostResult<()> {
        if self.is_running() {
            return Ok(());
        }
        let root = tree.root();
        self.batches = Some(tree.observe(&root)?);
        info!("Watching tab group tree under {}", root);
        self.root = Some(root);
        Ok(())
    }

    pub fn stop(&mut self, tree: &mut dyn GroupTree) {
        if self.batches.take().is_some() {
            tree.disconnect();
            debug!("Stopped watching tab group tree");
        }
        self.root = None;
    }

    /// Wait for the next batch. Never resolves while stopped or after the
    /// host closed the subscription.
    pub async fn next_batch(&mut self) -> MutationBatch {
        if let Some(rx) = self.batches.as_mut() {
            if let Some(batch) = rx.recv().await {
                return batch;
            }
            self.batches = None;
        }
        std::future::pending().await
    }

    pub fn try_next_batch(&mut self) -> Option<MutationBatch> {
        self.batches.as_mut()?.try_recv().ok()
    }

    /// Groups a batch brings in: each inserted node that is a group, plus
    /// every group nested inside an inserted node.
    pub fn groups_in_batch(tree: &dyn GroupTree, batch: &MutationBatch) -> Vec<GroupId> {
        let mut seen = HashSet::new();
        let mut groups = Vec::new();
        for node in &batch.added {
            let found = tree
                .group_at(node)
                .into_iter()
                .chain(tree.groups_within(node));
            for group in found {
                if seen.insert(group.clone()) {
                    groups.push(group);
                }
            }
        }
        groups
    }

    /// Submit every group in the batch; returns how many were augmented.
    pub fn handle_batch(
        &self,
        tree: &mut dyn GroupTree,
        augmenter: &mut GroupAugmenter,
        batch: &MutationBatch,
    ) -> usize {
        let groups = Self::groups_in_batch(tree, batch);
        submit(tree, augmenter, &groups)
    }

    /// Submit every group currently present.
    pub fn sweep_all(&self, tree: &mut dyn GroupTree, augmenter: &mut GroupAugmenter) -> usize {
        let groups = tree.all_groups();
        let augmented = submit(tree, augmenter, &groups);
        debug!("Sweep found {} groups, augmented {}", groups.len(), augmented);
        augmented
    }
}

fn submit(tree: &mut dyn GroupTree, augmenter: &mut GroupAugmenter, groups: &[GroupId]) -> usize {
    groups
        .iter()
        .filter(|group| augmenter.process(tree, group) == ProcessOutcome::Augmented)
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::augment::Collaborators;
    use crate::config::Config;
    use crate::host::{GroupSpec, HostError, MemoryTree, NodeSpec};
    use tokio::sync::mpsc;

    fn augmenter() -> GroupAugmenter {
        let (tx, _rx) = mpsc::unbounded_channel();
        GroupAugmenter::new(Collaborators::default(), &Config::default(), tx)
    }

    fn window(id: &str, groups: &[&str]) -> NodeSpec {
        NodeSpec::container(
            id,
            groups
                .iter()
                .map(|g| GroupSpec::new(*g, *g).into())
                .collect(),
        )
    }

    #[test]
    fn start_subscribes_once() {
        let mut tree = MemoryTree::new("root");
        let mut watcher = TreeWatcher::new();

        watcher.start(&mut tree).unwrap();
        watcher.start(&mut tree).unwrap();

        assert!(watcher.is_running());
        assert!(tree.is_observed());
        assert_eq!(tree.observe(&tree.root()).unwrap_err(), HostError::AlreadyObserving);
    }

    #[test]
    fn stop_releases_subscription() {
        let mut tree = MemoryTree::new("root");
        let mut watcher = TreeWatcher::new();
        watcher.start(&mut tree).unwrap();

        watcher.stop(&mut tree);

        assert!(!watcher.is_running());
        assert!(!tree.is_observed());
        assert!(watcher.try_next_batch().is_none());
    }

    #[test]
    fn batch_includes_nested_groups_once() {
        let mut tree = MemoryTree::new("root");
        let mut watcher = TreeWatcher::new();
        watcher.start(&mut tree).unwrap();

        let root = tree.root();
        tree.insert(
            &root,
            vec![window("w1", &["a", "b"]), GroupSpec::new("c", "c").into()],
        )
        .unwrap();
        let batch = watcher.try_next_batch().unwrap();

        let groups = TreeWatcher::groups_in_batch(&tree, &batch);
        assert_eq!(groups, vec!["a", "b", "c"]);
    }

    #[test]
    fn handle_batch_augments_inserted_groups() {
        let mut tree = MemoryTree::new("root");
        let mut watcher = TreeWatcher::new();
        let mut augmenter = augmenter();
        watcher.start(&mut tree).unwrap();

        let root = tree.root();
        tree.insert(&root, vec![window("w1", &["a", "b"])]).unwrap();
        let batch = watcher.try_next_batch().unwrap();

        assert_eq!(watcher.handle_batch(&mut tree, &mut augmenter, &batch), 2);
        assert_eq!(watcher.handle_batch(&mut tree, &mut augmenter, &batch), 0);
        assert_eq!(tree.group("a").unwrap().close_controls, 1);
    }

    #[test]
    fn reinserted_subtree_is_not_augmented_twice() {
        let mut tree = MemoryTree::new("root");
        let mut watcher = TreeWatcher::new();
        let mut augmenter = augmenter();
        let root = tree.root();
        tree.seed(&root, window("w1", &["a"])).unwrap();
        watcher.start(&mut tree).unwrap();
        watcher.sweep_all(&mut tree, &mut augmenter);

        let detached = tree.detach(&"w1".to_string()).unwrap();
        tree.reattach(&root, detached).unwrap();
        let batch = watcher.try_next_batch().unwrap();

        assert_eq!(watcher.handle_batch(&mut tree, &mut augmenter, &batch), 0);
        assert_eq!(tree.group("a").unwrap().close_controls, 1);
    }

    #[test]
    fn sweep_all_covers_seeded_groups() {
        let mut tree = MemoryTree::new("root");
        let mut augmenter = augmenter();
        let root = tree.root();
        tree.seed(&root, window("w1", &["a", "b"])).unwrap();
        tree.seed(&root, GroupSpec::new("f", "f").folder().into())
            .unwrap();

        let watcher = TreeWatcher::new();
        assert_eq!(watcher.sweep_all(&mut tree, &mut augmenter), 2);
        assert_eq!(watcher.sweep_all(&mut tree, &mut augmenter), 0);
    }

    #[tokio::test]
    async fn next_batch_waits_for_insertions() {
        let mut tree = MemoryTree::new("root");
        let mut watcher = TreeWatcher::new();
        watcher.start(&mut tree).unwrap();
        let root = tree.root();
        tree.insert(&root, vec![GroupSpec::new("g1", "g1").into()])
            .unwrap();

        let batch = watcher.next_batch().await;
        assert_eq!(batch.added, vec!["g1".to_string()]);
    }
}
