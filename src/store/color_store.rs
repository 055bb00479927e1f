use tracing::{debug, info, warn};

use super::backend::{BackendChain, BackendError};
use super::file::FileBackend;
use super::keyvalue::KeyValueBackend;
use crate::config::Config;
use crate::host::{GroupTree, HostResult};
use crate::models::{ColorMap, GroupId, COLOR_INVERT_PROPERTY, COLOR_PROPERTY};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed,
    /// Persisted data exists but has no record for the group.
    NotPresent,
    /// Nothing has been persisted yet.
    NoData,
}

/// Write `color` to both color properties of `group`.
pub fn paint(tree: &mut dyn GroupTree, group: &GroupId, color: &str) -> HostResult<()> {
    tree.set_style_property(group, COLOR_PROPERTY, color)?;
    tree.set_style_property(group, COLOR_INVERT_PROPERTY, color)
}

/// Durable group id to color mapping.
pub struct ColorStore {
    chain: BackendChain,
}

impl ColorStore {
    pub fn new(chain: BackendChain) -> Self {
        Self { chain }
    }

    /// Colors file first, key-value store second.
    pub fn from_config(config: &Config) -> Self {
        let primary = FileBackend::new(
            config.storage.data_dir.clone(),
            config.storage.colors_file.clone(),
        );
        let fallback =
            KeyValueBackend::new(config.fallback_path(), config.storage.fallback_key.clone());
        Self::new(BackendChain::primary_with_fallback(
            Box::new(primary),
            Box::new(fallback),
        ))
    }

    /// Never fails: with nothing readable the mapping is empty.
    pub async fn load(&self) -> ColorMap {
        match self.chain.read_first().await {
            Some((backend, map)) => {
                info!("Loaded {} group colors from {} backend", map.len(), backend);
                map
            }
            None => {
                debug!("No saved group colors found");
                ColorMap::new()
            }
        }
    }

    /// Paint every group in `colors` that is currently present. Returns how
    /// many were painted.
    pub fn apply_all(&self, tree: &mut dyn GroupTree, colors: &ColorMap) -> usize {
        let mut applied = 0;
        for (group, color) in colors {
            if !tree.contains_group(group) {
                continue;
            }
            match paint(tree, group, color) {
                Ok(()) => applied += 1,
                Err(e) => warn!("Failed to apply color to group {}: {}", group, e),
            }
        }
        applied
    }

    /// Non-empty colors of every group currently present.
    pub fn snapshot(tree: &dyn GroupTree) -> ColorMap {
        tree.all_groups()
            .into_iter()
            .filter_map(|group| {
                let color = tree.style_property(&group, COLOR_PROPERTY)?;
                (!color.is_empty()).then_some((group, color))
            })
            .collect()
    }

    /// Replace the persisted mapping with the live snapshot.
    pub async fn save_all(&self, tree: &dyn GroupTree) -> Result<ColorMap, BackendError> {
        let snapshot = Self::snapshot(tree);
        let backend = self.chain.write_first(&snapshot).await?;
        debug!("Saved {} group colors to {} backend", snapshot.len(), backend);
        Ok(snapshot)
    }

    pub async fn remove(&self, group: &str) -> Result<RemoveOutcome, BackendError> {
        let Some((_, mut map)) = self.chain.read_first().await else {
            return Ok(RemoveOutcome::NoData);
        };
        if map.remove(group).is_none() {
            return Ok(RemoveOutcome::NotPresent);
        }

        let backend = self.chain.write_first(&map).await?;
        debug!("Removed color of group {} from {} backend", group, backend);
        Ok(RemoveOutcome::Removed)
    }
}
