use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;

use crate::host::{ColorPicker, DotColor, PickerError, PickerHooks};
use crate::models::{ColorSample, GroupId, Rgb};

/// A picker notification rerouted to the group holding the lease.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PickerRedirect {
    Commit { group: GroupId },
}

/// Hooks installed on the picker while it is leased.
///
/// With a target group, commits are forwarded to the app and the picker's
/// global theme effect is suppressed. Without one, both hooks fall through to
/// the hooks that were installed before the lease.
pub struct RedirectHooks {
    target: Mutex<Option<GroupId>>,
    original: Arc<dyn PickerHooks>,
    redirects: UnboundedSender<PickerRedirect>,
}

impl RedirectHooks {
    fn target(&self) -> Option<GroupId> {
        self.target
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set_target(&self, group: Option<GroupId>) {
        *self.target.lock().unwrap_or_else(PoisonError::into_inner) = group;
    }
}

impl PickerHooks for RedirectHooks {
    fn commit(&self) {
        match self.target() {
            Some(group) => {
                debug!("Picker commit redirected to group {}", group);
                let _ = self.redirects.send(PickerRedirect::Commit { group });
            }
            None => self.original.commit(),
        }
    }

    fn workspace_changed(&self, workspace: Option<&str>) {
        match self.target() {
            Some(group) => debug!(
                "Theme change for workspace {:?} suppressed while picking for {}",
                workspace, group
            ),
            None => self.original.workspace_changed(workspace),
        }
    }
}

/// Exclusive use of the shared color picker on behalf of one group.
///
/// Dropping the lease reinstalls the exact hooks that were in place when it
/// was acquired and clears the dots' scratch colors, whichever way the color
/// flow ended.
pub struct PickerLease {
    picker: Arc<dyn ColorPicker>,
    original: Arc<dyn PickerHooks>,
    redirect: Arc<RedirectHooks>,
}

impl PickerLease {
    pub fn acquire(
        picker: Arc<dyn ColorPicker>,
        group: GroupId,
        redirects: UnboundedSender<PickerRedirect>,
    ) -> Self {
        let original = picker.hooks();
        let redirect = Arc::new(RedirectHooks {
            target: Mutex::new(Some(group)),
            original: original.clone(),
            redirects,
        });
        picker.set_hooks(redirect.clone());

        Self {
            picker,
            original,
            redirect,
        }
    }

    pub fn group(&self) -> Option<GroupId> {
        self.redirect.target()
    }

    pub fn holds(&self, group: &str) -> bool {
        self.group().as_deref() == Some(group)
    }

    /// Stop redirecting; the picker behaves normally until the lease drops.
    pub fn clear_target(&self) {
        self.redirect.set_target(None);
    }

    pub fn open_panel(&self) -> Result<(), PickerError> {
        self.picker.open_panel()
    }

    /// Gradient over the dots that currently carry a color. `Ok(None)` when
    /// no dot does.
    pub fn current_color(&self) -> Result<Option<String>, PickerError> {
        let samples = samples_from_dots(&self.picker.dots());
        if samples.is_empty() {
            return Ok(None);
        }
        self.picker.gradient(&samples).map(Some)
    }
}

impl Drop for PickerLease {
    fn drop(&mut self) {
        self.picker.set_hooks(self.original.clone());
        self.picker.clear_dot_colors();
        debug!("Color picker released");
    }
}

/// Convert dots to gradient samples, skipping dots with no usable value.
pub fn samples_from_dots(dots: &[DotColor]) -> Vec<ColorSample> {
    dots.iter()
        .filter_map(|dot| {
            let value = dot.value.as_deref()?.trim();
            if value.is_empty() || value == "undefined" {
                return None;
            }
            Some(ColorSample {
                rgb: Rgb::from_css(value),
                is_primary: dot.is_primary,
                role: dot.role.clone(),
            })
        })
        .collect()
}
