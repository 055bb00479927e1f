use std::sync::Arc;
use thiserror::Error;

use crate::models::ColorSample;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PickerError {
    #[error("Picker panel unavailable: {0}")]
    PanelUnavailable(String),

    #[error("Gradient computation failed: {0}")]
    Gradient(String),
}

/// The picker's overridable behavior.
///
/// The host calls `commit` whenever the user changes the dots and
/// `workspace_changed` when the active workspace switches. The default hooks
/// repaint the browser theme; a borrower swaps them out for the duration of a
/// lease.
pub trait PickerHooks: Send + Sync {
    fn commit(&self);
    fn workspace_changed(&self, workspace: Option<&str>);
}

/// Raw state of one picker dot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DotColor {
    /// Scratch color (`--zen-theme-picker-dot-color`), unset when `None`.
    pub value: Option<String>,
    pub is_primary: bool,
    pub role: Option<String>,
}

impl DotColor {
    pub fn new(value: impl Into<String>, is_primary: bool) -> Self {
        Self {
            value: Some(value.into()),
            is_primary,
            role: None,
        }
    }
}

/// Gradient color picker provided by the host.
///
/// All methods take `&self`; implementations synchronize internally so a
/// lease can hold the picker and restore it from `Drop`.
pub trait ColorPicker: Send + Sync {
    fn hooks(&self) -> Arc<dyn PickerHooks>;
    fn set_hooks(&self, hooks: Arc<dyn PickerHooks>);

    fn dots(&self) -> Vec<DotColor>;

    /// Remove every dot's scratch color.
    fn clear_dot_colors(&self);

    fn gradient(&self, samples: &[ColorSample]) -> Result<String, PickerError>;

    fn open_panel(&self) -> Result<(), PickerError>;
}
