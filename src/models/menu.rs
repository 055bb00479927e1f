use serde::{Deserialize, Serialize};

/// Entries of the per-group context menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MenuAction {
    SetColor,
    FaviconColor,
    ConvertToFolder,
    Rename,
    Close,
    ToggleCollapse,
    Expand,
}

impl MenuAction {
    /// Menu entries in display order.
    pub const ALL: [MenuAction; 7] = [
        MenuAction::SetColor,
        MenuAction::FaviconColor,
        MenuAction::ConvertToFolder,
        MenuAction::Rename,
        MenuAction::Close,
        MenuAction::ToggleCollapse,
        MenuAction::Expand,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            MenuAction::SetColor => "Set Group Color",
            MenuAction::FaviconColor => "Use Average Favicon Color",
            MenuAction::ConvertToFolder => "Convert Group to Folder",
            MenuAction::Rename => "Rename Group",
            MenuAction::Close => "Close Group",
            MenuAction::ToggleCollapse => "Collapse Group",
            MenuAction::Expand => "Expand Group",
        }
    }

    /// Submenu the entry is nested under, if any.
    pub fn submenu(&self) -> Option<&'static str> {
        match self {
            MenuAction::SetColor | MenuAction::FaviconColor => Some("Change Group Color"),
            _ => None,
        }
    }
}

impl std::fmt::Display for MenuAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_entries_share_a_submenu() {
        assert_eq!(MenuAction::SetColor.submenu(), Some("Change Group Color"));
        assert_eq!(MenuAction::FaviconColor.submenu(), Some("Change Group Color"));
        assert_eq!(MenuAction::ConvertToFolder.submenu(), None);
    }

    #[test]
    fn menu_action_deserializes_snake_case() {
        let action: MenuAction = serde_yaml::from_str("convert_to_folder").unwrap();
        assert_eq!(action, MenuAction::ConvertToFolder);
    }
}
