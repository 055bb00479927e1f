mod color;
mod group;
mod menu;

pub use color::{ColorMap, ColorSample, Rgb};
pub(crate) use color::round_channel;
#[allow(unused_imports)]
pub use group::{
    GroupId, GroupSummary, ItemId, MemberItem, NodeId, AUGMENTED_MARKER, COLOR_INVERT_PROPERTY,
    COLOR_PROPERTY, WORKSPACE_ATTRIBUTE,
};
pub use menu::MenuAction;
