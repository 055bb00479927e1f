mod augmenter;
mod edit;
mod favicon;
mod picker_lease;
mod registry;

#[allow(unused_imports)]
pub use augmenter::{ActionError, Collaborators, GroupAugmenter, ProcessOutcome};
#[allow(unused_imports)]
pub use edit::{EditOutcome, EditSession, EditState};
#[allow(unused_imports)]
pub use favicon::{average_favicon_color, image_mean, FaviconSummary};
#[allow(unused_imports)]
pub use picker_lease::{samples_from_dots, PickerLease, PickerRedirect, RedirectHooks};
#[allow(unused_imports)]
pub use registry::{AugmentStatus, AugmentationRegistry};

#[cfg(test)]
pub use favicon::mock_decoder;
