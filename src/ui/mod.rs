pub mod list;
pub mod modal;
pub mod popup;

pub use list::{ListRow, OverlayListView};
pub use modal::{ModalContent, ModalRegion};
pub use popup::{InfoPopup, PopupAction};
