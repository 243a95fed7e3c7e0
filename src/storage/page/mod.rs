mod slotted_page;

pub use slotted_page::{SlotEntry, SlottedPage, SlottedPageRef};
