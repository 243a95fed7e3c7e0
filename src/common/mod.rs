pub mod config;
pub mod error;
pub mod types;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use types::{
    FrameId, PageId, PageType, RowId, SlotId, INVALID_PAGE_ID, PAGE_HEADER_SIZE, SLOT_SIZE,
};
