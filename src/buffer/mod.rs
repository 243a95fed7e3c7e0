mod buffer_pool_manager;
mod frame;
mod lru_list;
mod pin;

pub use buffer_pool_manager::{BufferPoolManager, FrameMeta, PoolStats};
pub use frame::Frame;
pub use lru_list::LruList;
pub use pin::{PageMut, PageRef};
