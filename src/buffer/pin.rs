use std::sync::Arc;

use parking_lot::lock_api::{ArcRwLockReadGuard, ArcRwLockWriteGuard};
use parking_lot::RawRwLock;

use crate::common::PageId;

use super::buffer_pool_manager::PoolCore;

type ReadBytes = ArcRwLockReadGuard<RawRwLock, Box<[u8]>>;
type WriteBytes = ArcRwLockWriteGuard<RawRwLock, Box<[u8]>>;

/// A pinned page checked out for reading.
///
/// The pin keeps the page in its frame; dropping the pin hands it back on
/// every exit path, so an early return can never strand a frame. The byte
/// lock is owned (not borrowed from the frame), which is what lets the pin
/// outlive the pool call that produced it.
pub struct PageRef {
    page_id: PageId,
    bytes: ReadBytes,
    pool: Arc<PoolCore>,
}

impl PageRef {
    pub(crate) fn new(pool: Arc<PoolCore>, page_id: PageId, bytes: ReadBytes) -> Self {
        Self {
            page_id,
            bytes,
            pool,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        &self.bytes
    }
}

impl Drop for PageRef {
    fn drop(&mut self) {
        self.pool.settle_pin(self.page_id, false);
    }
}

/// A pinned page checked out for writing.
///
/// Only `data_mut` counts as a modification: a write pin that never touches
/// the bytes settles without dirtying its frame, so chain walks that merely
/// inspect a page do not force it back to disk later.
pub struct PageMut {
    page_id: PageId,
    bytes: Option<WriteBytes>,
    pool: Arc<PoolCore>,
    touched: bool,
}

impl PageMut {
    pub(crate) fn new(pool: Arc<PoolCore>, page_id: PageId, bytes: WriteBytes) -> Self {
        Self {
            page_id,
            bytes: Some(bytes),
            pool,
            touched: false,
        }
    }

    pub fn page_id(&self) -> PageId {
        self.page_id
    }

    pub fn data(&self) -> &[u8] {
        self.bytes.as_deref().expect("pin bytes held until drop")
    }

    /// Mutable access to the page bytes; the frame will settle dirty.
    pub fn data_mut(&mut self) -> &mut [u8] {
        self.touched = true;
        self.bytes.as_deref_mut().expect("pin bytes held until drop")
    }
}

impl Drop for PageMut {
    fn drop(&mut self) {
        // Hand the byte lock back before the pool bookkeeping runs
        self.bytes.take();
        self.pool.settle_pin(self.page_id, self.touched);
    }
}
