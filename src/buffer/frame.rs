use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::common::{FrameId, PageId};

/// One cell of the buffer pool.
///
/// A frame remembers which disk page currently occupies it, how many pins
/// are outstanding, and whether the cached bytes have diverged from the
/// disk copy. The byte buffer lives behind its own shared lock so that a
/// pin can keep holding it while pool bookkeeping moves on.
pub struct Frame {
    id: FrameId,
    /// The page cached here; None while the frame is free.
    occupant: RwLock<Option<PageId>>,
    pins: AtomicU32,
    dirty: AtomicBool,
    bytes: Arc<RwLock<Box<[u8]>>>,
}

impl Frame {
    /// A free frame backed by `page_size` zeroed bytes.
    pub fn empty(id: FrameId, page_size: usize) -> Self {
        Self {
            id,
            occupant: RwLock::new(None),
            pins: AtomicU32::new(0),
            dirty: AtomicBool::new(false),
            bytes: Arc::new(RwLock::new(vec![0u8; page_size].into_boxed_slice())),
        }
    }

    pub fn id(&self) -> FrameId {
        self.id
    }

    pub fn occupant(&self) -> Option<PageId> {
        *self.occupant.read()
    }

    /// Record that `page_id` now lives in this frame.
    pub fn install(&self, page_id: PageId) {
        *self.occupant.write() = Some(page_id);
    }

    pub fn pin_count(&self) -> u32 {
        self.pins.load(Ordering::Acquire)
    }

    /// Take one more pin; returns the pin count including it.
    pub fn acquire(&self) -> u32 {
        self.pins.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Give one pin back; returns the count that remains.
    pub fn release(&self) -> u32 {
        let before = self.pins.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(before > 0, "released a pin that was never taken");
        before - 1
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    pub fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn mark_clean(&self) {
        self.dirty.store(false, Ordering::Release);
    }

    /// The page bytes, shared with any outstanding pins.
    pub(crate) fn bytes(&self) -> &Arc<RwLock<Box<[u8]>>> {
        &self.bytes
    }

    /// Return the frame to its free state: no occupant, no pins, clean,
    /// zeroed bytes.
    pub fn clear(&self) {
        *self.occupant.write() = None;
        self.pins.store(0, Ordering::Release);
        self.dirty.store(false, Ordering::Release);
        self.bytes.write().fill(0);
    }
}
