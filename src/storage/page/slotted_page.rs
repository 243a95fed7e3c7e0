use crate::common::{
    EngineError, PageId, PageType, Result, SlotId, INVALID_PAGE_ID, PAGE_HEADER_SIZE, SLOT_SIZE,
};

/// Slotted page layout:
///
/// +------------------+
/// | Page Header      |  (16 bytes)
/// +------------------+
/// | Slot Directory   |  (grows downward)
/// | [slot 0]         |
/// | [slot 1]         |
/// | ...              |
/// +------------------+
/// |                  |
/// | Free Gap         |
/// |                  |
/// +------------------+
/// | Tuple Heap       |  (grows upward from the bottom)
/// | [tuple n]        |
/// | ...              |
/// +------------------+
///
/// The slot directory is append-only: deleting a tuple tombstones its slot
/// (length = 0) and the slot index is never handed out again, so row ids
/// stay stable for the life of the page.
const OFF_PAGE_ID: usize = 0;
const OFF_PAGE_TYPE: usize = 4;
const OFF_SLOT_COUNT: usize = 6;
const OFF_FREE_START: usize = 8;
const OFF_FREE_END: usize = 10;
const OFF_NEXT_PAGE: usize = 12;
// byte 5 is reserved

fn read_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}

fn write_u16(buf: &mut [u8], off: usize, val: u16) {
    buf[off..off + 2].copy_from_slice(&val.to_le_bytes());
}

fn read_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes([buf[off], buf[off + 1], buf[off + 2], buf[off + 3]])
}

fn write_u32(buf: &mut [u8], off: usize, val: u32) {
    buf[off..off + 4].copy_from_slice(&val.to_le_bytes());
}

/// One entry in the slot directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotEntry {
    /// Byte offset of the tuple within the page.
    pub offset: u16,
    /// Tuple length; 0 marks a tombstone.
    pub length: u16,
}

impl SlotEntry {
    pub fn new(offset: u16, length: u16) -> Self {
        Self { offset, length }
    }

    pub fn is_tombstone(&self) -> bool {
        self.length == 0
    }
}

/// Mutable slotted-page view over a page-sized byte buffer.
///
/// Does not own the memory - the buffer pool owns the frame and lends its
/// bytes here for the duration of one operation.
pub struct SlottedPage<'a> {
    data: &'a mut [u8],
}

impl<'a> SlottedPage<'a> {
    pub fn new(data: &'a mut [u8]) -> Self {
        debug_assert!(data.len() >= PAGE_HEADER_SIZE);
        Self { data }
    }

    /// Initialize a fresh page: zero the buffer and write the header.
    pub fn init(&mut self, page_id: PageId, page_type: PageType) {
        let page_size = self.data.len();
        self.data.fill(0);
        write_u32(self.data, OFF_PAGE_ID, page_id.as_u32());
        self.data[OFF_PAGE_TYPE] = page_type.as_u8();
        write_u16(self.data, OFF_SLOT_COUNT, 0);
        write_u16(self.data, OFF_FREE_START, PAGE_HEADER_SIZE as u16);
        write_u16(self.data, OFF_FREE_END, page_size as u16);
        write_u32(self.data, OFF_NEXT_PAGE, INVALID_PAGE_ID.as_u32());
    }

    pub fn page_id(&self) -> PageId {
        self.as_ref().page_id()
    }

    pub fn page_type(&self) -> PageType {
        self.as_ref().page_type()
    }

    pub fn slot_count(&self) -> u16 {
        self.as_ref().slot_count()
    }

    pub fn free_start(&self) -> u16 {
        self.as_ref().free_start()
    }

    pub fn free_end(&self) -> u16 {
        self.as_ref().free_end()
    }

    /// Contiguous free bytes between the slot directory and the tuple heap.
    pub fn free_space(&self) -> u16 {
        self.as_ref().free_space()
    }

    pub fn next_page(&self) -> PageId {
        self.as_ref().next_page()
    }

    pub fn set_next_page(&mut self, next: PageId) {
        write_u32(self.data, OFF_NEXT_PAGE, next.as_u32());
    }

    /// Whether a tuple of `len` bytes fits, counting its new directory entry.
    pub fn can_insert(&self, len: usize) -> bool {
        self.free_space() as usize >= len + SLOT_SIZE
    }

    /// Insert a tuple, appending a fresh slot. Tombstoned slots are never
    /// reused.
    pub fn insert_tuple(&mut self, tuple: &[u8]) -> Result<SlotId> {
        let len = tuple.len();
        if !self.can_insert(len) {
            return Err(EngineError::PageFull {
                needed: len + SLOT_SIZE,
                available: self.free_space() as usize,
            });
        }

        let slot_count = self.slot_count();
        let new_free_end = self.free_end() - len as u16;
        self.data[new_free_end as usize..new_free_end as usize + len].copy_from_slice(tuple);
        write_u16(self.data, OFF_FREE_END, new_free_end);

        let slot_off = PAGE_HEADER_SIZE + slot_count as usize * SLOT_SIZE;
        write_u16(self.data, slot_off, new_free_end);
        write_u16(self.data, slot_off + 2, len as u16);
        write_u16(self.data, OFF_SLOT_COUNT, slot_count + 1);
        write_u16(
            self.data,
            OFF_FREE_START,
            (slot_off + SLOT_SIZE) as u16,
        );

        Ok(SlotId::new(slot_count))
    }

    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        self.as_ref().get_slot(slot_id)
    }

    /// Borrow a live tuple's bytes.
    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self.check_live(slot_id)?;
        let start = entry.offset as usize;
        Ok(&self.data[start..start + entry.length as usize])
    }

    /// Tombstone a slot. Returns `false` when the slot was already a
    /// tombstone; the tuple bytes are not reclaimed either way.
    pub fn delete_tuple(&mut self, slot_id: SlotId) -> Result<bool> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(EngineError::BadSlot(slot_id))?;
        if entry.is_tombstone() {
            return Ok(false);
        }
        let slot_off = PAGE_HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE;
        write_u16(self.data, slot_off, 0);
        write_u16(self.data, slot_off + 2, 0);
        Ok(true)
    }

    /// Live (non-tombstoned) slot ids in index order.
    pub fn live_slots(&self) -> Vec<SlotId> {
        self.as_ref().live_slots()
    }

    fn check_live(&self, slot_id: SlotId) -> Result<SlotEntry> {
        self.as_ref().check_live(slot_id)
    }

    fn as_ref(&self) -> SlottedPageRef<'_> {
        SlottedPageRef::new(self.data)
    }
}

/// Read-only slotted-page view.
pub struct SlottedPageRef<'a> {
    data: &'a [u8],
}

impl<'a> SlottedPageRef<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        debug_assert!(data.len() >= PAGE_HEADER_SIZE);
        Self { data }
    }

    pub fn page_id(&self) -> PageId {
        PageId::new(read_u32(self.data, OFF_PAGE_ID))
    }

    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[OFF_PAGE_TYPE])
    }

    pub fn slot_count(&self) -> u16 {
        read_u16(self.data, OFF_SLOT_COUNT)
    }

    pub fn free_start(&self) -> u16 {
        read_u16(self.data, OFF_FREE_START)
    }

    pub fn free_end(&self) -> u16 {
        read_u16(self.data, OFF_FREE_END)
    }

    pub fn free_space(&self) -> u16 {
        self.free_end().saturating_sub(self.free_start())
    }

    pub fn next_page(&self) -> PageId {
        PageId::new(read_u32(self.data, OFF_NEXT_PAGE))
    }

    pub fn get_slot(&self, slot_id: SlotId) -> Option<SlotEntry> {
        if slot_id.as_u16() >= self.slot_count() {
            return None;
        }
        let slot_off = PAGE_HEADER_SIZE + slot_id.as_u16() as usize * SLOT_SIZE;
        Some(SlotEntry::new(
            read_u16(self.data, slot_off),
            read_u16(self.data, slot_off + 2),
        ))
    }

    pub fn get_tuple(&self, slot_id: SlotId) -> Result<&[u8]> {
        let entry = self.check_live(slot_id)?;
        let start = entry.offset as usize;
        Ok(&self.data[start..start + entry.length as usize])
    }

    pub fn live_slots(&self) -> Vec<SlotId> {
        (0..self.slot_count())
            .map(SlotId::new)
            .filter(|&sid| {
                self.get_slot(sid)
                    .map(|e| !e.is_tombstone())
                    .unwrap_or(false)
            })
            .collect()
    }

    pub fn tuple_count(&self) -> usize {
        self.live_slots().len()
    }

    /// Resolve a slot, rejecting out-of-range indices, tombstones, and
    /// entries whose region escapes the tuple heap. The last case means the
    /// page bytes are corrupt; reads never go out of bounds.
    fn check_live(&self, slot_id: SlotId) -> Result<SlotEntry> {
        let entry = self
            .get_slot(slot_id)
            .ok_or(EngineError::BadSlot(slot_id))?;
        if entry.is_tombstone() {
            return Err(EngineError::Tombstoned(slot_id));
        }
        let start = entry.offset as usize;
        let end = start + entry.length as usize;
        if start < self.free_end() as usize || end > self.data.len() {
            return Err(EngineError::Corrupted(format!(
                "slot {} points at [{}, {}) outside the tuple heap [{}, {})",
                slot_id,
                start,
                end,
                self.free_end(),
                self.data.len()
            )));
        }
        Ok(entry)
    }
}
