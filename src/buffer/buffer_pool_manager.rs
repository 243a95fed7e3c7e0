use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use log::debug;
use parking_lot::Mutex;

use crate::common::{
    EngineError, FrameId, PageId, PageType, Result, INVALID_PAGE_ID,
};
use crate::storage::disk::DiskManager;
use crate::storage::page::SlottedPage;

use super::{Frame, LruList, PageMut, PageRef};

/// Cache and I/O counters, attributed to the pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct PoolStats {
    /// Fetches answered from a resident frame.
    pub hits: u64,
    /// Fetches that had to claim a frame. A miss that claims one performs
    /// exactly one disk read; a miss that fails first (every frame pinned,
    /// or the page not on disk) reads nothing, so `disk_reads` can trail
    /// `misses` by those failures.
    pub misses: u64,
    pub disk_reads: u64,
    pub disk_writes: u64,
}

/// Read-only view of one frame's metadata, for the snapshot surface.
#[derive(Debug, Clone, Copy)]
pub struct FrameMeta {
    pub page_id: Option<PageId>,
    pub pin_count: u32,
    pub is_dirty: bool,
}

/// Mutable pool state guarded by one lock: the page table, the free list,
/// the eviction queue, the disk, and the counters move together.
struct PoolInner {
    page_table: HashMap<PageId, FrameId>,
    free_list: VecDeque<FrameId>,
    lru: LruList,
    disk: DiskManager,
    stats: PoolStats,
}

/// The pool state a pin needs to reach when it settles: shared between the
/// manager and every outstanding `PageRef`/`PageMut`.
pub(crate) struct PoolCore {
    frames: Vec<Frame>,
    inner: Mutex<PoolInner>,
}

impl PoolCore {
    /// Pin-release path for both pin flavors: fold the touched flag into
    /// the frame's dirty bit and queue the frame for eviction once the
    /// last pin is gone.
    pub(crate) fn settle_pin(&self, page_id: PageId, touched: bool) {
        let mut inner = self.inner.lock();
        if let Some(frame_id) = inner.page_table.get(&page_id).copied() {
            let frame = &self.frames[frame_id.as_usize()];
            if touched {
                frame.mark_dirty();
            }
            if frame.release() == 0 {
                inner.lru.push_back(frame_id);
            }
        }
    }
}

/// BufferPoolManager caches disk pages in a bounded set of frames.
///
/// A fetched page comes back behind a pin (`PageRef`/`PageMut`) that keeps
/// its frame resident; dropping the pin settles it and, on the last pin,
/// queues the frame for LRU eviction. Dirty frames are written back
/// synchronously when evicted or flushed.
pub struct BufferPoolManager {
    pool_size: usize,
    page_size: usize,
    core: Arc<PoolCore>,
}

impl BufferPoolManager {
    pub fn new(pool_size: u32, disk: DiskManager) -> Self {
        let page_size = disk.page_size();
        let pool_size = pool_size as usize;

        let mut frames = Vec::with_capacity(pool_size);
        let mut free_list = VecDeque::with_capacity(pool_size);
        for i in 0..pool_size {
            let frame_id = FrameId::new(i as u32);
            frames.push(Frame::empty(frame_id, page_size));
            free_list.push_back(frame_id);
        }

        let core = Arc::new(PoolCore {
            frames,
            inner: Mutex::new(PoolInner {
                page_table: HashMap::new(),
                free_list,
                lru: LruList::new(pool_size),
                disk,
                stats: PoolStats::default(),
            }),
        });

        Self {
            pool_size,
            page_size,
            core,
        }
    }

    /// Fetch a page for read access, pinning its frame.
    pub fn read_page(&self, page_id: PageId) -> Result<PageRef> {
        if page_id == INVALID_PAGE_ID {
            return Err(EngineError::BadPage(page_id));
        }
        let frame_id = self.fetch_frame(page_id)?;
        let bytes = self.core.frames[frame_id.as_usize()].bytes().read_arc();
        Ok(PageRef::new(Arc::clone(&self.core), page_id, bytes))
    }

    /// Fetch a page for write access, pinning its frame.
    pub fn write_page(&self, page_id: PageId) -> Result<PageMut> {
        if page_id == INVALID_PAGE_ID {
            return Err(EngineError::BadPage(page_id));
        }
        let frame_id = self.fetch_frame(page_id)?;
        let bytes = self.core.frames[frame_id.as_usize()].bytes().write_arc();
        Ok(PageMut::new(Arc::clone(&self.core), page_id, bytes))
    }

    /// Allocate a fresh page on disk, bring it into a frame, and initialize
    /// it with an empty slotted-page header of the given type. The returned
    /// pin keeps the page resident and already counts as a modification.
    pub fn new_page(&self, page_type: PageType) -> Result<(PageId, PageMut)> {
        let page_id = self.core.inner.lock().disk.allocate(page_type)?;

        let mut pin = match self.write_page(page_id) {
            Ok(pin) => pin,
            Err(e) => {
                // Undo the allocation so a failed fetch leaves no orphan
                self.core.inner.lock().disk.free(page_id);
                return Err(e);
            }
        };
        SlottedPage::new(pin.data_mut()).init(page_id, page_type);
        Ok((page_id, pin))
    }

    /// Write a resident dirty page back to disk. Returns whether the page
    /// was resident at all; clean resident pages report true without I/O.
    pub fn flush_page(&self, page_id: PageId) -> Result<bool> {
        let mut inner = self.core.inner.lock();
        let Some(frame_id) = inner.page_table.get(&page_id).copied() else {
            return Ok(false);
        };
        let frame = &self.core.frames[frame_id.as_usize()];
        if frame.is_dirty() {
            let bytes = frame.bytes().read();
            inner.disk.write(page_id, &bytes)?;
            drop(bytes);
            inner.stats.disk_writes += 1;
            frame.mark_clean();
        }
        Ok(true)
    }

    /// Flush every dirty resident frame.
    pub fn flush_all(&self) -> Result<()> {
        let mut inner = self.core.inner.lock();
        let resident: Vec<(PageId, FrameId)> =
            inner.page_table.iter().map(|(&p, &f)| (p, f)).collect();
        for (page_id, frame_id) in resident {
            let frame = &self.core.frames[frame_id.as_usize()];
            if frame.is_dirty() {
                let bytes = frame.bytes().read();
                inner.disk.write(page_id, &bytes)?;
                drop(bytes);
                inner.stats.disk_writes += 1;
                frame.mark_clean();
            }
        }
        Ok(())
    }

    /// Evict a page without writing it back and return it to the disk's
    /// free pool. Fails when the page is resident and pinned.
    pub fn drop_page(&self, page_id: PageId) -> Result<()> {
        let mut inner = self.core.inner.lock();
        if let Some(frame_id) = inner.page_table.get(&page_id).copied() {
            let frame = &self.core.frames[frame_id.as_usize()];
            if frame.pin_count() > 0 {
                return Err(EngineError::PagePinned(page_id));
            }
            inner.page_table.remove(&page_id);
            inner.lru.remove(frame_id);
            frame.clear();
            inner.free_list.push_back(frame_id);
        }
        inner.disk.free(page_id);
        Ok(())
    }

    // ── Read-only queries ──────────────────────────────────────────────

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn stats(&self) -> PoolStats {
        self.core.inner.lock().stats
    }

    /// Which frame currently holds a page, if any.
    pub fn page_to_frame(&self, page_id: PageId) -> Option<FrameId> {
        self.core.inner.lock().page_table.get(&page_id).copied()
    }

    /// Pin count of a resident page.
    pub fn pin_count(&self, page_id: PageId) -> Option<u32> {
        let inner = self.core.inner.lock();
        inner
            .page_table
            .get(&page_id)
            .map(|&fid| self.core.frames[fid.as_usize()].pin_count())
    }

    /// Metadata for every frame, in frame order.
    pub fn frame_metas(&self) -> Vec<FrameMeta> {
        let _inner = self.core.inner.lock();
        self.core
            .frames
            .iter()
            .map(|frame| FrameMeta {
                page_id: frame.occupant(),
                pin_count: frame.pin_count(),
                is_dirty: frame.is_dirty(),
            })
            .collect()
    }

    /// Page-table entries sorted by page id, for deterministic snapshots.
    pub fn page_table_entries(&self) -> Vec<(PageId, FrameId)> {
        let inner = self.core.inner.lock();
        let mut entries: Vec<_> = inner.page_table.iter().map(|(&p, &f)| (p, f)).collect();
        entries.sort_by_key(|&(p, _)| p);
        entries
    }

    /// LRU order front-to-back (front = next eviction victim).
    pub fn lru_order(&self) -> Vec<FrameId> {
        self.core.inner.lock().lru.order().collect()
    }

    pub fn disk_num_allocated(&self) -> u32 {
        self.core.inner.lock().disk.num_allocated()
    }

    pub fn disk_max_pages(&self) -> u32 {
        self.core.inner.lock().disk.max_pages()
    }

    pub fn disk_is_allocated(&self, page_id: PageId) -> bool {
        self.core.inner.lock().disk.is_allocated(page_id)
    }

    /// Per-page `(is_allocated, page_type)` for the whole disk.
    pub fn disk_page_states(&self) -> Vec<(bool, PageType)> {
        let inner = self.core.inner.lock();
        (0..inner.disk.max_pages())
            .map(|i| {
                let pid = PageId::new(i);
                (inner.disk.is_allocated(pid), inner.disk.page_type(pid))
            })
            .collect()
    }

    /// Copy a page's bytes without recording any cache activity: the frame
    /// buffer when resident (it is authoritative while dirty), the raw disk
    /// bytes otherwise. Snapshot path only.
    pub fn peek_page(&self, page_id: PageId) -> Option<Vec<u8>> {
        let inner = self.core.inner.lock();
        if let Some(&frame_id) = inner.page_table.get(&page_id) {
            return Some(self.core.frames[frame_id.as_usize()].bytes().read().to_vec());
        }
        inner.disk.page_bytes(page_id).map(|bytes| bytes.to_vec())
    }

    // ── Internal ───────────────────────────────────────────────────────

    /// Pin the frame holding `page_id`, loading the page first if needed.
    fn fetch_frame(&self, page_id: PageId) -> Result<FrameId> {
        let mut inner = self.core.inner.lock();

        // Cache hit: pin, and pull the frame out of the eviction queue on
        // the 0 -> 1 transition.
        if let Some(frame_id) = inner.page_table.get(&page_id).copied() {
            inner.stats.hits += 1;
            if self.core.frames[frame_id.as_usize()].acquire() == 1 {
                inner.lru.remove(frame_id);
            }
            return Ok(frame_id);
        }

        // Cache miss: claim an empty frame, else evict the LRU victim.
        inner.stats.misses += 1;
        let frame_id = if let Some(frame_id) = inner.free_list.pop_front() {
            frame_id
        } else {
            let Some(victim) = inner.lru.pop_front() else {
                return Err(EngineError::PoolExhausted(self.pool_size));
            };
            let frame = &self.core.frames[victim.as_usize()];
            if let Some(old_page_id) = frame.occupant() {
                if frame.is_dirty() {
                    debug!("evicting dirty page {} from frame {}", old_page_id, victim);
                    let bytes = frame.bytes().read();
                    inner.disk.write(old_page_id, &bytes)?;
                    drop(bytes);
                    inner.stats.disk_writes += 1;
                }
                inner.page_table.remove(&old_page_id);
            }
            frame.clear();
            victim
        };

        // Load the page. Every miss that reaches this point costs exactly
        // one disk read.
        let frame = &self.core.frames[frame_id.as_usize()];
        {
            let mut bytes = frame.bytes().write();
            if let Err(e) = inner.disk.read(page_id, &mut bytes) {
                drop(bytes);
                frame.clear();
                inner.free_list.push_back(frame_id);
                return Err(e);
            }
        }
        inner.stats.disk_reads += 1;
        frame.install(page_id);
        frame.mark_clean();
        frame.acquire();
        inner.page_table.insert(page_id, frame_id);

        Ok(frame_id)
    }
}
