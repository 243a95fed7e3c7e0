use crate::common::{EngineError, PageId, PageType, Result};

/// Allocation record for one disk page.
#[derive(Debug, Clone, Copy)]
struct PageMeta {
    allocated: bool,
    page_type: PageType,
}

/// DiskManager owns a contiguous byte region that stands in for disk
/// storage. Each page is a fixed-size slice of the region; a per-page
/// record tracks whether the slot is allocated and what kind of page
/// lives there. There is no file behind it - the whole disk vanishes
/// with the engine.
pub struct DiskManager {
    /// The "disk": one pre-allocated buffer, indexed arithmetically.
    storage: Vec<u8>,
    /// Per-page allocation state and logical type.
    pages: Vec<PageMeta>,
    /// Number of pages currently allocated.
    num_allocated: u32,
    /// Bytes per page.
    page_size: usize,
    /// Maximum number of pages.
    max_pages: u32,
}

impl DiskManager {
    pub fn new(page_size: u32, max_pages: u32) -> Self {
        let page_size = page_size as usize;
        Self {
            storage: vec![0u8; page_size * max_pages as usize],
            pages: vec![
                PageMeta {
                    allocated: false,
                    page_type: PageType::Free,
                };
                max_pages as usize
            ],
            num_allocated: 0,
            page_size,
            max_pages,
        }
    }

    /// Allocate the smallest-id free page, mark it with the given type, and
    /// zero its bytes. Fails when every page slot is taken.
    pub fn allocate(&mut self, page_type: PageType) -> Result<PageId> {
        for i in 0..self.max_pages {
            if !self.pages[i as usize].allocated {
                self.pages[i as usize] = PageMeta {
                    allocated: true,
                    page_type,
                };
                self.num_allocated += 1;
                let offset = self.page_offset(PageId::new(i));
                self.storage[offset..offset + self.page_size].fill(0);
                return Ok(PageId::new(i));
            }
        }
        Err(EngineError::DiskFull(self.max_pages))
    }

    /// Return a page to the free pool. Already-free and out-of-range ids
    /// are ignored so that table drops stay idempotent.
    pub fn free(&mut self, page_id: PageId) {
        let idx = page_id.as_usize();
        if idx < self.pages.len() && self.pages[idx].allocated {
            self.pages[idx] = PageMeta {
                allocated: false,
                page_type: PageType::Free,
            };
            self.num_allocated -= 1;
        }
    }

    /// Copy a page's bytes into `buf`.
    pub fn read(&self, page_id: PageId, buf: &mut [u8]) -> Result<()> {
        self.check_allocated(page_id)?;
        let offset = self.page_offset(page_id);
        buf[..self.page_size].copy_from_slice(&self.storage[offset..offset + self.page_size]);
        Ok(())
    }

    /// Copy `data` over a page's bytes.
    pub fn write(&mut self, page_id: PageId, data: &[u8]) -> Result<()> {
        self.check_allocated(page_id)?;
        let offset = self.page_offset(page_id);
        self.storage[offset..offset + self.page_size].copy_from_slice(&data[..self.page_size]);
        Ok(())
    }

    pub fn is_allocated(&self, page_id: PageId) -> bool {
        self.pages
            .get(page_id.as_usize())
            .map(|m| m.allocated)
            .unwrap_or(false)
    }

    /// Logical type recorded for a page slot; `Free` when unallocated.
    pub fn page_type(&self, page_id: PageId) -> PageType {
        self.pages
            .get(page_id.as_usize())
            .map(|m| m.page_type)
            .unwrap_or(PageType::Free)
    }

    /// Borrowed view of a page's raw bytes. Snapshot path only: this read
    /// is never counted as disk I/O.
    pub fn page_bytes(&self, page_id: PageId) -> Option<&[u8]> {
        if !self.is_allocated(page_id) {
            return None;
        }
        let offset = self.page_offset(page_id);
        Some(&self.storage[offset..offset + self.page_size])
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn max_pages(&self) -> u32 {
        self.max_pages
    }

    pub fn num_allocated(&self) -> u32 {
        self.num_allocated
    }

    fn check_allocated(&self, page_id: PageId) -> Result<()> {
        if self.is_allocated(page_id) {
            Ok(())
        } else {
            Err(EngineError::BadPage(page_id))
        }
    }

    fn page_offset(&self, page_id: PageId) -> usize {
        page_id.as_usize() * self.page_size
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allocate_smallest_free_first() {
        let mut dm = DiskManager::new(64, 4);
        assert_eq!(dm.allocate(PageType::Data).unwrap(), PageId::new(0));
        assert_eq!(dm.allocate(PageType::Data).unwrap(), PageId::new(1));
        assert_eq!(dm.allocate(PageType::Overflow).unwrap(), PageId::new(2));

        dm.free(PageId::new(0));
        // The freed smallest id is reused before the next fresh one
        assert_eq!(dm.allocate(PageType::Data).unwrap(), PageId::new(0));
    }

    #[test]
    fn test_read_write_roundtrip() {
        let mut dm = DiskManager::new(64, 4);
        let pid = dm.allocate(PageType::Data).unwrap();

        let mut data = vec![0u8; 64];
        data[0] = 0xAB;
        data[63] = 0xCD;
        dm.write(pid, &data).unwrap();

        let mut buf = vec![0u8; 64];
        dm.read(pid, &mut buf).unwrap();
        assert_eq!(buf, data);
    }

    #[test]
    fn test_allocate_zeroes_reused_page() {
        let mut dm = DiskManager::new(64, 2);
        let pid = dm.allocate(PageType::Data).unwrap();
        dm.write(pid, &vec![0xFF; 64]).unwrap();
        dm.free(pid);

        let pid2 = dm.allocate(PageType::Data).unwrap();
        assert_eq!(pid, pid2);
        let mut buf = vec![0xEE; 64];
        dm.read(pid2, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0));
    }

    #[test]
    fn test_read_unallocated_fails() {
        let dm = DiskManager::new(64, 4);
        let mut buf = vec![0u8; 64];
        assert!(matches!(
            dm.read(PageId::new(0), &mut buf),
            Err(EngineError::BadPage(_))
        ));
        assert!(matches!(
            dm.read(PageId::new(99), &mut buf),
            Err(EngineError::BadPage(_))
        ));
    }

    #[test]
    fn test_disk_full() {
        let mut dm = DiskManager::new(64, 2);
        dm.allocate(PageType::Data).unwrap();
        dm.allocate(PageType::Data).unwrap();
        assert!(matches!(
            dm.allocate(PageType::Data),
            Err(EngineError::DiskFull(2))
        ));
    }

    #[test]
    fn test_free_is_idempotent() {
        let mut dm = DiskManager::new(64, 2);
        let pid = dm.allocate(PageType::Data).unwrap();
        dm.free(pid);
        dm.free(pid);
        dm.free(PageId::new(77));
        assert_eq!(dm.num_allocated(), 0);
    }

    #[test]
    fn test_page_type_tracked() {
        let mut dm = DiskManager::new(64, 4);
        let d = dm.allocate(PageType::Data).unwrap();
        let o = dm.allocate(PageType::Overflow).unwrap();
        assert_eq!(dm.page_type(d), PageType::Data);
        assert_eq!(dm.page_type(o), PageType::Overflow);
        dm.free(o);
        assert_eq!(dm.page_type(o), PageType::Free);
    }
}
