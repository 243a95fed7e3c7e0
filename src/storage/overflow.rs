//! Overflow chains for rows too large to live inline in a data page.
//!
//! A row whose encoded form exceeds the engine's overflow threshold is
//! written across a linked list of `Overflow` pages. Each chain page holds,
//! after the standard 16-byte header:
//!
//! ```text
//! total_len : u32  (length of the whole row, same on every chunk)
//! chunk_len : u32  (payload bytes stored in this page)
//! payload   : chunk_len bytes (up to page_size - 24)
//! ```
//!
//! `next_page_id` in the page header links the chunks. The data page then
//! stores a small forwarding record in an ordinary slot instead of the row.

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{EngineError, PageId, PageType, Result, INVALID_PAGE_ID, PAGE_HEADER_SIZE};
use crate::storage::page::{SlottedPage, SlottedPageRef};

/// Chain-page payload starts after the page header plus the two u32 fields.
pub const OVERFLOW_DATA_OFFSET: usize = PAGE_HEADER_SIZE + 8;

/// First byte of a forwarding record.
pub const FORWARD_MARKER: u8 = 0xFF;

/// marker u8 + head page id u32 + total length u16.
pub const FORWARD_RECORD_SIZE: usize = 7;

/// Payload bytes one chain page can carry.
pub fn chunk_capacity(page_size: usize) -> usize {
    page_size - OVERFLOW_DATA_OFFSET
}

/// The fixed record a data page stores in place of an overflowed row.
///
/// `total_len` saturates at `u16::MAX`; reassembly trusts the chain's own
/// u32 length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardingRecord {
    pub head_page_id: PageId,
    pub total_len: u16,
}

impl ForwardingRecord {
    pub fn for_payload(head_page_id: PageId, payload_len: usize) -> Self {
        Self {
            head_page_id,
            total_len: payload_len.min(u16::MAX as usize) as u16,
        }
    }

    pub fn encode(&self) -> [u8; FORWARD_RECORD_SIZE] {
        let mut out = [0u8; FORWARD_RECORD_SIZE];
        out[0] = FORWARD_MARKER;
        out[1..5].copy_from_slice(&self.head_page_id.as_u32().to_le_bytes());
        out[5..7].copy_from_slice(&self.total_len.to_le_bytes());
        out
    }

    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if !Self::matches(bytes) {
            return None;
        }
        Some(Self {
            head_page_id: PageId::new(u32::from_le_bytes([
                bytes[1], bytes[2], bytes[3], bytes[4],
            ])),
            total_len: u16::from_le_bytes([bytes[5], bytes[6]]),
        })
    }

    /// A slot forwards iff it is exactly record-sized and starts with the
    /// marker byte.
    pub fn matches(bytes: &[u8]) -> bool {
        bytes.len() == FORWARD_RECORD_SIZE && bytes[0] == FORWARD_MARKER
    }
}

/// Write `data` across freshly allocated overflow pages and return the head
/// of the chain. If anything fails partway, every page the chain already
/// claimed is freed before the error propagates.
pub fn write_chain(pool: &BufferPoolManager, data: &[u8]) -> Result<PageId> {
    let mut allocated = Vec::new();
    match write_chain_inner(pool, data, &mut allocated) {
        Ok(head) => {
            debug!(
                "wrote {} bytes across {} overflow pages starting at {}",
                data.len(),
                allocated.len(),
                head
            );
            Ok(head)
        }
        Err(e) => {
            for page_id in allocated {
                let _ = pool.drop_page(page_id);
            }
            Err(e)
        }
    }
}

fn write_chain_inner(
    pool: &BufferPoolManager,
    data: &[u8],
    allocated: &mut Vec<PageId>,
) -> Result<PageId> {
    let cap = chunk_capacity(pool.page_size());
    let total_len = data.len() as u32;
    let mut head = INVALID_PAGE_ID;
    let mut prev = INVALID_PAGE_ID;
    let mut remaining = data;

    loop {
        let (page_id, mut guard) = pool.new_page(PageType::Overflow)?;
        allocated.push(page_id);

        let chunk_len = remaining.len().min(cap);
        {
            let buf = guard.data_mut();
            buf[PAGE_HEADER_SIZE..PAGE_HEADER_SIZE + 4].copy_from_slice(&total_len.to_le_bytes());
            buf[PAGE_HEADER_SIZE + 4..PAGE_HEADER_SIZE + 8]
                .copy_from_slice(&(chunk_len as u32).to_le_bytes());
            buf[OVERFLOW_DATA_OFFSET..OVERFLOW_DATA_OFFSET + chunk_len]
                .copy_from_slice(&remaining[..chunk_len]);
        }
        drop(guard);

        if head == INVALID_PAGE_ID {
            head = page_id;
        }
        if prev != INVALID_PAGE_ID {
            let mut prev_guard = pool.write_page(prev)?;
            SlottedPage::new(prev_guard.data_mut()).set_next_page(page_id);
        }
        prev = page_id;

        remaining = &remaining[chunk_len..];
        if remaining.is_empty() {
            return Ok(head);
        }
    }
}

/// Reassemble a row by following the chain from its head page. The walk is
/// bounded by the disk size; a longer chain means corrupt links.
pub fn read_chain(pool: &BufferPoolManager, head: PageId) -> Result<Vec<u8>> {
    let max_hops = pool.disk_max_pages();
    let mut current = head;
    let mut assembled = Vec::new();
    let mut expected: Option<u32> = None;
    let mut hops = 0u32;

    while current != INVALID_PAGE_ID {
        hops += 1;
        if hops > max_hops {
            return Err(EngineError::Corrupted(format!(
                "overflow chain from {} exceeds the {}-page disk",
                head, max_hops
            )));
        }

        let guard = pool.read_page(current)?;
        let buf = guard.data();
        let total_len = u32::from_le_bytes([
            buf[PAGE_HEADER_SIZE],
            buf[PAGE_HEADER_SIZE + 1],
            buf[PAGE_HEADER_SIZE + 2],
            buf[PAGE_HEADER_SIZE + 3],
        ]);
        let chunk_len = u32::from_le_bytes([
            buf[PAGE_HEADER_SIZE + 4],
            buf[PAGE_HEADER_SIZE + 5],
            buf[PAGE_HEADER_SIZE + 6],
            buf[PAGE_HEADER_SIZE + 7],
        ]) as usize;
        if OVERFLOW_DATA_OFFSET + chunk_len > buf.len() {
            return Err(EngineError::Corrupted(format!(
                "overflow page {} claims a {}-byte chunk",
                current, chunk_len
            )));
        }

        if expected.is_none() {
            expected = Some(total_len);
            assembled.reserve(total_len as usize);
        }
        assembled.extend_from_slice(&buf[OVERFLOW_DATA_OFFSET..OVERFLOW_DATA_OFFSET + chunk_len]);

        let next = SlottedPageRef::new(buf).next_page();
        drop(guard);
        current = next;
    }

    let expected = expected.unwrap_or(0) as usize;
    if assembled.len() != expected {
        return Err(EngineError::Corrupted(format!(
            "overflow chain from {} reassembled {} bytes, expected {}",
            head,
            assembled.len(),
            expected
        )));
    }
    Ok(assembled)
}

/// Free every page of a chain. Tolerates pages that are already free so a
/// repeated drop stays idempotent. Returns how many pages were released.
pub fn free_chain(pool: &BufferPoolManager, head: PageId) -> u32 {
    let max_hops = pool.disk_max_pages();
    let mut current = head;
    let mut freed = 0;
    let mut hops = 0u32;

    while current != INVALID_PAGE_ID && hops < max_hops {
        hops += 1;
        let next = match pool.read_page(current) {
            Ok(guard) => SlottedPageRef::new(guard.data()).next_page(),
            Err(_) => break,
        };
        if pool.drop_page(current).is_ok() {
            freed += 1;
        }
        current = next;
    }
    freed
}
