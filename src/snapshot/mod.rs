//! Binary snapshot encoding for observation by a host UI.
//!
//! All multi-byte values are little-endian. Snapshots never mutate cache
//! state: no pins are taken, no LRU positions move, no counters tick. Pages
//! are read from their frame when resident (the frame is authoritative
//! while dirty) and from the raw disk bytes otherwise.

use crate::buffer::BufferPoolManager;
use crate::common::{EngineError, PageId, Result, INVALID_PAGE_ID};
use crate::storage::page::SlottedPageRef;
use crate::table::TableHeap;

fn push_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn push_u16(buf: &mut Vec<u8>, v: u16) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u32(buf: &mut Vec<u8>, v: u32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

fn push_u64(buf: &mut Vec<u8>, v: u64) {
    buf.extend_from_slice(&v.to_le_bytes());
}

/// Buffer pool overview.
///
/// ```text
/// pool_size : u32
/// page_size : u32
/// per frame (pool_size times):
///     page_id     : u32  (INVALID if empty)
///     pin_count   : u32
///     is_dirty    : u8
///     is_occupied : u8
/// page_table_len : u32, then (page_id: u32, frame_id: u32) pairs
///                  sorted by page id
/// lru_len : u32, then frame_id: u32 front-to-back
/// hits, misses, disk_reads, disk_writes : u64 each
/// disk_num_allocated : u32
/// disk_max_pages     : u32
/// disk_base_ptr      : u32  (always 0 here)
/// ```
pub fn snapshot_buffer_pool(pool: &BufferPoolManager) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + pool.pool_size() * 10);

    push_u32(&mut buf, pool.pool_size() as u32);
    push_u32(&mut buf, pool.page_size() as u32);

    for meta in pool.frame_metas() {
        push_u32(
            &mut buf,
            meta.page_id.unwrap_or(INVALID_PAGE_ID).as_u32(),
        );
        push_u32(&mut buf, meta.pin_count);
        push_u8(&mut buf, meta.is_dirty as u8);
        push_u8(&mut buf, meta.page_id.is_some() as u8);
    }

    let entries = pool.page_table_entries();
    push_u32(&mut buf, entries.len() as u32);
    for (page_id, frame_id) in entries {
        push_u32(&mut buf, page_id.as_u32());
        push_u32(&mut buf, frame_id.as_u32());
    }

    let lru = pool.lru_order();
    push_u32(&mut buf, lru.len() as u32);
    for frame_id in lru {
        push_u32(&mut buf, frame_id.as_u32());
    }

    let stats = pool.stats();
    push_u64(&mut buf, stats.hits);
    push_u64(&mut buf, stats.misses);
    push_u64(&mut buf, stats.disk_reads);
    push_u64(&mut buf, stats.disk_writes);

    push_u32(&mut buf, pool.disk_num_allocated());
    push_u32(&mut buf, pool.disk_max_pages());
    push_u32(&mut buf, 0); // no meaningful base pointer

    buf
}

/// Disk overview.
///
/// ```text
/// max_pages     : u32
/// page_size     : u32
/// num_allocated : u32
/// disk_base_ptr : u32  (always 0 here)
/// per page (max_pages times):
///     is_allocated : u8
///     page_type    : u8
/// ```
pub fn snapshot_disk(pool: &BufferPoolManager) -> Vec<u8> {
    let states = pool.disk_page_states();
    let mut buf = Vec::with_capacity(16 + states.len() * 2);

    push_u32(&mut buf, pool.disk_max_pages());
    push_u32(&mut buf, pool.page_size() as u32);
    push_u32(&mut buf, pool.disk_num_allocated());
    push_u32(&mut buf, 0);

    for (is_allocated, page_type) in states {
        push_u8(&mut buf, is_allocated as u8);
        push_u8(&mut buf, page_type.as_u8());
    }

    buf
}

/// Detailed view of a single page.
///
/// ```text
/// page_size    : u32
/// page_id      : u32
/// page_type    : u8
/// slot_count   : u16
/// free_start   : u16
/// free_end     : u16
/// next_page_id : u32
/// free_space   : u16
/// num_slots    : u16  (same as slot_count)
/// per slot: offset u16, length u16
/// raw page bytes
/// ```
pub fn snapshot_page(pool: &BufferPoolManager, page_id: PageId) -> Result<Vec<u8>> {
    let bytes = pool
        .peek_page(page_id)
        .ok_or(EngineError::BadPage(page_id))?;
    let page = SlottedPageRef::new(&bytes);

    let mut buf = Vec::with_capacity(bytes.len() + 64);
    push_u32(&mut buf, bytes.len() as u32);
    push_u32(&mut buf, page.page_id().as_u32());
    push_u8(&mut buf, bytes[4]);
    let slot_count = page.slot_count();
    push_u16(&mut buf, slot_count);
    push_u16(&mut buf, page.free_start());
    push_u16(&mut buf, page.free_end());
    push_u32(&mut buf, page.next_page().as_u32());
    push_u16(&mut buf, page.free_space());

    push_u16(&mut buf, slot_count);
    for i in 0..slot_count {
        let entry = page
            .get_slot(crate::common::SlotId::new(i))
            .expect("slot index below slot_count");
        push_u16(&mut buf, entry.offset);
        push_u16(&mut buf, entry.length);
    }

    buf.extend_from_slice(&bytes);
    Ok(buf)
}

/// Table metadata.
///
/// ```text
/// name_len : u16, then UTF-8 name bytes
/// row_count     : u32
/// first_page_id : u32
/// num_columns : u16
/// per column:
///     name_len : u16, then UTF-8 name bytes
///     type_tag : u8
///     nullable : u8
///     max_len  : u16  (VarChar/Blob cap, 0 otherwise)
/// page_count : u32, then page_id: u32 in chain order
/// ```
pub fn snapshot_table(table: &TableHeap, pool: &BufferPoolManager) -> Vec<u8> {
    let mut buf = Vec::with_capacity(256);

    let name_bytes = table.name().as_bytes();
    push_u16(&mut buf, name_bytes.len() as u16);
    buf.extend_from_slice(name_bytes);

    push_u32(&mut buf, table.row_count());
    push_u32(&mut buf, table.first_page_id().as_u32());

    let columns = table.schema().columns();
    push_u16(&mut buf, columns.len() as u16);
    for col in columns {
        let col_name = col.name.as_bytes();
        push_u16(&mut buf, col_name.len() as u16);
        buf.extend_from_slice(col_name);
        push_u8(&mut buf, col.col_type.type_tag());
        push_u8(&mut buf, col.nullable as u8);
        push_u16(&mut buf, col.col_type.max_len());
    }

    let page_ids = table.page_ids_peek(pool);
    push_u32(&mut buf, page_ids.len() as u32);
    for page_id in page_ids {
        push_u32(&mut buf, page_id.as_u32());
    }

    buf
}
