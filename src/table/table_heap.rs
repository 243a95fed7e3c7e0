//! Table heap - a table stored as a linked chain of data pages.
//!
//! Rows are placed first-fit in chain order; when no page in the chain has
//! room, a fresh data page is spliced onto the tail. Rows larger than the
//! overflow threshold live in an overflow chain and leave only a forwarding
//! record behind in the data page.

use log::debug;

use crate::buffer::BufferPoolManager;
use crate::common::{
    EngineError, PageId, PageType, Result, RowId, INVALID_PAGE_ID, PAGE_HEADER_SIZE, SLOT_SIZE,
};
use crate::storage::overflow::{self, ForwardingRecord};
use crate::storage::page::{SlottedPage, SlottedPageRef};
use crate::tuple::{decode_row, encode_row, Schema, Value};

pub struct TableHeap {
    name: String,
    schema: Schema,
    first_page_id: PageId,
    row_count: u32,
    overflow_threshold: u32,
}

impl TableHeap {
    /// Create a table, allocating its head data page.
    pub fn create(
        name: String,
        schema: Schema,
        overflow_threshold: u32,
        pool: &BufferPoolManager,
    ) -> Result<Self> {
        schema.validate()?;
        let (first_page_id, guard) = pool.new_page(PageType::Data)?;
        drop(guard);
        Ok(Self {
            name,
            schema,
            first_page_id,
            row_count: 0,
            overflow_threshold,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn first_page_id(&self) -> PageId {
        self.first_page_id
    }

    pub fn row_count(&self) -> u32 {
        self.row_count
    }

    /// Insert a row, returning its stable RowId.
    pub fn insert(&mut self, pool: &BufferPoolManager, values: &[Value]) -> Result<RowId> {
        let encoded = encode_row(&self.schema, values)?;

        let (record, chain_head) = if encoded.len() > self.overflow_threshold as usize {
            let head = overflow::write_chain(pool, &encoded)?;
            let record = ForwardingRecord::for_payload(head, encoded.len()).encode().to_vec();
            (record, Some(head))
        } else {
            (encoded, None)
        };

        // A record that cannot fit even an empty page will never place
        let inline_cap = pool.page_size() - PAGE_HEADER_SIZE - SLOT_SIZE;
        if record.len() > inline_cap {
            if let Some(head) = chain_head {
                overflow::free_chain(pool, head);
            }
            return Err(EngineError::ValueTooLarge {
                max: inline_cap,
                got: record.len(),
            });
        }

        match self.place_record(pool, &record) {
            Ok(row_id) => {
                self.row_count += 1;
                Ok(row_id)
            }
            Err(e) => {
                // The chain must not outlive a failed insert
                if let Some(head) = chain_head {
                    overflow::free_chain(pool, head);
                }
                Err(e)
            }
        }
    }

    /// First-fit walk over the page chain; appends a fresh tail page when
    /// nothing fits. One page is pinned at a time.
    fn place_record(&self, pool: &BufferPoolManager, record: &[u8]) -> Result<RowId> {
        let max_hops = pool.disk_max_pages();
        let mut current = self.first_page_id;
        let mut hops = 0u32;

        let tail = loop {
            hops += 1;
            if hops > max_hops {
                return Err(EngineError::Corrupted(format!(
                    "page chain of table {:?} exceeds the {}-page disk",
                    self.name, max_hops
                )));
            }

            let mut guard = pool.write_page(current)?;
            let (fits, next) = {
                let page = SlottedPageRef::new(guard.data());
                (
                    page.free_space() as usize >= record.len() + SLOT_SIZE,
                    page.next_page(),
                )
            };
            if fits {
                let slot_id = SlottedPage::new(guard.data_mut()).insert_tuple(record)?;
                return Ok(RowId::new(current, slot_id));
            }
            drop(guard);

            if next == INVALID_PAGE_ID {
                break current;
            }
            current = next;
        };

        // No page had room: grow the chain
        let (new_page_id, mut new_guard) = pool.new_page(PageType::Data)?;
        let slot_id = SlottedPage::new(new_guard.data_mut()).insert_tuple(record)?;
        drop(new_guard);
        debug!(
            "table {:?} grew to page {} (tail was {})",
            self.name, new_page_id, tail
        );

        let splice = pool.write_page(tail).map(|mut tail_guard| {
            SlottedPage::new(tail_guard.data_mut()).set_next_page(new_page_id);
        });
        if let Err(e) = splice {
            let _ = pool.drop_page(new_page_id);
            return Err(e);
        }

        Ok(RowId::new(new_page_id, slot_id))
    }

    /// Read one row back, resolving a forwarding record if the row
    /// overflowed.
    pub fn get(&self, pool: &BufferPoolManager, row_id: RowId) -> Result<Vec<Value>> {
        let bytes = {
            let guard = pool.read_page(row_id.page_id)?;
            SlottedPageRef::new(guard.data())
                .get_tuple(row_id.slot_id)?
                .to_vec()
        };
        let row_bytes = match ForwardingRecord::decode(&bytes) {
            Some(record) => overflow::read_chain(pool, record.head_page_id)?,
            None => bytes,
        };
        decode_row(&self.schema, &row_bytes)
    }

    /// Tombstone a row. Reports whether a live slot actually transitioned;
    /// out-of-range and already-tombstoned slots are a quiet `false`.
    pub fn delete(&mut self, pool: &BufferPoolManager, row_id: RowId) -> Result<bool> {
        let bytes = {
            let mut guard = pool.write_page(row_id.page_id)?;
            let bytes = match SlottedPageRef::new(guard.data()).get_tuple(row_id.slot_id) {
                Ok(b) => b.to_vec(),
                Err(EngineError::BadSlot(_)) | Err(EngineError::Tombstoned(_)) => {
                    return Ok(false)
                }
                Err(e) => return Err(e),
            };
            SlottedPage::new(guard.data_mut()).delete_tuple(row_id.slot_id)?;
            bytes
        };

        if let Some(record) = ForwardingRecord::decode(&bytes) {
            overflow::free_chain(pool, record.head_page_id);
        }
        self.row_count -= 1;
        Ok(true)
    }

    /// Every live row in chain order, then slot order. Rows that fail to
    /// decode carry their error instead of aborting the scan.
    #[allow(clippy::type_complexity)]
    pub fn scan(
        &self,
        pool: &BufferPoolManager,
    ) -> Result<Vec<(RowId, Result<Vec<Value>>)>> {
        let max_hops = pool.disk_max_pages();
        let mut out = Vec::new();
        let mut current = self.first_page_id;
        let mut hops = 0u32;

        while current != INVALID_PAGE_ID {
            hops += 1;
            if hops > max_hops {
                return Err(EngineError::Corrupted(format!(
                    "page chain of table {:?} exceeds the {}-page disk",
                    self.name, max_hops
                )));
            }

            // Copy the raw tuples out with only this data page pinned
            let (raw_rows, next) = {
                let guard = pool.read_page(current)?;
                let page = SlottedPageRef::new(guard.data());
                let raw: Vec<_> = page
                    .live_slots()
                    .into_iter()
                    .map(|sid| (sid, page.get_tuple(sid).map(|b| b.to_vec())))
                    .collect();
                (raw, page.next_page())
            };

            for (slot_id, bytes) in raw_rows {
                let row_id = RowId::new(current, slot_id);
                let decoded = bytes.and_then(|bytes| {
                    let row_bytes = match ForwardingRecord::decode(&bytes) {
                        Some(record) => overflow::read_chain(pool, record.head_page_id)?,
                        None => bytes,
                    };
                    decode_row(&self.schema, &row_bytes)
                });
                out.push((row_id, decoded));
            }

            current = next;
        }

        Ok(out)
    }

    /// The data pages of this table, in chain order.
    pub fn page_ids(&self, pool: &BufferPoolManager) -> Result<Vec<PageId>> {
        let max_hops = pool.disk_max_pages();
        let mut ids = Vec::new();
        let mut current = self.first_page_id;

        while current != INVALID_PAGE_ID {
            if ids.len() as u32 >= max_hops {
                return Err(EngineError::Corrupted(format!(
                    "page chain of table {:?} exceeds the {}-page disk",
                    self.name, max_hops
                )));
            }
            ids.push(current);
            let guard = pool.read_page(current)?;
            current = SlottedPageRef::new(guard.data()).next_page();
        }
        Ok(ids)
    }

    /// Chain walk on the non-recording read path, for the snapshot surface.
    pub fn page_ids_peek(&self, pool: &BufferPoolManager) -> Vec<PageId> {
        let max_hops = pool.disk_max_pages();
        let mut ids = Vec::new();
        let mut current = self.first_page_id;

        while current != INVALID_PAGE_ID && (ids.len() as u32) < max_hops {
            ids.push(current);
            match pool.peek_page(current) {
                Some(bytes) => current = SlottedPageRef::new(&bytes).next_page(),
                None => break,
            }
        }
        ids
    }

    /// Free every page this table owns: overflow chains first, then the
    /// data pages themselves.
    pub fn destroy(&self, pool: &BufferPoolManager) -> Result<()> {
        for page_id in self.page_ids(pool)? {
            let chain_heads: Vec<PageId> = {
                let guard = pool.read_page(page_id)?;
                let page = SlottedPageRef::new(guard.data());
                page.live_slots()
                    .into_iter()
                    .filter_map(|sid| {
                        page.get_tuple(sid)
                            .ok()
                            .and_then(ForwardingRecord::decode)
                            .map(|record| record.head_page_id)
                    })
                    .collect()
            };
            for head in chain_heads {
                overflow::free_chain(pool, head);
            }
            pool.drop_page(page_id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::disk::DiskManager;
    use crate::tuple::{Column, ColumnType};

    fn make_pool(page_size: u32, disk_pages: u32) -> BufferPoolManager {
        BufferPoolManager::new(8, DiskManager::new(page_size, disk_pages))
    }

    fn users_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ColumnType::Int32, false),
            Column::new("name", ColumnType::VarChar(255), false),
        ])
    }

    #[test]
    fn test_create_and_insert() {
        let pool = make_pool(128, 16);
        let mut table =
            TableHeap::create("users".into(), users_schema(), 64, &pool).unwrap();

        let row_id = table
            .insert(&pool, &[Value::Int32(1), Value::VarChar("Alice".into())])
            .unwrap();
        assert_eq!(row_id.page_id, table.first_page_id());
        assert_eq!(row_id.slot_id.as_u16(), 0);
        assert_eq!(table.row_count(), 1);
    }

    #[test]
    fn test_insert_and_get() {
        let pool = make_pool(128, 16);
        let mut table =
            TableHeap::create("users".into(), users_schema(), 64, &pool).unwrap();

        let values = vec![Value::Int32(42), Value::VarChar("Bob".into())];
        let row_id = table.insert(&pool, &values).unwrap();
        assert_eq!(table.get(&pool, row_id).unwrap(), values);
    }

    #[test]
    fn test_chain_growth() {
        let pool = make_pool(64, 32);
        let schema = Schema::new(vec![Column::new("id", ColumnType::Int32, false)]);
        let mut table = TableHeap::create("nums".into(), schema, 32, &pool).unwrap();

        // Each row costs 5 tuple bytes + 4 slot bytes in a 48-byte body
        for i in 0..20 {
            table.insert(&pool, &[Value::Int32(i)]).unwrap();
        }
        assert_eq!(table.row_count(), 20);
        assert!(table.page_ids(&pool).unwrap().len() > 1);

        let rows = table.scan(&pool).unwrap();
        assert_eq!(rows.len(), 20);
        for (i, (_, values)) in rows.iter().enumerate() {
            assert_eq!(values.as_ref().unwrap()[0], Value::Int32(i as i32));
        }
    }

    #[test]
    fn test_delete_keeps_other_row_ids() {
        let pool = make_pool(128, 16);
        let mut table =
            TableHeap::create("users".into(), users_schema(), 64, &pool).unwrap();

        let r0 = table
            .insert(&pool, &[Value::Int32(0), Value::VarChar("a".into())])
            .unwrap();
        let r1 = table
            .insert(&pool, &[Value::Int32(1), Value::VarChar("b".into())])
            .unwrap();
        let r2 = table
            .insert(&pool, &[Value::Int32(2), Value::VarChar("c".into())])
            .unwrap();

        assert!(table.delete(&pool, r1).unwrap());
        assert!(!table.delete(&pool, r1).unwrap());
        assert_eq!(table.row_count(), 2);

        assert_eq!(table.get(&pool, r0).unwrap()[0], Value::Int32(0));
        assert_eq!(table.get(&pool, r2).unwrap()[0], Value::Int32(2));
        assert!(matches!(
            table.get(&pool, r1),
            Err(EngineError::Tombstoned(_))
        ));

        let rows = table.scan(&pool).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0, r0);
        assert_eq!(rows[1].0, r2);
    }

    #[test]
    fn test_overflow_roundtrip() {
        let pool = make_pool(128, 64);
        let schema = Schema::new(vec![Column::new("data", ColumnType::Blob(8192), false)]);
        let mut table = TableHeap::create("blobs".into(), schema, 64, &pool).unwrap();

        let payload: Vec<u8> = (0..2000u32).map(|i| (i % 251) as u8).collect();
        let row_id = table.insert(&pool, &[Value::Blob(payload.clone())]).unwrap();

        // 1 data page + ceil(2006 / 104) chain pages
        assert_eq!(pool.disk_num_allocated(), 1 + 20);

        match &table.get(&pool, row_id).unwrap()[0] {
            Value::Blob(b) => assert_eq!(b, &payload),
            other => panic!("expected a blob, got {:?}", other),
        }

        assert!(table.delete(&pool, row_id).unwrap());
        assert_eq!(pool.disk_num_allocated(), 1);
    }

    #[test]
    fn test_failed_overflow_insert_rolls_back() {
        let pool = make_pool(128, 4);
        let schema = Schema::new(vec![Column::new("data", ColumnType::Blob(8192), false)]);
        let mut table = TableHeap::create("blobs".into(), schema, 64, &pool).unwrap();

        let before = pool.disk_num_allocated();
        let err = table.insert(&pool, &[Value::Blob(vec![1u8; 2000])]);
        assert!(matches!(err, Err(EngineError::DiskFull(_))));
        assert_eq!(pool.disk_num_allocated(), before);
        assert_eq!(table.row_count(), 0);
    }

    #[test]
    fn test_destroy_frees_everything() {
        let pool = make_pool(128, 64);
        let schema = Schema::new(vec![
            Column::new("id", ColumnType::Int32, false),
            Column::new("data", ColumnType::Blob(8192), true),
        ]);
        let mut table = TableHeap::create("mixed".into(), schema, 64, &pool).unwrap();

        table
            .insert(&pool, &[Value::Int32(1), Value::Blob(vec![9u8; 500])])
            .unwrap();
        table.insert(&pool, &[Value::Int32(2), Value::Null]).unwrap();
        assert!(pool.disk_num_allocated() > 1);

        table.destroy(&pool).unwrap();
        assert_eq!(pool.disk_num_allocated(), 0);
    }
}
