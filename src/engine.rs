//! The engine facade tying the catalog, buffer pool, and disk together.
//!
//! This is the single surface a host talks to: table DDL and DML, explicit
//! flushes, and the read-only snapshot projections. All entry points are
//! synchronous and the engine expects one logical thread of control.

use log::error;

use crate::buffer::BufferPoolManager;
use crate::catalog::Catalog;
use crate::common::{EngineConfig, EngineError, PageId, Result, RowId};
use crate::snapshot;
use crate::storage::disk::DiskManager;
use crate::table::TableHeap;
use crate::tuple::{Schema, Value};

pub struct Engine {
    config: EngineConfig,
    pool: BufferPoolManager,
    catalog: Catalog,
    /// Set when a storage invariant is found violated. A poisoned engine
    /// refuses every further mutation; reads and snapshots stay available.
    poisoned: bool,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let disk = DiskManager::new(config.page_size, config.disk_capacity);
        let pool = BufferPoolManager::new(config.pool_size, disk);
        Ok(Self {
            config,
            pool,
            catalog: Catalog::new(),
            poisoned: false,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Read-only access to the buffer pool, for hosts and white-box tests.
    pub fn buffer_pool(&self) -> &BufferPoolManager {
        &self.pool
    }

    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    // ── DDL ────────────────────────────────────────────────────────────

    pub fn create_table(&mut self, name: &str, schema: Schema) -> Result<()> {
        self.ensure_mutable()?;
        if self.catalog.contains(name) {
            return Err(EngineError::AlreadyExists(name.to_string()));
        }
        let result = TableHeap::create(
            name.to_string(),
            schema,
            self.config.overflow_threshold,
            &self.pool,
        );
        let table = self.absorb(result)?;
        self.catalog.insert(table);
        Ok(())
    }

    /// Drop a table and free every page it owns. Unknown names report
    /// `false` so drops stay idempotent.
    pub fn drop_table(&mut self, name: &str) -> Result<bool> {
        self.ensure_mutable()?;
        let Self { catalog, pool, .. } = self;
        let Some(table) = catalog.get(name) else {
            return Ok(false);
        };
        let result = table.destroy(pool);
        self.absorb(result)?;
        self.catalog.remove(name);
        Ok(true)
    }

    /// Table names in creation order.
    pub fn list_tables(&self) -> Vec<&str> {
        self.catalog.names()
    }

    pub fn schema_of(&self, name: &str) -> Option<&Schema> {
        self.catalog.get(name).map(|t| t.schema())
    }

    pub fn row_count(&self, name: &str) -> Option<u32> {
        self.catalog.get(name).map(|t| t.row_count())
    }

    // ── DML ────────────────────────────────────────────────────────────

    pub fn insert(&mut self, name: &str, values: &[Value]) -> Result<RowId> {
        self.ensure_mutable()?;
        let Self { catalog, pool, .. } = self;
        let table = catalog
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))?;
        let result = table.insert(pool, values);
        self.absorb(result)
    }

    pub fn get(&mut self, name: &str, row_id: RowId) -> Result<Vec<Value>> {
        let Self { catalog, pool, .. } = self;
        let table = catalog
            .get(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))?;
        let result = table.get(pool, row_id);
        self.absorb(result)
    }

    pub fn delete(&mut self, name: &str, row_id: RowId) -> Result<bool> {
        self.ensure_mutable()?;
        let Self { catalog, pool, .. } = self;
        let table = catalog
            .get_mut(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))?;
        let result = table.delete(pool, row_id);
        self.absorb(result)
    }

    /// Every live row in page-chain order, then slot order. Rows that fail
    /// to decode carry their error instead of aborting the scan.
    #[allow(clippy::type_complexity)]
    pub fn scan(&mut self, name: &str) -> Result<Vec<(RowId, Result<Vec<Value>>)>> {
        let Self { catalog, pool, .. } = self;
        let table = catalog
            .get(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))?;
        let result = table.scan(pool);
        self.absorb(result)
    }

    // ── Cache control ──────────────────────────────────────────────────

    pub fn flush_page(&mut self, page_id: PageId) -> Result<bool> {
        self.ensure_mutable()?;
        let result = self.pool.flush_page(page_id);
        self.absorb(result)
    }

    pub fn flush_all(&mut self) -> Result<()> {
        self.ensure_mutable()?;
        let result = self.pool.flush_all();
        self.absorb(result)
    }

    // ── Snapshots (read-only, available even when poisoned) ───────────

    pub fn buffer_pool_snapshot(&self) -> Vec<u8> {
        snapshot::snapshot_buffer_pool(&self.pool)
    }

    pub fn disk_snapshot(&self) -> Vec<u8> {
        snapshot::snapshot_disk(&self.pool)
    }

    pub fn page_snapshot(&self, page_id: PageId) -> Result<Vec<u8>> {
        snapshot::snapshot_page(&self.pool, page_id)
    }

    pub fn table_snapshot(&self, name: &str) -> Result<Vec<u8>> {
        let table = self
            .catalog
            .get(name)
            .ok_or_else(|| EngineError::UnknownTable(name.to_string()))?;
        Ok(snapshot::snapshot_table(table, &self.pool))
    }

    // ── Internal ───────────────────────────────────────────────────────

    fn ensure_mutable(&self) -> Result<()> {
        if self.poisoned {
            Err(EngineError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// A `Corrupted` error means an invariant no longer holds; from then on
    /// only reads and snapshots are answered.
    fn absorb<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(EngineError::Corrupted(reason)) = &result {
            error!("poisoning engine: {}", reason);
            self.poisoned = true;
        }
        result
    }
}
