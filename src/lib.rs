//! Heaplet - a pedagogical row-oriented storage engine.
//!
//! The engine keeps a fixed-capacity in-memory "disk" of fixed-size pages,
//! caches those pages in a bounded buffer pool, and stores rows in slotted
//! pages chained per table. It exists to make the mechanics of a disk-based
//! DBMS observable: every structure can be projected as a stable binary
//! snapshot for a host UI to render.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): page bytes and their owners
//!   - `DiskManager`: allocates and frees pages in one contiguous region
//!   - `SlottedPage`: header + slot directory + free gap + tuple heap
//!   - `overflow`: chains of pages for rows too large to live inline
//!
//! - **Buffer Pool** (`buffer`): bounded page cache
//!   - `BufferPoolManager`: fetches pages into frames, evicts by LRU
//!   - `Frame`: per-frame occupant, pin count, dirty bit, and page bytes
//!   - `PageRef`/`PageMut`: RAII pins that cannot leak
//!
//! - **Rows** (`tuple`): schema-driven binary row codec with a null bitmap
//!
//! - **Tables** (`table`, `catalog`): page-chain heaps behind a name catalog
//!
//! - **Facade** (`engine`): the one surface a host calls
//!
//! - **Snapshots** (`snapshot`): read-only byte projections of everything
//!
//! # Example
//!
//! ```rust
//! use heaplet::{Column, ColumnType, Engine, EngineConfig, Schema, Value};
//!
//! let mut engine = Engine::new(EngineConfig::default()).unwrap();
//! engine
//!     .create_table(
//!         "users",
//!         Schema::new(vec![
//!             Column::new("id", ColumnType::Int32, false),
//!             Column::new("name", ColumnType::VarChar(32), false),
//!         ]),
//!     )
//!     .unwrap();
//!
//! let row_id = engine
//!     .insert("users", &[Value::Int32(1), Value::VarChar("Alice".into())])
//!     .unwrap();
//! assert_eq!(row_id.to_string(), "0:0");
//!
//! let values = engine.get("users", row_id).unwrap();
//! assert_eq!(values[0], Value::Int32(1));
//! ```

pub mod buffer;
pub mod catalog;
pub mod common;
pub mod engine;
pub mod snapshot;
pub mod storage;
pub mod table;
pub mod tuple;

// Re-export the host-facing types at the crate root
pub use common::{EngineConfig, EngineError, FrameId, PageId, PageType, Result, RowId, SlotId};
pub use engine::Engine;
pub use tuple::{Column, ColumnType, Schema, Value};
