//! System catalog: the set of live tables, kept in creation order.

use crate::table::TableHeap;

#[derive(Default)]
pub struct Catalog {
    tables: Vec<TableHeap>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name() == name)
    }

    pub fn get(&self, name: &str) -> Option<&TableHeap> {
        self.tables.iter().find(|t| t.name() == name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut TableHeap> {
        self.tables.iter_mut().find(|t| t.name() == name)
    }

    pub fn insert(&mut self, table: TableHeap) {
        debug_assert!(!self.contains(table.name()));
        self.tables.push(table);
    }

    pub fn remove(&mut self, name: &str) -> Option<TableHeap> {
        let idx = self.tables.iter().position(|t| t.name() == name)?;
        Some(self.tables.remove(idx))
    }

    /// Table names in creation order.
    pub fn names(&self) -> Vec<&str> {
        self.tables.iter().map(|t| t.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableHeap> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}
