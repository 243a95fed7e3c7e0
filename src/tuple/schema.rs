use std::collections::HashSet;

use crate::common::{EngineError, Result};

use super::ColumnType;

/// A single column definition in a table schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub col_type: ColumnType,
    pub nullable: bool,
}

impl Column {
    pub fn new(name: impl Into<String>, col_type: ColumnType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            col_type,
            nullable,
        }
    }
}

/// An ordered list of columns describing a table's rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns }
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Bytes needed for the null bitmap: one bit per column, rounded up.
    pub fn null_bitmap_size(&self) -> usize {
        (self.columns.len() + 7) / 8
    }

    /// Creation-time validation: at least one column, unique names, and a
    /// positive payload cap on variable-length columns.
    pub fn validate(&self) -> Result<()> {
        if self.columns.is_empty() {
            return Err(EngineError::InvalidSchema(
                "a table needs at least one column".into(),
            ));
        }
        let mut seen = HashSet::new();
        for col in &self.columns {
            if !seen.insert(col.name.as_str()) {
                return Err(EngineError::InvalidSchema(format!(
                    "duplicate column name {:?}",
                    col.name
                )));
            }
            if col.col_type.is_variable() && col.col_type.max_len() == 0 {
                return Err(EngineError::InvalidSchema(format!(
                    "column {:?} declares a zero-length payload cap",
                    col.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users_schema() -> Schema {
        Schema::new(vec![
            Column::new("id", ColumnType::Int32, false),
            Column::new("name", ColumnType::VarChar(32), false),
            Column::new("score", ColumnType::Float64, true),
        ])
    }

    #[test]
    fn test_schema_basics() {
        let schema = users_schema();
        assert_eq!(schema.num_columns(), 3);
        assert_eq!(schema.column(1).unwrap().name, "name");
        assert_eq!(schema.null_bitmap_size(), 1);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_bitmap_size_rounds_up() {
        let cols: Vec<Column> = (0..9)
            .map(|i| Column::new(format!("c{}", i), ColumnType::Bool, true))
            .collect();
        assert_eq!(Schema::new(cols).null_bitmap_size(), 2);
    }

    #[test]
    fn test_empty_schema_rejected() {
        assert!(matches!(
            Schema::new(vec![]).validate(),
            Err(EngineError::InvalidSchema(_))
        ));
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let schema = Schema::new(vec![
            Column::new("x", ColumnType::Int32, false),
            Column::new("x", ColumnType::Bool, false),
        ]);
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_zero_max_len_rejected() {
        let schema = Schema::new(vec![Column::new("b", ColumnType::Blob(0), false)]);
        assert!(schema.validate().is_err());
    }
}
