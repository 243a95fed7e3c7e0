mod codec;
mod column_type;
mod schema;
mod value;

pub use codec::{decode_row, encode_row};
pub use column_type::ColumnType;
pub use schema::{Column, Schema};
pub use value::Value;
