//! Row binary encoding and decoding.
//!
//! Row bytes, all little-endian:
//!
//! ```text
//! [null bitmap: ceil(N/8) bytes, bit i (LSB-first) set = column i NULL]
//! [payloads of the non-null columns, in schema order]:
//!     Int32 / UInt32 -> 4 bytes
//!     Float64        -> 8 bytes
//!     Bool           -> 1 byte (0x00 or 0x01)
//!     VarChar        -> u16 length + UTF-8 bytes
//!     Blob           -> u16 length + raw bytes
//! ```
//!
//! NULL columns contribute only their bitmap bit; their payload is omitted
//! entirely.

use crate::common::{EngineError, Result};

use super::{Column, ColumnType, Schema, Value};

/// Encode a row of values into tuple bytes according to the schema.
pub fn encode_row(schema: &Schema, values: &[Value]) -> Result<Vec<u8>> {
    if values.len() != schema.num_columns() {
        return Err(EngineError::SchemaMismatch {
            expected: schema.num_columns(),
            got: values.len(),
        });
    }

    let bitmap_size = schema.null_bitmap_size();
    let mut buf = vec![0u8; bitmap_size];

    for (i, (col, value)) in schema.columns().iter().zip(values).enumerate() {
        if value.is_null() {
            if !col.nullable {
                return Err(EngineError::NullInNonNullable(col.name.clone()));
            }
            buf[i / 8] |= 1 << (i % 8);
            continue;
        }
        encode_value(col, value, &mut buf)?;
    }

    Ok(buf)
}

fn encode_value(col: &Column, value: &Value, buf: &mut Vec<u8>) -> Result<()> {
    match (&col.col_type, value) {
        (ColumnType::Int32, Value::Int32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::UInt32, Value::UInt32(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Float64, Value::Float64(v)) => buf.extend_from_slice(&v.to_le_bytes()),
        (ColumnType::Bool, Value::Bool(v)) => buf.push(u8::from(*v)),
        // Hosts may hand booleans over as 0/1 numerics
        (ColumnType::Bool, Value::Int32(v @ (0 | 1))) => buf.push(*v as u8),
        (ColumnType::Bool, Value::UInt32(v @ (0 | 1))) => buf.push(*v as u8),
        (ColumnType::VarChar(max_len), Value::VarChar(s)) => {
            let bytes = s.as_bytes();
            if bytes.len() > *max_len as usize {
                return Err(EngineError::ValueTooLarge {
                    max: *max_len as usize,
                    got: bytes.len(),
                });
            }
            buf.extend_from_slice(&(bytes.len() as u16).to_le_bytes());
            buf.extend_from_slice(bytes);
        }
        (ColumnType::Blob(max_len), Value::Blob(b)) => {
            if b.len() > *max_len as usize {
                return Err(EngineError::ValueTooLarge {
                    max: *max_len as usize,
                    got: b.len(),
                });
            }
            buf.extend_from_slice(&(b.len() as u16).to_le_bytes());
            buf.extend_from_slice(b);
        }
        (col_type, value) => {
            return Err(EngineError::InvalidValue {
                column: col.name.clone(),
                reason: format!("{:?} cannot be stored as {}", value, col_type),
            });
        }
    }
    Ok(())
}

/// Decode tuple bytes back into values according to the schema.
pub fn decode_row(schema: &Schema, data: &[u8]) -> Result<Vec<Value>> {
    let bitmap_size = schema.null_bitmap_size();
    if data.len() < bitmap_size {
        return Err(EngineError::Truncated(data.len()));
    }
    let bitmap = &data[..bitmap_size];
    let mut offset = bitmap_size;
    let mut values = Vec::with_capacity(schema.num_columns());

    for (i, col) in schema.columns().iter().enumerate() {
        if (bitmap[i / 8] >> (i % 8)) & 1 == 1 {
            values.push(Value::Null);
            continue;
        }
        let (value, consumed) = decode_value(col, &data[offset..], offset)?;
        offset += consumed;
        values.push(value);
    }

    Ok(values)
}

fn decode_value(col: &Column, data: &[u8], base: usize) -> Result<(Value, usize)> {
    let need = |n: usize| {
        if data.len() < n {
            Err(EngineError::Truncated(base + data.len()))
        } else {
            Ok(())
        }
    };

    match col.col_type {
        ColumnType::Int32 => {
            need(4)?;
            let v = i32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            Ok((Value::Int32(v), 4))
        }
        ColumnType::UInt32 => {
            need(4)?;
            let v = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
            Ok((Value::UInt32(v), 4))
        }
        ColumnType::Float64 => {
            need(8)?;
            let v = f64::from_le_bytes([
                data[0], data[1], data[2], data[3], data[4], data[5], data[6], data[7],
            ]);
            Ok((Value::Float64(v), 8))
        }
        ColumnType::Bool => {
            need(1)?;
            Ok((Value::Bool(data[0] != 0), 1))
        }
        ColumnType::VarChar(_) => {
            need(2)?;
            let len = u16::from_le_bytes([data[0], data[1]]) as usize;
            need(2 + len)?;
            let s = std::str::from_utf8(&data[2..2 + len])
                .map_err(|_| EngineError::InvalidUtf8(col.name.clone()))?;
            Ok((Value::VarChar(s.to_string()), 2 + len))
        }
        ColumnType::Blob(_) => {
            need(2)?;
            let len = u16::from_le_bytes([data[0], data[1]]) as usize;
            need(2 + len)?;
            Ok((Value::Blob(data[2..2 + len].to_vec()), 2 + len))
        }
    }
}
