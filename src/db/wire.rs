//! Wire-level structures shared by drivers and the result core.
//!
//! These mirror what a binary prepared-statement protocol exposes: result
//! metadata descriptors, per-column output cells that a fetch writes into,
//! and the status codes a fetch can report.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::Value;
use crate::error::{Result, RowsetError};
use crate::types::{SemanticType, BINARY_CHARSET};

/// Describes one column of a statement's result, as reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    /// Column name (or alias).
    pub name: String,

    /// Wire type code.
    pub field_type: u8,

    /// Charset number; `BINARY_CHARSET` marks binary data.
    pub charset: u16,
}

impl FieldDescriptor {
    /// Creates a new field descriptor.
    pub fn new(name: impl Into<String>, field_type: u8, charset: u16) -> Self {
        Self {
            name: name.into(),
            field_type,
            charset,
        }
    }

    /// Returns true if the column carries binary data.
    pub fn is_binary(&self) -> bool {
        self.charset == BINARY_CHARSET
    }
}

/// Result metadata for a prepared statement.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResultMetadata {
    fields: Vec<FieldDescriptor>,
}

impl ResultMetadata {
    /// Creates metadata from field descriptors.
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self { fields }
    }

    /// Number of result columns.
    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    /// Field descriptors in column order.
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

/// Outcome of a single wire-level row fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchStatus {
    /// A row was written into the output cells.
    Row,

    /// A row was written, but at least one variable-length value did not
    /// fit its buffer. The cell reports the full length.
    Truncated,

    /// The current result has no more rows.
    NoData,
}

/// Storage behind an output cell.
#[derive(Debug, Clone, PartialEq)]
pub enum CellData {
    Int32(i32),
    Int64(i64),
    Double(f64),
    Logical(bool),
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Time(NaiveTime),
    /// Scratch buffer for strings and blobs. Its length is the bound capacity.
    Bytes(Vec<u8>),
}

/// Host-side scratch storage for one column of the current row.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputCell {
    /// Semantic type this cell was allocated for.
    pub kind: SemanticType,

    /// True when the current value is SQL NULL.
    pub is_null: bool,

    /// Full length of the current variable-length value in bytes.
    pub length: usize,

    /// True when `length` exceeds the scratch buffer.
    pub truncated: bool,

    /// Value storage.
    pub data: CellData,
}

impl OutputCell {
    /// Allocates a cell for `kind`. Variable-length kinds get a
    /// `scratch_len`-byte buffer.
    pub fn new(kind: SemanticType, scratch_len: usize) -> Self {
        let data = match kind {
            SemanticType::Int32 => CellData::Int32(0),
            SemanticType::Int64 => CellData::Int64(0),
            SemanticType::Double => CellData::Double(0.0),
            SemanticType::Logical => CellData::Logical(false),
            SemanticType::Date => CellData::Date(NaiveDate::default()),
            SemanticType::DateTime => CellData::DateTime(NaiveDateTime::default()),
            SemanticType::Time => CellData::Time(NaiveTime::default()),
            SemanticType::String | SemanticType::Blob => CellData::Bytes(vec![0; scratch_len]),
        };

        Self {
            kind,
            is_null: true,
            length: 0,
            truncated: false,
            data,
        }
    }

    /// Writes a value into the cell, converting it to the cell's kind.
    ///
    /// Variable-length values longer than the buffer are cut to fit and
    /// flagged as truncated. Returns whether truncation happened.
    pub fn fill(&mut self, value: &Value) -> Result<bool> {
        self.truncated = false;
        self.length = 0;

        if value.is_null() {
            self.is_null = true;
            return Ok(false);
        }
        self.is_null = false;

        let mismatch = || {
            RowsetError::conversion(format!(
                "cannot store {value:?} in a {} column",
                self.kind
            ))
        };

        match &mut self.data {
            CellData::Int32(slot) => {
                let wide = integer_of(value).ok_or_else(mismatch)?;
                *slot = i32::try_from(wide).map_err(|_| {
                    RowsetError::conversion(format!("{wide} is out of range for integer"))
                })?;
            }
            CellData::Int64(slot) => {
                *slot = integer_of(value).ok_or_else(mismatch)?;
            }
            CellData::Double(slot) => {
                *slot = match value {
                    Value::Float(f) => *f,
                    Value::Int(i) => *i as f64,
                    Value::Bool(b) => f64::from(u8::from(*b)),
                    Value::String(s) => s.trim().parse().map_err(|_| mismatch())?,
                    _ => return Err(mismatch()),
                };
            }
            CellData::Logical(slot) => {
                *slot = match value {
                    Value::Bool(b) => *b,
                    Value::Int(i) => *i != 0,
                    _ => return Err(mismatch()),
                };
            }
            CellData::Date(slot) => {
                *slot = match value {
                    Value::Date(d) => *d,
                    Value::DateTime(dt) => dt.date(),
                    _ => return Err(mismatch()),
                };
            }
            CellData::DateTime(slot) => {
                *slot = match value {
                    Value::DateTime(dt) => *dt,
                    Value::Date(d) => d.and_time(NaiveTime::MIN),
                    _ => return Err(mismatch()),
                };
            }
            CellData::Time(slot) => {
                *slot = match value {
                    Value::Time(t) => *t,
                    Value::DateTime(dt) => dt.time(),
                    _ => return Err(mismatch()),
                };
            }
            CellData::Bytes(buf) => {
                let bytes = value.to_wire_bytes().unwrap_or_default();
                let n = bytes.len().min(buf.len());
                buf[..n].copy_from_slice(&bytes[..n]);
                self.length = bytes.len();
                self.truncated = bytes.len() > buf.len();
            }
        }

        Ok(self.truncated)
    }
}

fn integer_of(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(i64::from(*b)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
