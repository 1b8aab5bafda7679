//! Columnar output containers.
//!
//! The result core writes fetched values through the `Materializer` trait.
//! `FrameMaterializer` is the built-in implementation and produces a
//! `ResultFrame`: one typed, nullable vector per column.

use std::fmt;

use base64::Engine;
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde_json::{json, Map, Value as JsonValue};

use crate::db::Value;
use crate::error::{Result, RowsetError};
use crate::types::SemanticType;

/// Allocates and fills the host container rows are materialized into.
pub trait Materializer {
    /// The container type produced.
    type Table;

    /// Allocates a container with `capacity` rows per column.
    fn create(&self, types: &[SemanticType], names: &[String], capacity: usize) -> Self::Table;

    /// Grows or shrinks every column to exactly `capacity` rows.
    fn resize(&self, table: Self::Table, capacity: usize) -> Self::Table;

    /// Stores one value.
    fn set_value(
        &self,
        table: &mut Self::Table,
        row: usize,
        column: usize,
        value: Value,
    ) -> Result<()>;

    /// Finalizes the container once all rows are in.
    fn apply_result_class_attributes(
        &self,
        table: Self::Table,
        types: &[SemanticType],
    ) -> Self::Table;
}

/// Storage for one column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Double(Vec<Option<f64>>),
    String(Vec<Option<String>>),
    Date(Vec<Option<NaiveDate>>),
    DateTime(Vec<Option<NaiveDateTime>>),
    Time(Vec<Option<NaiveTime>>),
    Blob(Vec<Option<Vec<u8>>>),
    Logical(Vec<Option<bool>>),
}

macro_rules! each_column {
    ($data:expr, $vec:ident => $body:expr) => {
        match $data {
            ColumnData::Int32($vec) => $body,
            ColumnData::Int64($vec) => $body,
            ColumnData::Double($vec) => $body,
            ColumnData::String($vec) => $body,
            ColumnData::Date($vec) => $body,
            ColumnData::DateTime($vec) => $body,
            ColumnData::Time($vec) => $body,
            ColumnData::Blob($vec) => $body,
            ColumnData::Logical($vec) => $body,
        }
    };
}

impl ColumnData {
    /// Allocates `len` NULL rows of `kind`.
    pub fn new(kind: SemanticType, len: usize) -> Self {
        match kind {
            SemanticType::Int32 => Self::Int32(vec![None; len]),
            SemanticType::Int64 => Self::Int64(vec![None; len]),
            SemanticType::Double => Self::Double(vec![None; len]),
            SemanticType::String => Self::String(vec![None; len]),
            SemanticType::Date => Self::Date(vec![None; len]),
            SemanticType::DateTime => Self::DateTime(vec![None; len]),
            SemanticType::Time => Self::Time(vec![None; len]),
            SemanticType::Blob => Self::Blob(vec![None; len]),
            SemanticType::Logical => Self::Logical(vec![None; len]),
        }
    }

    pub fn len(&self) -> usize {
        each_column!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Resizes to `len` rows, padding with NULL.
    pub fn resize(&mut self, len: usize) {
        each_column!(self, v => v.resize(len, None))
    }

    /// Stores `value` at `row`. NULL clears the slot.
    pub fn set(&mut self, row: usize, value: Value) -> Result<()> {
        if row >= self.len() {
            return Err(RowsetError::internal(format!(
                "row {row} is past the column end ({})",
                self.len()
            )));
        }

        let mismatch = |value: &Value, target: &str| {
            RowsetError::conversion(format!("cannot store {value:?} in a {target} column"))
        };

        match (self, value) {
            (column, Value::Null) => each_column!(column, v => v[row] = None),
            (Self::Int32(v), Value::Int(i)) => {
                v[row] = Some(i32::try_from(i).map_err(|_| {
                    RowsetError::conversion(format!("{i} is out of range for integer"))
                })?)
            }
            (Self::Int64(v), Value::Int(i)) => v[row] = Some(i),
            (Self::Double(v), Value::Float(f)) => v[row] = Some(f),
            (Self::Double(v), Value::Int(i)) => v[row] = Some(i as f64),
            (Self::String(v), Value::String(s)) => v[row] = Some(s),
            (Self::Date(v), Value::Date(d)) => v[row] = Some(d),
            (Self::DateTime(v), Value::DateTime(dt)) => v[row] = Some(dt),
            (Self::Time(v), Value::Time(t)) => v[row] = Some(t),
            (Self::Blob(v), Value::Bytes(b)) => v[row] = Some(b),
            (Self::Logical(v), Value::Bool(b)) => v[row] = Some(b),
            (column, value) => return Err(mismatch(&value, column.kind().type_name())),
        }
        Ok(())
    }

    /// Reads the value at `row`. Out-of-range rows read as NULL.
    pub fn get(&self, row: usize) -> Value {
        fn cell<T: Clone + Into<Value>>(v: &[Option<T>], row: usize) -> Value {
            v.get(row).cloned().flatten().map_or(Value::Null, Into::into)
        }

        match self {
            Self::Int32(v) => cell(v, row),
            Self::Int64(v) => cell(v, row),
            Self::Double(v) => cell(v, row),
            Self::String(v) => cell(v, row),
            Self::Date(v) => cell(v, row),
            Self::DateTime(v) => cell(v, row),
            Self::Time(v) => cell(v, row),
            Self::Blob(v) => cell(v, row),
            Self::Logical(v) => cell(v, row),
        }
    }

    /// The semantic type this column holds.
    pub fn kind(&self) -> SemanticType {
        match self {
            Self::Int32(_) => SemanticType::Int32,
            Self::Int64(_) => SemanticType::Int64,
            Self::Double(_) => SemanticType::Double,
            Self::String(_) => SemanticType::String,
            Self::Date(_) => SemanticType::Date,
            Self::DateTime(_) => SemanticType::DateTime,
            Self::Time(_) => SemanticType::Time,
            Self::Blob(_) => SemanticType::Blob,
            Self::Logical(_) => SemanticType::Logical,
        }
    }
}

/// A fetched result: named, typed columns of equal length.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultFrame {
    names: Vec<String>,
    types: Vec<SemanticType>,
    columns: Vec<ColumnData>,
    classes: Vec<Option<&'static str>>,
}

impl ResultFrame {
    /// Allocates a frame with `capacity` NULL rows.
    pub fn new(names: Vec<String>, types: Vec<SemanticType>, capacity: usize) -> Self {
        let columns = types
            .iter()
            .map(|&kind| ColumnData::new(kind, capacity))
            .collect();
        let classes = vec![None; types.len()];
        Self {
            names,
            types,
            columns,
            classes,
        }
    }

    /// Builds a frame of string columns, one `Vec` per column.
    pub fn from_strings(names: &[&str], columns: Vec<Vec<String>>) -> Self {
        let types = vec![SemanticType::String; names.len()];
        let columns: Vec<ColumnData> = columns
            .into_iter()
            .map(|column| ColumnData::String(column.into_iter().map(Some).collect()))
            .collect();
        Self {
            names: names.iter().map(|name| name.to_string()).collect(),
            classes: vec![None; types.len()],
            types,
            columns,
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn types(&self) -> &[SemanticType] {
        &self.types
    }

    pub fn columns(&self) -> &[ColumnData] {
        &self.columns
    }

    /// Per-column class label, set once the frame is finalized.
    pub fn classes(&self) -> &[Option<&'static str>] {
        &self.classes
    }

    /// Looks up a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|index| &self.columns[index])
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of rows. Frames without columns have none.
    pub fn row_count(&self) -> usize {
        self.columns.first().map_or(0, ColumnData::len)
    }

    /// Values of one row, in column order.
    pub fn row(&self, index: usize) -> Vec<Value> {
        self.columns.iter().map(|column| column.get(index)).collect()
    }

    /// Renders the rows as a JSON array of objects. Blobs are base64.
    pub fn to_json(&self) -> JsonValue {
        let rows = (0..self.row_count())
            .map(|row| {
                let mut object = Map::new();
                for (name, column) in self.names.iter().zip(&self.columns) {
                    object.insert(name.clone(), json_value(column.get(row)));
                }
                JsonValue::Object(object)
            })
            .collect();
        JsonValue::Array(rows)
    }

    fn resize(&mut self, capacity: usize) {
        for column in &mut self.columns {
            column.resize(capacity);
        }
    }
}

fn json_value(value: Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => json!(b),
        Value::Int(i) => json!(i),
        Value::Float(f) => json!(f),
        Value::String(s) => json!(s),
        Value::Bytes(b) => json!(base64::engine::general_purpose::STANDARD.encode(b)),
        other => json!(other.to_display_string()),
    }
}

impl fmt::Display for ResultFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cells: Vec<Vec<String>> = (0..self.row_count())
            .map(|row| {
                self.columns
                    .iter()
                    .map(|column| column.get(row).to_display_string())
                    .collect()
            })
            .collect();

        let widths: Vec<usize> = self
            .names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                cells
                    .iter()
                    .map(|row| row[i].chars().count())
                    .chain(std::iter::once(name.chars().count()))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        write_line(f, &self.names, &widths)?;
        let rule: Vec<String> = widths.iter().map(|&width| "-".repeat(width)).collect();
        writeln!(f, "{}", rule.join("-+-"))?;
        for row in &cells {
            write_line(f, row, &widths)?;
        }
        write!(
            f,
            "({} row{})",
            self.row_count(),
            if self.row_count() == 1 { "" } else { "s" }
        )
    }
}

fn write_line(f: &mut fmt::Formatter<'_>, values: &[String], widths: &[usize]) -> fmt::Result {
    let padded: Vec<String> = values
        .iter()
        .zip(widths)
        .map(|(value, &width)| format!("{value:<width$}"))
        .collect();
    writeln!(f, "{}", padded.join(" | ").trim_end())
}

/// Class label attached to columns whose host type needs one.
fn class_label(kind: SemanticType) -> Option<&'static str> {
    match kind {
        SemanticType::Int64 => Some("integer64"),
        SemanticType::Date => Some("Date"),
        SemanticType::DateTime => Some("POSIXct"),
        SemanticType::Time => Some("hms"),
        SemanticType::Blob => Some("blob"),
        _ => None,
    }
}

/// Materializes rows into a `ResultFrame`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameMaterializer;

impl Materializer for FrameMaterializer {
    type Table = ResultFrame;

    fn create(&self, types: &[SemanticType], names: &[String], capacity: usize) -> ResultFrame {
        ResultFrame::new(names.to_vec(), types.to_vec(), capacity)
    }

    fn resize(&self, mut table: ResultFrame, capacity: usize) -> ResultFrame {
        table.resize(capacity);
        table
    }

    fn set_value(
        &self,
        table: &mut ResultFrame,
        row: usize,
        column: usize,
        value: Value,
    ) -> Result<()> {
        let data = table.columns.get_mut(column).ok_or_else(|| {
            RowsetError::internal(format!("column {column} is out of range"))
        })?;
        data.set(row, value)
    }

    fn apply_result_class_attributes(
        &self,
        mut table: ResultFrame,
        types: &[SemanticType],
    ) -> ResultFrame {
        table.classes = types.iter().map(|&kind| class_label(kind)).collect();
        table
    }
}
