//! Table storage for the in-memory server.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::codes;
use crate::db::{FieldDescriptor, Value};
use crate::error::{Result, RowsetError};
use crate::types::{FieldType, BINARY_CHARSET};

/// A column definition in a stored table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ColumnDef {
    pub name: String,
    pub field_type: FieldType,
    pub charset: u16,
}

impl ColumnDef {
    /// Describes this column in result metadata under `label`.
    pub(crate) fn descriptor(&self, label: &str) -> FieldDescriptor {
        FieldDescriptor::new(label, self.field_type.code(), self.charset)
    }
}

/// A stored table.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    pub name: String,
    pub columns: Vec<ColumnDef>,
    pub rows: Vec<Vec<Value>>,
}

impl Table {
    /// Finds a column by case-insensitive name.
    pub(crate) fn column_index(&self, name: &str) -> Result<usize> {
        self.columns
            .iter()
            .position(|c| c.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| {
                RowsetError::server(
                    format!("Unknown column '{name}' in '{}'", self.name),
                    codes::ER_BAD_FIELD_ERROR,
                )
            })
    }
}

/// All tables known to one server.
#[derive(Debug, Default)]
pub(crate) struct Catalog {
    tables: HashMap<String, Table>,
}

impl Catalog {
    pub(crate) fn table(&self, name: &str) -> Result<&Table> {
        self.tables
            .get(&name.to_ascii_lowercase())
            .ok_or_else(|| no_such_table(name))
    }

    pub(crate) fn table_mut(&mut self, name: &str) -> Result<&mut Table> {
        self.tables
            .get_mut(&name.to_ascii_lowercase())
            .ok_or_else(|| no_such_table(name))
    }

    pub(crate) fn create(&mut self, table: Table, if_not_exists: bool) -> Result<()> {
        let key = table.name.to_ascii_lowercase();
        if self.tables.contains_key(&key) {
            if if_not_exists {
                return Ok(());
            }
            return Err(RowsetError::server(
                format!("Table '{}' already exists", table.name),
                codes::ER_TABLE_EXISTS_ERROR,
            ));
        }
        self.tables.insert(key, table);
        Ok(())
    }

    pub(crate) fn drop_table(&mut self, name: &str, if_exists: bool) -> Result<()> {
        if self.tables.remove(&name.to_ascii_lowercase()).is_none() && !if_exists {
            return Err(RowsetError::server(
                format!("Unknown table '{name}'"),
                codes::ER_BAD_TABLE_ERROR,
            ));
        }
        Ok(())
    }

    pub(crate) fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.values().map(|t| t.name.clone()).collect();
        names.sort();
        names
    }
}

fn no_such_table(name: &str) -> RowsetError {
    RowsetError::server(
        format!("Table '{name}' doesn't exist"),
        codes::ER_NO_SUCH_TABLE,
    )
}

/// Converts a value to the storage representation of `column`.
pub(crate) fn coerce(value: Value, column: &ColumnDef) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    let incorrect = |kind: &str, value: &Value| {
        RowsetError::server(
            format!(
                "Incorrect {kind} value: '{}' for column '{}'",
                value.to_display_string(),
                column.name
            ),
            codes::ER_TRUNCATED_WRONG_VALUE_FOR_FIELD,
        )
    };

    let coerced = match column.field_type {
        FieldType::Tiny
        | FieldType::Short
        | FieldType::Long
        | FieldType::Int24
        | FieldType::LongLong
        | FieldType::Year => match &value {
            Value::Int(_) => value,
            Value::Bool(b) => Value::Int(i64::from(*b)),
            Value::Float(f) => Value::Int(f.round() as i64),
            Value::String(s) => Value::Int(
                s.trim()
                    .parse()
                    .map_err(|_| incorrect("integer", &value))?,
            ),
            _ => return Err(incorrect("integer", &value)),
        },
        FieldType::Decimal | FieldType::NewDecimal | FieldType::Float | FieldType::Double => {
            match &value {
                Value::Float(_) => value,
                Value::Int(i) => Value::Float(*i as f64),
                Value::String(s) => Value::Float(
                    s.trim()
                        .parse()
                        .map_err(|_| incorrect("decimal", &value))?,
                ),
                _ => return Err(incorrect("decimal", &value)),
            }
        }
        FieldType::Bit => match &value {
            Value::Bool(_) => value,
            Value::Int(i) => Value::Bool(*i != 0),
            _ => return Err(incorrect("bit", &value)),
        },
        FieldType::Date | FieldType::NewDate => match &value {
            Value::Date(_) => value,
            Value::DateTime(dt) => Value::Date(dt.date()),
            Value::String(s) => Value::Date(
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| incorrect("date", &value))?,
            ),
            _ => return Err(incorrect("date", &value)),
        },
        FieldType::DateTime | FieldType::Timestamp => match &value {
            Value::DateTime(_) => value,
            Value::Date(d) => Value::DateTime(d.and_time(NaiveTime::MIN)),
            Value::String(s) => Value::DateTime(
                parse_datetime(s).ok_or_else(|| incorrect("datetime", &value))?,
            ),
            _ => return Err(incorrect("datetime", &value)),
        },
        FieldType::Time => match &value {
            Value::Time(_) => value,
            Value::DateTime(dt) => Value::Time(dt.time()),
            Value::String(s) => Value::Time(
                NaiveTime::parse_from_str(s.trim(), "%H:%M:%S")
                    .map_err(|_| incorrect("time", &value))?,
            ),
            _ => return Err(incorrect("time", &value)),
        },
        _ if column.charset == BINARY_CHARSET => match value {
            Value::Bytes(_) => value,
            other => Value::Bytes(other.to_wire_bytes().unwrap_or_default()),
        },
        _ => match value {
            Value::String(_) => value,
            Value::Bytes(bytes) => Value::String(String::from_utf8(bytes).map_err(|e| {
                incorrect("string", &Value::Bytes(e.into_bytes()))
            })?),
            other => Value::String(other.to_display_string()),
        },
    };

    Ok(coerced)
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}

/// SQL comparison. NULL compares as unknown.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Null, _) | (_, Value::Null) => None,
        (Value::Int(x), Value::Int(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bytes(x), Value::Bytes(y)) => Some(x.cmp(y)),
        (Value::Date(x), Value::Date(y)) => Some(x.cmp(y)),
        (Value::DateTime(x), Value::DateTime(y)) => Some(x.cmp(y)),
        (Value::Time(x), Value::Time(y)) => Some(x.cmp(y)),
        (x, y) => numeric(x)?.partial_cmp(&numeric(y)?),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(i) => Some(*i as f64),
        Value::Float(f) => Some(*f),
        Value::Bool(b) => Some(f64::from(u8::from(*b))),
        _ => None,
    }
}
