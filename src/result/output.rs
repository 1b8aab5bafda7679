//! Output bindings: the per-row scratch cells a fetch writes into.

use tracing::trace;

use super::frame::Materializer;
use crate::db::{CellData, FetchStatus, OutputCell, StatementHandle, Value};
use crate::error::{Result, RowsetError};
use crate::types::SemanticType;

/// Holds one scratch cell per result column and turns the current row's
/// cells into host values.
#[derive(Debug, Default)]
pub struct OutputBinder {
    kinds: Vec<SemanticType>,
    cells: Vec<OutputCell>,
}

impl OutputBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates cells for `types` and binds them to the statement.
    pub fn setup<S: StatementHandle>(
        &mut self,
        statement: &mut S,
        types: &[SemanticType],
        scratch_len: usize,
    ) -> Result<()> {
        self.kinds = types.to_vec();
        self.cells = types
            .iter()
            .map(|&kind| OutputCell::new(kind, scratch_len))
            .collect();
        statement.bind_result(&self.kinds)
    }

    /// Fetches the next row into the cells.
    ///
    /// Every execution drops the statement's result bindings, so they are
    /// re-established before each fetch.
    pub fn fetch<S: StatementHandle>(&mut self, statement: &mut S) -> Result<FetchStatus> {
        statement.bind_result(&self.kinds)?;
        let status = statement.fetch(&mut self.cells)?;
        trace!(?status, "Fetched row");
        Ok(status)
    }

    /// Converts column `column` of the current row into a host value.
    ///
    /// Values longer than their scratch buffer are re-read in full from the
    /// statement.
    pub fn value<S: StatementHandle>(&self, statement: &mut S, column: usize) -> Result<Value> {
        let cell = self.cells.get(column).ok_or_else(|| {
            RowsetError::internal(format!("no output binding for column {column}"))
        })?;
        if cell.is_null {
            return Ok(Value::Null);
        }

        let value = match &cell.data {
            CellData::Int32(i) => Value::Int(i64::from(*i)),
            CellData::Int64(i) => Value::Int(*i),
            CellData::Double(f) => Value::Float(*f),
            CellData::Logical(b) => Value::Bool(*b),
            CellData::Date(d) => Value::Date(*d),
            CellData::DateTime(dt) => Value::DateTime(*dt),
            CellData::Time(t) => Value::Time(*t),
            CellData::Bytes(buf) => {
                let bytes = if cell.length > buf.len() {
                    trace!(column, length = cell.length, "Re-reading truncated column");
                    let mut full = vec![0; cell.length];
                    let n = statement.fetch_column(column, &mut full)?;
                    full.truncate(n);
                    full
                } else {
                    buf[..cell.length].to_vec()
                };

                match cell.kind {
                    SemanticType::Blob => Value::Bytes(bytes),
                    _ => Value::String(String::from_utf8(bytes).map_err(|e| {
                        RowsetError::conversion(format!(
                            "column {} is not valid UTF-8: {e}",
                            column + 1
                        ))
                    })?),
                }
            }
        };
        Ok(value)
    }

    /// Stores column `column` of the current row at `row` in `table`.
    pub fn set_list_value<S: StatementHandle, M: Materializer>(
        &self,
        statement: &mut S,
        materializer: &M,
        table: &mut M::Table,
        row: usize,
        column: usize,
    ) -> Result<()> {
        let value = self.value(statement, column)?;
        materializer.set_value(table, row, column, value)
    }
}
