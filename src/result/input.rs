//! Parameter batches and the binder that feeds them to a statement row by row.

use tracing::trace;

use crate::db::{StatementHandle, Value};
use crate::error::{Result, RowsetError};

/// Column-major parameter values: one column per placeholder.
///
/// A batch with no columns stands for a single empty row, which is what a
/// parameter-free statement executes against.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterBatch {
    columns: Vec<Vec<Value>>,
}

impl ParameterBatch {
    /// A batch with no parameter columns.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a batch from parameter columns.
    pub fn from_columns(columns: Vec<Vec<Value>>) -> Self {
        Self { columns }
    }

    /// Builds a batch from parameter rows, transposing them into columns.
    ///
    /// All rows must have the same width. An empty row list yields an empty
    /// batch.
    pub fn from_rows(rows: Vec<Vec<Value>>) -> Result<Self> {
        let Some(width) = rows.first().map(Vec::len) else {
            return Ok(Self::empty());
        };

        let mut columns: Vec<Vec<Value>> = (0..width)
            .map(|_| Vec::with_capacity(rows.len()))
            .collect();
        for (index, row) in rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(RowsetError::usage(format!(
                    "Parameter row {} has {} values, expected {width}",
                    index + 1,
                    row.len()
                )));
            }
            for (column, value) in columns.iter_mut().zip(row) {
                column.push(value);
            }
        }

        Ok(Self { columns })
    }

    /// Number of parameter columns.
    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    /// Number of parameter rows.
    pub fn n_rows(&self) -> usize {
        self.columns.first().map_or(1, Vec::len)
    }

    /// True when the batch has no parameter columns.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    fn row(&self, index: usize) -> Vec<Value> {
        self.columns
            .iter()
            .map(|column| column[index].clone())
            .collect()
    }
}

/// Walks a `ParameterBatch` forward, binding one row per call.
#[derive(Debug, Default)]
pub struct InputBinder {
    param_count: usize,
    batch: ParameterBatch,
    rows: usize,
    next_row: usize,
}

impl InputBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records how many placeholders the statement has.
    pub fn setup(&mut self, param_count: usize) {
        self.param_count = param_count;
        self.batch = ParameterBatch::empty();
        self.rows = 0;
        self.next_row = 0;
    }

    /// Validates `batch` against the statement and rewinds to its first row.
    pub fn init_binding(&mut self, batch: ParameterBatch) -> Result<()> {
        if batch.n_columns() != self.param_count {
            return Err(RowsetError::usage(format!(
                "Number of params don't match ({} vs {})",
                batch.n_columns(),
                self.param_count
            )));
        }

        let rows = batch.n_rows();
        if batch.columns.iter().any(|column| column.len() != rows) {
            return Err(RowsetError::usage(
                "All parameter columns must have the same length",
            ));
        }

        self.batch = batch;
        self.rows = rows;
        self.next_row = 0;
        Ok(())
    }

    /// Binds the next parameter row. Returns false once every row has been
    /// consumed, after clearing the statement's parameter bindings.
    pub fn bind_next_row<S: StatementHandle>(&mut self, statement: &mut S) -> Result<bool> {
        if self.next_row >= self.rows {
            statement.clear_params();
            return Ok(false);
        }

        if self.param_count > 0 {
            statement.bind_params(&self.batch.row(self.next_row))?;
        }
        trace!(row = self.next_row, "Bound parameter row");
        self.next_row += 1;
        Ok(true)
    }
}
