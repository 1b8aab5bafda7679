//! In-memory database server.
//!
//! Implements the driver traits against an in-process catalog so the result
//! core can be exercised without a network server. Statements behave like a
//! binary-protocol server's: metadata is fixed at prepare time, executions
//! drop result bindings, long values are truncated to the bound buffer and
//! must be re-read with `fetch_column`.

mod catalog;
mod exec;
mod parser;

use std::cell::RefCell;
use std::rc::Rc;

use tracing::{debug, trace};

use super::{Driver, FetchStatus, OutputCell, ResultMetadata, StatementHandle, Value};
use crate::error::{Result, RowsetError};
use crate::types::SemanticType;
use exec::{Outcome, Plan};

/// Server and client error codes reported by the in-memory server.
pub mod codes {
    pub const ER_TABLE_EXISTS_ERROR: u32 = 1050;
    pub const ER_BAD_TABLE_ERROR: u32 = 1051;
    pub const ER_BAD_FIELD_ERROR: u32 = 1054;
    pub const ER_PARSE_ERROR: u32 = 1064;
    pub const ER_NO_TABLES_USED: u32 = 1096;
    pub const ER_WRONG_VALUE_COUNT_ON_ROW: u32 = 1136;
    pub const ER_NO_SUCH_TABLE: u32 = 1146;
    pub const ER_NOT_SUPPORTED_YET: u32 = 1235;
    pub const ER_TRUNCATED_WRONG_VALUE_FOR_FIELD: u32 = 1366;
    pub const ER_PS_REBIND: u32 = 1615;
    pub const CR_COMMANDS_OUT_OF_SYNC: u32 = 2014;
    pub const CR_NO_PREPARE_STMT: u32 = 2030;
    pub const CR_PARAMS_NOT_BOUND: u32 = 2031;
    pub const CR_INVALID_PARAMETER_NO: u32 = 2034;
    pub const CR_NO_DATA: u32 = 2051;
    pub const CR_NO_RESULT_SET: u32 = 2053;
}

#[derive(Debug, Default)]
struct ServerState {
    catalog: catalog::Catalog,
    open_statements: usize,
    statement_limit: Option<usize>,
    autocommit_calls: usize,
    fetch_error: Option<(String, u32)>,
}

/// An in-process server. Clones share the same catalog.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    state: Rc<RefCell<ServerState>>,
}

impl MemoryServer {
    /// Creates an empty server.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a server that refuses to allocate more than `limit` open
    /// statements.
    pub fn with_statement_limit(limit: usize) -> Self {
        let server = Self::new();
        server.state.borrow_mut().statement_limit = Some(limit);
        server
    }

    /// Makes the next row fetch on any statement fail with the given error.
    pub fn inject_fetch_error(&self, message: impl Into<String>, code: u32) {
        self.state.borrow_mut().fetch_error = Some((message.into(), code));
    }

    /// Number of times autocommit has been restored.
    pub fn autocommit_calls(&self) -> usize {
        self.state.borrow().autocommit_calls
    }

    /// Number of statement handles currently allocated.
    pub fn open_statements(&self) -> usize {
        self.state.borrow().open_statements
    }

    /// Names of all tables, sorted.
    pub fn table_names(&self) -> Vec<String> {
        self.state.borrow().catalog.table_names()
    }

    /// Number of rows stored in `table`, if it exists.
    pub fn row_count(&self, table: &str) -> Option<usize> {
        self.state
            .borrow()
            .catalog
            .table(table)
            .ok()
            .map(|t| t.rows.len())
    }

    fn release_statement(&self) {
        let mut state = self.state.borrow_mut();
        state.open_statements = state.open_statements.saturating_sub(1);
    }
}

impl Driver for MemoryServer {
    type Statement = MemoryStatement;

    fn init_statement(&self) -> Result<MemoryStatement> {
        let mut state = self.state.borrow_mut();
        if let Some(limit) = state.statement_limit {
            if state.open_statements >= limit {
                return Err(RowsetError::resource("Out of memory"));
            }
        }
        state.open_statements += 1;
        drop(state);

        Ok(MemoryStatement::new(self.clone()))
    }

    fn autocommit(&self) -> Result<()> {
        self.state.borrow_mut().autocommit_calls += 1;
        Ok(())
    }
}

#[derive(Debug)]
struct Prepared {
    plan: Plan,
    param_count: usize,
    metadata: Option<ResultMetadata>,
}

#[derive(Debug)]
struct PendingResult {
    rows: Vec<Vec<Value>>,
    next: usize,
    current: Option<usize>,
    stored: bool,
}

/// A prepared statement on a `MemoryServer`.
#[derive(Debug)]
pub struct MemoryStatement {
    server: MemoryServer,
    prepared: Option<Prepared>,
    params: Option<Vec<Value>>,
    result: Option<PendingResult>,
    result_kinds: Option<Vec<SemanticType>>,
    affected: u64,
    closed: bool,
}

impl MemoryStatement {
    fn new(server: MemoryServer) -> Self {
        Self {
            server,
            prepared: None,
            params: None,
            result: None,
            result_kinds: None,
            affected: 0,
            closed: false,
        }
    }

    fn prepared(&self) -> Result<&Prepared> {
        if self.closed {
            return Err(RowsetError::server(
                "Statement has been closed",
                codes::CR_NO_PREPARE_STMT,
            ));
        }
        self.prepared.as_ref().ok_or_else(|| {
            RowsetError::server("Statement not prepared", codes::CR_NO_PREPARE_STMT)
        })
    }

    fn result_mut(&mut self) -> Result<&mut PendingResult> {
        self.result.as_mut().ok_or_else(|| {
            RowsetError::server(
                "Attempt to read a row while there is no result set associated with the statement",
                codes::CR_NO_RESULT_SET,
            )
        })
    }
}

impl StatementHandle for MemoryStatement {
    fn prepare(&mut self, sql: &str) -> Result<()> {
        if self.closed {
            return Err(RowsetError::server(
                "Statement has been closed",
                codes::CR_NO_PREPARE_STMT,
            ));
        }

        let parsed = parser::parse(sql)?;
        let (plan, metadata) = exec::plan(parsed.command, &self.server.state.borrow().catalog)?;
        debug!(
            params = parsed.param_count,
            columns = metadata.as_ref().map_or(0, |m| m.num_fields()),
            "Prepared statement"
        );

        self.prepared = Some(Prepared {
            plan,
            param_count: parsed.param_count,
            metadata,
        });
        self.params = None;
        self.result = None;
        self.result_kinds = None;
        self.affected = 0;
        Ok(())
    }

    fn param_count(&self) -> usize {
        self.prepared.as_ref().map_or(0, |p| p.param_count)
    }

    fn result_metadata(&self) -> Option<ResultMetadata> {
        self.prepared.as_ref().and_then(|p| p.metadata.clone())
    }

    fn bind_params(&mut self, params: &[Value]) -> Result<()> {
        let expected = self.prepared()?.param_count;
        if params.len() != expected {
            return Err(RowsetError::server(
                format!(
                    "Invalid parameter number: expected {expected}, got {}",
                    params.len()
                ),
                codes::CR_INVALID_PARAMETER_NO,
            ));
        }
        self.params = Some(params.to_vec());
        Ok(())
    }

    fn clear_params(&mut self) {
        self.params = None;
    }

    fn execute(&mut self) -> Result<()> {
        let prepared = self.prepared()?;
        let params: &[Value] = match (&self.params, prepared.param_count) {
            (_, 0) => &[],
            (Some(params), _) => params,
            (None, _) => {
                return Err(RowsetError::server(
                    "No data supplied for parameters in prepared statement",
                    codes::CR_PARAMS_NOT_BOUND,
                ))
            }
        };

        let outcome = exec::execute(
            &prepared.plan,
            params,
            &mut self.server.state.borrow_mut().catalog,
        )?;

        self.result_kinds = None;
        match outcome {
            Outcome::Rows(rows) => {
                trace!(rows = rows.len(), "Execution produced rows");
                self.affected = 0;
                self.result = Some(PendingResult {
                    rows,
                    next: 0,
                    current: None,
                    stored: false,
                });
            }
            Outcome::Affected(n) => {
                trace!(affected = n, "Execution changed rows");
                self.affected = n;
                self.result = None;
            }
        }
        Ok(())
    }

    fn store_result(&mut self) -> Result<()> {
        self.prepared()?;
        if let Some(result) = self.result.as_mut() {
            result.stored = true;
            self.affected = result.rows.len() as u64;
        }
        Ok(())
    }

    fn affected_rows(&self) -> u64 {
        self.affected
    }

    fn bind_result(&mut self, kinds: &[SemanticType]) -> Result<()> {
        let columns = self
            .prepared()?
            .metadata
            .as_ref()
            .map(|m| m.num_fields())
            .ok_or_else(|| {
                RowsetError::server(
                    "Statement does not return a result set",
                    codes::CR_NO_RESULT_SET,
                )
            })?;
        if kinds.len() != columns {
            return Err(RowsetError::server(
                format!(
                    "Invalid result binding: {} buffers for {columns} columns",
                    kinds.len()
                ),
                codes::CR_INVALID_PARAMETER_NO,
            ));
        }
        self.result_kinds = Some(kinds.to_vec());
        Ok(())
    }

    fn fetch(&mut self, cells: &mut [OutputCell]) -> Result<FetchStatus> {
        self.prepared()?;
        if let Some((message, code)) = self.server.state.borrow_mut().fetch_error.take() {
            return Err(RowsetError::server(message, code));
        }

        let kinds_len = match &self.result_kinds {
            Some(kinds) => kinds.len(),
            None => {
                return Err(RowsetError::server(
                    "Commands out of sync; you can't run this command now",
                    codes::CR_COMMANDS_OUT_OF_SYNC,
                ))
            }
        };
        if cells.len() != kinds_len {
            return Err(RowsetError::server(
                format!("Fetch into {} cells, {kinds_len} bound", cells.len()),
                codes::CR_INVALID_PARAMETER_NO,
            ));
        }

        let result = self.result_mut()?;
        let Some(row) = result.rows.get(result.next) else {
            result.current = None;
            return Ok(FetchStatus::NoData);
        };

        let mut truncated = false;
        for (cell, value) in cells.iter_mut().zip(row) {
            truncated |= cell.fill(value)?;
        }
        result.current = Some(result.next);
        result.next += 1;

        Ok(if truncated {
            FetchStatus::Truncated
        } else {
            FetchStatus::Row
        })
    }

    fn fetch_column(&mut self, column: usize, buf: &mut [u8]) -> Result<usize> {
        self.prepared()?;
        let result = self.result_mut()?;
        if !result.stored {
            return Err(RowsetError::server(
                "Commands out of sync; you can't run this command now",
                codes::CR_COMMANDS_OUT_OF_SYNC,
            ));
        }
        let row = result
            .current
            .and_then(|index| result.rows.get(index))
            .ok_or_else(|| {
                RowsetError::server(
                    "Attempt to read column without prior row fetch",
                    codes::CR_NO_DATA,
                )
            })?;
        let value = row.get(column).ok_or_else(|| {
            RowsetError::server(
                format!("Invalid column number {column}"),
                codes::CR_INVALID_PARAMETER_NO,
            )
        })?;

        let bytes = value.to_wire_bytes().unwrap_or_default();
        let n = bytes.len().min(buf.len());
        buf[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Err(RowsetError::server(
                "Statement has already been closed",
                codes::CR_NO_PREPARE_STMT,
            ));
        }
        self.closed = true;
        self.prepared = None;
        self.result = None;
        self.server.release_statement();
        Ok(())
    }
}

impl Drop for MemoryStatement {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            self.server.release_statement();
        }
    }
}
