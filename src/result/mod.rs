//! Prepared-statement result sets.
//!
//! A `ResultSet` owns one server-side statement for its whole life and
//! drives it through prepare, bind, execute and fetch. Result-producing
//! statements bound to a parameter batch are executed lazily: each
//! parameter row is bound and executed only once the rows of the previous
//! execution have been consumed.

pub mod frame;
pub mod input;
pub mod metadata;
pub mod output;

pub use frame::{ColumnData, FrameMaterializer, Materializer, ResultFrame};
pub use input::{InputBinder, ParameterBatch};
pub use metadata::ColumnSpec;
pub use output::OutputBinder;

use std::rc::Rc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::FetchConfig;
use crate::connection::{Connection, ResultId};
use crate::db::{Driver, FetchStatus, StatementHandle};
use crate::error::{Result, RowsetError, Warning};

/// Position of the current execution's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cursor {
    /// Parameters are bound but the next execution has not run yet.
    Pending,
    /// An execution produced rows that have not all been fetched.
    Open,
    /// The current execution has no more rows.
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Created,
    Prepared,
    Bound(Cursor),
    Closed,
}

/// The result of a statement sent on a `Connection`.
pub struct ResultSet<D: Driver> {
    conn: Rc<Connection<D>>,
    id: ResultId,
    statement: Option<D::Statement>,
    spec: ColumnSpec,
    param_count: usize,
    input: InputBinder,
    output: OutputBinder,
    state: State,
    rows_affected: u64,
    rows_fetched: u64,
    config: FetchConfig,
    interrupt: Option<CancellationToken>,
    warnings: Vec<Warning>,
}

impl<D: Driver> ResultSet<D> {
    /// Allocates a statement on `conn`, makes this result the connection's
    /// current one and sends `sql`.
    pub fn new(conn: Rc<Connection<D>>, sql: &str) -> Result<Self> {
        let statement = conn.init_statement().map_err(|e| match e {
            RowsetError::Resource(_) => e,
            other => RowsetError::resource(other.to_string()),
        })?;
        let id = conn.allocate_result_id();
        conn.set_current_result(Some(id));

        let config = conn.config().clone();
        let mut result = Self {
            conn,
            id,
            statement: Some(statement),
            spec: ColumnSpec::default(),
            param_count: 0,
            input: InputBinder::new(),
            output: OutputBinder::new(),
            state: State::Created,
            rows_affected: 0,
            rows_fetched: 0,
            config,
            interrupt: None,
            warnings: Vec::new(),
        };

        // On failure `result` is dropped here, which closes the statement.
        result.send_query(sql)?;
        Ok(result)
    }

    fn send_query(&mut self, sql: &str) -> Result<()> {
        debug!(result = %self.id, sql, "Sending query");
        let statement = self.statement_mut()?;
        statement.prepare(sql)?;
        let param_count = statement.param_count();
        let metadata = statement.result_metadata();
        debug!(params = param_count, "Prepared statement");

        self.param_count = param_count;
        self.state = State::Prepared;

        if let Some(metadata) = metadata {
            self.spec = ColumnSpec::capture(&metadata);
            let scratch_len = self.config.scratch_len;
            let types = self.spec.types().to_vec();
            let statement = self
                .statement
                .as_mut()
                .ok_or_else(|| RowsetError::internal("statement released during prepare"))?;
            self.output.setup(statement, &types, scratch_len)?;
        }

        if param_count == 0 {
            self.execute()?;
            self.state = State::Bound(Cursor::Open);
        }
        Ok(())
    }

    fn statement_mut(&mut self) -> Result<&mut D::Statement> {
        self.statement
            .as_mut()
            .ok_or_else(|| RowsetError::usage("Result set has been closed"))
    }

    /// Executes against the current parameter bindings.
    fn execute(&mut self) -> Result<()> {
        let has_result = self.has_result();
        let statement = self.statement_mut()?;
        statement.execute()?;
        if has_result {
            statement.store_result()?;
        } else {
            let affected = statement.affected_rows();
            self.rows_affected += affected;
        }
        trace!(result = %self.id, rows_affected = self.rows_affected, "Executed statement");
        self.set_cursor(Cursor::Open);
        Ok(())
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        if let State::Bound(_) = self.state {
            self.state = State::Bound(cursor);
        }
    }

    fn cursor(&self) -> Option<Cursor> {
        match self.state {
            State::Bound(cursor) => Some(cursor),
            _ => None,
        }
    }

    /// Binds a parameter batch.
    ///
    /// Statements without a result run once per parameter row before this
    /// returns. Result-producing statements run lazily as rows are fetched.
    pub fn bind(&mut self, batch: ParameterBatch) -> Result<()> {
        if self.state == State::Closed {
            return Err(RowsetError::usage("Result set has been closed"));
        }
        debug!(result = %self.id, rows = batch.n_rows(), "Binding parameters");

        self.rows_affected = 0;
        self.input.setup(self.param_count);
        self.input.init_binding(batch)?;

        if self.has_result() {
            self.state = State::Bound(Cursor::Pending);
        } else {
            self.state = State::Bound(Cursor::Open);
            loop {
                let statement = self
                    .statement
                    .as_mut()
                    .ok_or_else(|| RowsetError::usage("Result set has been closed"))?;
                if !self.input.bind_next_row(statement)? {
                    break;
                }
                self.execute()?;
            }
            self.state = State::Bound(Cursor::Exhausted);
        }
        Ok(())
    }

    /// Advances to the next row, executing against the next parameter row
    /// whenever the current execution runs out. Returns false once every
    /// execution is exhausted.
    pub fn step(&mut self) -> Result<bool> {
        match self.state {
            State::Closed => return Err(RowsetError::usage("Result set has been closed")),
            State::Bound(_) => {}
            _ => return Err(RowsetError::usage("Query needs to be bound before fetching")),
        }

        while !self.fetch_row()? {
            let statement = self
                .statement
                .as_mut()
                .ok_or_else(|| RowsetError::usage("Result set has been closed"))?;
            if !self.input.bind_next_row(statement)? {
                self.set_cursor(Cursor::Exhausted);
                return Ok(false);
            }
            self.execute()?;
        }

        self.rows_fetched += 1;
        Ok(true)
    }

    fn fetch_row(&mut self) -> Result<bool> {
        if self.cursor() != Some(Cursor::Open) || !self.has_result() {
            return Ok(false);
        }

        let statement = self
            .statement
            .as_mut()
            .ok_or_else(|| RowsetError::usage("Result set has been closed"))?;
        match self.output.fetch(statement)? {
            FetchStatus::Row | FetchStatus::Truncated => Ok(true),
            FetchStatus::NoData => {
                self.set_cursor(Cursor::Exhausted);
                Ok(false)
            }
        }
    }

    /// Fetches up to `max_rows` rows (all remaining rows if `None`) into a
    /// `ResultFrame`.
    pub fn fetch(&mut self, max_rows: Option<usize>) -> Result<ResultFrame> {
        self.fetch_with(&FrameMaterializer, max_rows)
    }

    /// Fetches up to `max_rows` rows into a container built by `materializer`.
    pub fn fetch_with<M: Materializer>(
        &mut self,
        materializer: &M,
        max_rows: Option<usize>,
    ) -> Result<M::Table> {
        match self.state {
            State::Closed => return Err(RowsetError::usage("Result set has been closed")),
            State::Bound(_) => {}
            _ => return Err(RowsetError::usage("Query needs to be bound before fetching")),
        }
        if !self.active() {
            return Err(RowsetError::usage("Inactive result set"));
        }

        let types = self.spec.types().to_vec();
        let names = self.spec.names().to_vec();

        if !self.has_result() {
            let warning = Warning::NoResultSet;
            warn!(result = %self.id, "{warning}");
            self.warnings.push(warning);
            return Ok(materializer.create(&types, &names, 0));
        }

        let initial = self.config.initial_capacity.max(1);
        let mut capacity = max_rows.map_or(initial, |max| max.min(initial));
        let mut table = materializer.create(&types, &names, capacity);
        if capacity == 0 {
            return Ok(table);
        }

        let interval = self.config.interrupt_interval.max(1);
        let mut rows = 0;
        loop {
            if max_rows.is_some_and(|max| rows >= max) {
                break;
            }
            if !self.step()? {
                break;
            }

            if rows >= capacity {
                capacity = capacity.saturating_mul(2);
                if let Some(max) = max_rows {
                    capacity = capacity.min(max);
                }
                trace!(capacity, "Growing result table");
                table = materializer.resize(table, capacity);
            }

            let statement = self
                .statement
                .as_mut()
                .ok_or_else(|| RowsetError::usage("Result set has been closed"))?;
            for column in 0..types.len() {
                self.output
                    .set_list_value(statement, materializer, &mut table, rows, column)?;
            }

            rows += 1;
            if rows % interval == 0 && self.interrupted() {
                info!(result = %self.id, rows, "Fetch interrupted");
                break;
            }
        }

        if rows < capacity {
            table = materializer.resize(table, rows);
        }
        Ok(materializer.apply_result_class_attributes(table, &types))
    }

    fn interrupted(&self) -> bool {
        self.interrupt
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Installs a token that stops a running fetch when cancelled.
    pub fn set_interrupt(&mut self, token: CancellationToken) {
        self.interrupt = Some(token);
    }

    /// Releases the statement and restores autocommit. Safe to call more
    /// than once; failures are logged, never returned.
    pub fn close(&mut self) {
        if self.state == State::Closed {
            return;
        }
        self.state = State::Closed;

        if let Some(mut statement) = self.statement.take() {
            if let Err(e) = statement.close() {
                warn!(result = %self.id, error = %e, "Failed to close statement");
            }
        }
        if let Err(e) = self.conn.autocommit() {
            warn!(result = %self.id, error = %e, "Failed to restore autocommit");
        }
        debug!(result = %self.id, "Closed result");
    }

    /// Rows changed by the bound executions, or `None` before binding.
    pub fn rows_affected(&self) -> Option<u64> {
        self.is_bound().then_some(self.rows_affected)
    }

    /// Rows fetched so far, or `None` before binding.
    pub fn rows_fetched(&self) -> Option<u64> {
        self.is_bound().then_some(self.rows_fetched)
    }

    /// True once every row of every execution has been fetched.
    pub fn complete(&self) -> bool {
        match self.state {
            State::Bound(cursor) => !self.has_result() || cursor == Cursor::Exhausted,
            _ => false,
        }
    }

    fn is_bound(&self) -> bool {
        matches!(self.state, State::Bound(_))
    }

    /// True while this is the connection's current result.
    pub fn active(&self) -> bool {
        self.conn.is_current_result(self.id)
    }

    pub fn is_closed(&self) -> bool {
        self.state == State::Closed
    }

    pub fn id(&self) -> ResultId {
        self.id
    }

    /// True if the statement produces rows.
    pub fn has_result(&self) -> bool {
        !self.spec.is_empty()
    }

    /// Number of `?` placeholders in the statement.
    pub fn param_count(&self) -> usize {
        self.param_count
    }

    pub fn column_spec(&self) -> &ColumnSpec {
        &self.spec
    }

    /// One row per result column with its `name` and `type`.
    pub fn column_info(&self) -> ResultFrame {
        let names = self.spec.names().to_vec();
        let types = self
            .spec
            .types()
            .iter()
            .map(|kind| kind.type_name().to_string())
            .collect();
        ResultFrame::from_strings(&["name", "type"], vec![names, types])
    }

    /// Drains the warnings raised so far.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

impl<D: Driver> Drop for ResultSet<D> {
    fn drop(&mut self) {
        self.conn.release_result(self.id);
        self.close();
    }
}

impl<D: Driver> std::fmt::Debug for ResultSet<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("spec", &self.spec)
            .field("param_count", &self.param_count)
            .field("rows_affected", &self.rows_affected)
            .field("rows_fetched", &self.rows_fetched)
            .finish_non_exhaustive()
    }
}
