//! Driver abstraction layer for db-rowset.
//!
//! Provides the trait-based interface to a server's prepared-statement
//! protocol. The result core only talks to these traits, so any backend
//! that can prepare, execute and fetch can be driven by it.

pub mod memory;
mod types;
mod wire;

pub use memory::MemoryServer;
pub use types::Value;
pub use wire::{CellData, FetchStatus, FieldDescriptor, OutputCell, ResultMetadata};

use crate::error::Result;
use crate::types::SemanticType;

/// A connection-level driver: the socket and session owner.
pub trait Driver {
    /// The statement handle type this driver produces.
    type Statement: StatementHandle;

    /// Allocates a fresh, unprepared statement handle.
    fn init_statement(&self) -> Result<Self::Statement>;

    /// Restores autocommit mode on the session. Called whenever a result's
    /// statement lifetime ends.
    fn autocommit(&self) -> Result<()>;
}

/// A server-side prepared statement handle.
///
/// Methods follow the binary prepared-statement protocol: prepare once,
/// bind parameters, execute, optionally buffer the result client-side,
/// then fetch rows into bound output cells.
pub trait StatementHandle {
    /// Prepares SQL text on the server.
    fn prepare(&mut self, sql: &str) -> Result<()>;

    /// Number of `?` placeholders in the prepared statement.
    fn param_count(&self) -> usize;

    /// Describes the result columns, or None if the statement returns no rows.
    fn result_metadata(&self) -> Option<ResultMetadata>;

    /// Binds one row of parameter values. `params.len()` must equal
    /// `param_count()`.
    fn bind_params(&mut self, params: &[Value]) -> Result<()>;

    /// Drops any bound parameters.
    fn clear_params(&mut self);

    /// Executes the statement against the currently bound parameters.
    /// Invalidates result bindings.
    fn execute(&mut self) -> Result<()>;

    /// Buffers the whole result of the last execution on the client side.
    fn store_result(&mut self) -> Result<()>;

    /// Rows changed by the last execution.
    fn affected_rows(&self) -> u64;

    /// Declares the output cell layout for subsequent fetches.
    fn bind_result(&mut self, kinds: &[SemanticType]) -> Result<()>;

    /// Fetches the next row into `cells`.
    fn fetch(&mut self, cells: &mut [OutputCell]) -> Result<FetchStatus>;

    /// Reads the full value of one column of the current row into `buf`.
    /// `buf` must be sized to the length the fetch reported. Returns the
    /// number of bytes written.
    fn fetch_column(&mut self, column: usize, buf: &mut [u8]) -> Result<usize>;

    /// Releases the statement on the server. Further calls fail.
    fn close(&mut self) -> Result<()>;
}
