//! db-rowset - prepared-statement result sets over a binary row protocol.
//!
//! The library exposes the result core and the in-memory server used by the
//! `rowset` binary and the integration tests.

pub mod cli;
pub mod config;
pub mod connection;
pub mod db;
pub mod error;
pub mod logging;
pub mod result;
pub mod script;
pub mod types;

pub use connection::{Connection, ResultId};
pub use db::{Driver, MemoryServer, StatementHandle, Value};
pub use error::{Result, RowsetError, Warning};
pub use result::{FrameMaterializer, Materializer, ParameterBatch, ResultFrame, ResultSet};
pub use types::{classify, SemanticType};
