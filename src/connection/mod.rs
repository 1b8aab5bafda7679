//! Connection wrapper for db-rowset.
//!
//! Owns the driver, the fetch configuration handed to results, and the
//! registry of the one result the connection currently recognizes.

pub mod registry;

pub use registry::{ResultId, ResultRegistry};

use std::rc::Rc;

use tracing::debug;

use crate::config::FetchConfig;
use crate::db::Driver;
use crate::error::Result;
use crate::result::{ParameterBatch, ResultSet};

/// A database connection shared by the results created on it.
#[derive(Debug)]
pub struct Connection<D: Driver> {
    driver: D,
    config: FetchConfig,
    registry: ResultRegistry,
}

impl<D: Driver> Connection<D> {
    /// Wraps a driver with the default fetch configuration.
    pub fn new(driver: D) -> Rc<Self> {
        Self::with_config(driver, FetchConfig::default())
    }

    /// Wraps a driver with an explicit fetch configuration.
    pub fn with_config(driver: D, config: FetchConfig) -> Rc<Self> {
        Rc::new(Self {
            driver,
            config,
            registry: ResultRegistry::new(),
        })
    }

    /// Returns the underlying driver.
    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Returns the fetch configuration used by new results.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Allocates a raw statement handle.
    pub fn init_statement(&self) -> Result<D::Statement> {
        self.driver.init_statement()
    }

    /// Allocates an identifier for a new result.
    pub(crate) fn allocate_result_id(&self) -> ResultId {
        self.registry.allocate()
    }

    /// Makes `id` the active result, deactivating any previous one.
    pub fn set_current_result(&self, id: Option<ResultId>) {
        debug!(result = ?id, "Setting current result");
        self.registry.set_current(id);
    }

    /// Clears the active result if it is `id`.
    pub(crate) fn release_result(&self, id: ResultId) {
        self.registry.release(id);
    }

    /// Returns true if `id` is the active result.
    pub fn is_current_result(&self, id: ResultId) -> bool {
        self.registry.is_current(id)
    }

    /// Returns the active result, if any.
    pub fn current_result(&self) -> Option<ResultId> {
        self.registry.current()
    }

    /// Restores autocommit on the session.
    pub fn autocommit(&self) -> Result<()> {
        self.driver.autocommit()
    }

    /// Prepares `sql` and returns the result set that drives it.
    pub fn send_query(conn: &Rc<Self>, sql: &str) -> Result<ResultSet<D>> {
        ResultSet::new(Rc::clone(conn), sql)
    }

    /// Runs a statement once per parameter row and returns the total number
    /// of affected rows.
    ///
    /// A parameter-free statement already ran when it was sent, so an empty
    /// batch does not run it a second time.
    pub fn execute(conn: &Rc<Self>, sql: &str, batch: ParameterBatch) -> Result<u64> {
        let mut result = Self::send_query(conn, sql)?;
        if result.param_count() > 0 || !batch.is_empty() {
            result.bind(batch)?;
        }
        Ok(result.rows_affected().unwrap_or(0))
    }
}
