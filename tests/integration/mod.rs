//! Integration tests for db-rowset.

pub mod active_test;
pub mod binding_test;
pub mod fetch_test;
pub mod lifecycle_test;
pub mod script_test;
pub mod types_test;

use std::rc::Rc;

use db_rowset::{Connection, MemoryServer, ParameterBatch, Value};

/// Creates a connection with a `people` table holding `n` rows.
pub fn connection_with_people(n: i64) -> Rc<Connection<MemoryServer>> {
    let conn = Connection::new(MemoryServer::new());
    Connection::execute(
        &conn,
        "CREATE TABLE people (id BIGINT, name VARCHAR(40), score DOUBLE)",
        ParameterBatch::empty(),
    )
    .unwrap();

    if n > 0 {
        let ids: Vec<Value> = (1..=n).map(Value::from).collect();
        let names: Vec<Value> = (1..=n).map(|i| Value::from(format!("person {i}"))).collect();
        let scores: Vec<Value> = (1..=n).map(|i| Value::from(i as f64 / 2.0)).collect();
        Connection::execute(
            &conn,
            "INSERT INTO people VALUES (?, ?, ?)",
            ParameterBatch::from_columns(vec![ids, names, scores]),
        )
        .unwrap();
    }
    conn
}
