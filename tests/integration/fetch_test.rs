//! Row fetching integration tests.
//!
//! Tests buffer growth, row limits, interruption and custom materializers.

use std::cell::RefCell;

use db_rowset::config::FetchConfig;
use db_rowset::types::SemanticType;
use db_rowset::{Connection, Materializer, MemoryServer, ParameterBatch, Result, Value};
use pretty_assertions::assert_eq;
use tokio_util::sync::CancellationToken;

use super::connection_with_people;

#[test]
fn test_zero_param_bind_matches_send() {
    let conn = connection_with_people(5);

    let mut sent = Connection::send_query(&conn, "SELECT id, name FROM people ORDER BY id").unwrap();
    let expected = sent.fetch(None).unwrap();
    drop(sent);

    let mut bound = Connection::send_query(&conn, "SELECT id, name FROM people ORDER BY id").unwrap();
    bound.bind(ParameterBatch::empty()).unwrap();
    let actual = bound.fetch(None).unwrap();

    assert_eq!(actual, expected);
    assert_eq!(actual.row_count(), 5);
}

#[test]
fn test_unbounded_fetch_grows_past_initial_capacity() {
    let conn = connection_with_people(0);
    let values: Vec<Value> = (0..257).map(Value::from).collect();
    Connection::execute(
        &conn,
        "INSERT INTO people (id) VALUES (?)",
        ParameterBatch::from_columns(vec![values]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    let frame = result.fetch(None).unwrap();

    // Default capacity is 100, so the table doubled twice before trimming.
    assert_eq!(frame.row_count(), 257);
    assert_eq!(frame.row(256), vec![Value::Int(256)]);
    assert_eq!(result.rows_fetched(), Some(257));
    assert!(result.complete());
}

#[test]
fn test_small_initial_capacity() {
    let conn = Connection::with_config(
        MemoryServer::new(),
        FetchConfig {
            initial_capacity: 1,
            ..FetchConfig::default()
        },
    );
    Connection::execute(&conn, "CREATE TABLE t (v INT)", ParameterBatch::empty()).unwrap();
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?)",
        ParameterBatch::from_columns(vec![vec![1.into(), 2.into(), 3.into()]]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT v FROM t").unwrap();
    assert_eq!(result.fetch(None).unwrap().row_count(), 3);
}

#[test]
fn test_fetch_in_pages() {
    let conn = connection_with_people(7);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people ORDER BY id").unwrap();

    let mut pages = Vec::new();
    while !result.complete() {
        pages.push(result.fetch(Some(3)).unwrap().row_count());
    }

    assert_eq!(pages, vec![3, 3, 1]);
    assert_eq!(result.rows_fetched(), Some(7));
}

#[test]
fn test_exact_page_boundary_needs_one_more_fetch() {
    let conn = connection_with_people(4);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people").unwrap();

    assert_eq!(result.fetch(Some(4)).unwrap().row_count(), 4);
    assert!(!result.complete());
    assert_eq!(result.fetch(Some(4)).unwrap().row_count(), 0);
    assert!(result.complete());
}

#[test]
fn test_fetch_after_complete_is_empty() {
    let conn = connection_with_people(2);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    result.fetch(None).unwrap();

    let again = result.fetch(None).unwrap();
    assert_eq!(again.row_count(), 0);
    assert_eq!(again.names(), &["id"]);
}

#[test]
fn test_interrupt_returns_partial_rows() {
    let conn = Connection::with_config(
        MemoryServer::new(),
        FetchConfig {
            interrupt_interval: 10,
            ..FetchConfig::default()
        },
    );
    Connection::execute(&conn, "CREATE TABLE t (v INT)", ParameterBatch::empty()).unwrap();
    let values: Vec<Value> = (0..25).map(Value::from).collect();
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?)",
        ParameterBatch::from_columns(vec![values]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT v FROM t").unwrap();
    let token = CancellationToken::new();
    result.set_interrupt(token.clone());
    token.cancel();

    let partial = result.fetch(None).unwrap();
    assert_eq!(partial.row_count(), 10);
    assert!(!result.complete());

    // A fresh token lets the rest through.
    result.set_interrupt(CancellationToken::new());
    let rest = result.fetch(None).unwrap();
    assert_eq!(rest.row_count(), 15);
    assert_eq!(rest.row(0), vec![Value::Int(10)]);
}

#[test]
fn test_result_classes_are_applied() {
    let conn = connection_with_people(1);
    let mut result = Connection::send_query(&conn, "SELECT id, name, score FROM people").unwrap();
    let frame = result.fetch(None).unwrap();

    assert_eq!(
        frame.types(),
        &[SemanticType::Int64, SemanticType::String, SemanticType::Double]
    );
    assert_eq!(frame.classes(), &[Some("integer64"), None, None]);
}

/// Row-major table used to check that fetching goes through the trait only.
struct RowTable {
    width: usize,
    rows: Vec<Vec<Value>>,
    finalized: bool,
}

struct RowMaterializer;

impl Materializer for RowMaterializer {
    type Table = RowTable;

    fn create(&self, types: &[SemanticType], _names: &[String], capacity: usize) -> RowTable {
        RowTable {
            width: types.len(),
            rows: vec![vec![Value::Null; types.len()]; capacity],
            finalized: false,
        }
    }

    fn resize(&self, mut table: RowTable, capacity: usize) -> RowTable {
        let width = table.width;
        table.rows.resize(capacity, vec![Value::Null; width]);
        table
    }

    fn set_value(&self, table: &mut RowTable, row: usize, column: usize, value: Value) -> Result<()> {
        table.rows[row][column] = value;
        Ok(())
    }

    fn apply_result_class_attributes(&self, mut table: RowTable, _types: &[SemanticType]) -> RowTable {
        table.finalized = true;
        table
    }
}

#[test]
fn test_fetch_with_custom_materializer() {
    let conn = connection_with_people(3);
    let mut result =
        Connection::send_query(&conn, "SELECT id, name FROM people ORDER BY id DESC").unwrap();

    let table = result.fetch_with(&RowMaterializer, None).unwrap();

    assert!(table.finalized);
    assert_eq!(
        table.rows,
        vec![
            vec![Value::Int(3), Value::from("person 3")],
            vec![Value::Int(2), Value::from("person 2")],
            vec![Value::Int(1), Value::from("person 1")],
        ]
    );
}

/// Records every capacity the fetch loop asks for.
#[derive(Default)]
struct SizeLog {
    sizes: RefCell<Vec<usize>>,
}

impl Materializer for SizeLog {
    type Table = RowTable;

    fn create(&self, types: &[SemanticType], names: &[String], capacity: usize) -> RowTable {
        self.sizes.borrow_mut().push(capacity);
        RowMaterializer.create(types, names, capacity)
    }

    fn resize(&self, table: RowTable, capacity: usize) -> RowTable {
        self.sizes.borrow_mut().push(capacity);
        RowMaterializer.resize(table, capacity)
    }

    fn set_value(&self, table: &mut RowTable, row: usize, column: usize, value: Value) -> Result<()> {
        RowMaterializer.set_value(table, row, column, value)
    }

    fn apply_result_class_attributes(&self, table: RowTable, types: &[SemanticType]) -> RowTable {
        RowMaterializer.apply_result_class_attributes(table, types)
    }
}

#[test]
fn test_row_limit_caps_allocation() {
    let conn = Connection::with_config(
        MemoryServer::new(),
        FetchConfig {
            initial_capacity: 4,
            ..FetchConfig::default()
        },
    );
    Connection::execute(&conn, "CREATE TABLE t (v INT)", ParameterBatch::empty()).unwrap();
    let values: Vec<Value> = (0..7).map(Value::from).collect();
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?)",
        ParameterBatch::from_columns(vec![values]),
    )
    .unwrap();

    let log = SizeLog::default();
    let mut result = Connection::send_query(&conn, "SELECT v FROM t").unwrap();
    let table = result.fetch_with(&log, Some(6)).unwrap();

    assert_eq!(table.rows.len(), 6);
    assert_eq!(*log.sizes.borrow(), vec![4, 6]);

    let log = SizeLog::default();
    let table = result.fetch_with(&log, Some(usize::MAX)).unwrap();
    assert_eq!(table.rows.len(), 1);
    assert_eq!(*log.sizes.borrow(), vec![4, 1]);
}
