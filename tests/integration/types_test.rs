//! Column type integration tests.
//!
//! Tests type classification, column info and the truncated-value path.

use chrono::NaiveDate;
use db_rowset::config::FetchConfig;
use db_rowset::types::FieldType;
use db_rowset::{classify, Connection, MemoryServer, ParameterBatch, SemanticType, Value};
use pretty_assertions::assert_eq;

fn connection_with_scratch(scratch_len: usize) -> std::rc::Rc<Connection<MemoryServer>> {
    Connection::with_config(
        MemoryServer::new(),
        FetchConfig {
            scratch_len,
            ..FetchConfig::default()
        },
    )
}

#[test]
fn test_charset_selects_blob_or_string() {
    for code in [
        FieldType::VarString,
        FieldType::String,
        FieldType::Blob,
        FieldType::LongBlob,
    ] {
        assert_eq!(classify(code.code(), true), SemanticType::Blob);
        assert_eq!(classify(code.code(), false), SemanticType::String);
    }
}

#[test]
fn test_column_info_reports_semantic_types() {
    let conn = Connection::new(MemoryServer::new());
    Connection::execute(
        &conn,
        "CREATE TABLE t (a INT, b BIGINT, c DOUBLE, d VARCHAR(10), e BLOB, f DATE, g DATETIME, h TIME, i BIT)",
        ParameterBatch::empty(),
    )
    .unwrap();

    let result = Connection::send_query(&conn, "SELECT * FROM t").unwrap();
    let info = result.column_info();
    let types: Vec<Value> = (0..info.row_count()).map(|row| info.row(row)[1].clone()).collect();

    assert_eq!(
        types,
        [
            "integer", "integer64", "double", "string", "blob", "date", "datetime", "time",
            "logical",
        ]
        .map(Value::from)
        .to_vec()
    );
    assert_eq!(result.column_spec().names()[4], "e");
}

#[test]
fn test_statement_has_empty_column_info() {
    let conn = Connection::new(MemoryServer::new());
    let result = Connection::send_query(&conn, "CREATE TABLE t (a INT)").unwrap();
    assert!(!result.has_result());
    assert_eq!(result.column_info().row_count(), 0);
}

#[test]
fn test_long_string_round_trips() {
    let conn = connection_with_scratch(8);
    Connection::execute(&conn, "CREATE TABLE t (s TEXT)", ParameterBatch::empty()).unwrap();

    let long: String = "rowset-".repeat(300);
    let values = vec!["short".into(), long.clone().into(), Value::Null, "exactly8".into()];
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?)",
        ParameterBatch::from_columns(vec![values]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT s FROM t").unwrap();
    let frame = result.fetch(None).unwrap();

    assert_eq!(frame.row(0), vec![Value::from("short")]);
    assert_eq!(frame.row(1), vec![Value::from(long)]);
    assert_eq!(frame.row(2), vec![Value::Null]);
    assert_eq!(frame.row(3), vec![Value::from("exactly8")]);
}

#[test]
fn test_long_multibyte_string_round_trips() {
    let conn = connection_with_scratch(4);
    Connection::execute(&conn, "CREATE TABLE t (s VARCHAR(100))", ParameterBatch::empty()).unwrap();
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?)",
        ParameterBatch::from_columns(vec![vec!["żółć gęślą jaźń".into()]]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT s FROM t").unwrap();
    let frame = result.fetch(None).unwrap();
    assert_eq!(frame.row(0), vec![Value::from("żółć gęślą jaźń")]);
}

#[test]
fn test_blob_round_trips() {
    let conn = connection_with_scratch(16);
    Connection::execute(&conn, "CREATE TABLE t (b BLOB)", ParameterBatch::empty()).unwrap();
    let payload: Vec<u8> = (0..=255).collect();
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?)",
        ParameterBatch::from_columns(vec![vec![payload.clone().into()]]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT b FROM t").unwrap();
    let frame = result.fetch(None).unwrap();
    assert_eq!(frame.types(), &[SemanticType::Blob]);
    assert_eq!(frame.row(0), vec![Value::Bytes(payload)]);
}

#[test]
fn test_temporal_values() {
    let conn = Connection::new(MemoryServer::new());
    Connection::execute(&conn, "CREATE TABLE t (d DATE, ts DATETIME)", ParameterBatch::empty())
        .unwrap();
    let day = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
    let moment = day.and_hms_opt(23, 59, 1).unwrap();
    Connection::execute(
        &conn,
        "INSERT INTO t VALUES (?, ?)",
        ParameterBatch::from_columns(vec![vec![day.into()], vec!["2024-02-29 23:59:01".into()]]),
    )
    .unwrap();

    let mut result = Connection::send_query(&conn, "SELECT d, ts FROM t").unwrap();
    let frame = result.fetch(None).unwrap();
    assert_eq!(frame.row(0), vec![Value::Date(day), Value::DateTime(moment)]);
    assert_eq!(frame.classes(), &[Some("Date"), Some("POSIXct")]);
}

#[test]
fn test_literal_select_types() {
    let conn = Connection::new(MemoryServer::new());
    let mut result = Connection::send_query(&conn, "SELECT 1 AS one, 2.5 AS half, 'x' AS s").unwrap();
    assert_eq!(
        result.column_spec().types(),
        &[SemanticType::Int64, SemanticType::Double, SemanticType::String]
    );
    let frame = result.fetch(None).unwrap();
    assert_eq!(
        frame.row(0),
        vec![Value::Int(1), Value::Float(2.5), Value::from("x")]
    );
}
