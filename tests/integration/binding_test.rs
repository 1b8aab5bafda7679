//! Parameter binding integration tests.
//!
//! Tests lazy per-row execution for queries and eager execution for
//! statements.

use db_rowset::{Connection, ParameterBatch, RowsetError, Value};
use pretty_assertions::assert_eq;

use super::connection_with_people;

#[test]
fn test_batch_query_steps_through_every_execution() {
    let conn = connection_with_people(6);
    let mut result =
        Connection::send_query(&conn, "SELECT id FROM people WHERE id <= ? ORDER BY id").unwrap();
    assert_eq!(result.param_count(), 1);

    // 1 + 0 + 3 + 2 rows across four executions.
    result
        .bind(ParameterBatch::from_columns(vec![vec![
            1.into(),
            0.into(),
            3.into(),
            2.into(),
        ]]))
        .unwrap();

    let mut steps = 0;
    while result.step().unwrap() {
        steps += 1;
        assert!(!result.complete());
    }
    assert_eq!(steps, 6);
    assert!(result.complete());
    assert_eq!(result.rows_fetched(), Some(6));
}

#[test]
fn test_batch_query_fetch_concatenates_executions() {
    let conn = connection_with_people(3);
    let mut result = Connection::send_query(&conn, "SELECT name FROM people WHERE id = ?").unwrap();
    result
        .bind(ParameterBatch::from_rows(vec![vec![3.into()], vec![1.into()]]).unwrap())
        .unwrap();

    let frame = result.fetch(None).unwrap();
    assert_eq!(frame.row(0), vec![Value::from("person 3")]);
    assert_eq!(frame.row(1), vec![Value::from("person 1")]);
    assert_eq!(frame.row_count(), 2);
}

#[test]
fn test_bound_query_is_not_complete_until_fetched() {
    let conn = connection_with_people(3);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people WHERE id > ?").unwrap();
    assert!(!result.complete());
    result
        .bind(ParameterBatch::from_columns(vec![vec![5.into()]]))
        .unwrap();
    assert!(!result.complete());

    assert_eq!(result.fetch(None).unwrap().row_count(), 0);
    assert!(result.complete());
}

#[test]
fn test_batch_statement_sums_affected_rows() {
    let conn = connection_with_people(5);
    let mut result =
        Connection::send_query(&conn, "UPDATE people SET score = ? WHERE id >= ?").unwrap();
    result
        .bind(ParameterBatch::from_columns(vec![
            vec![10.0.into(), 20.0.into()],
            vec![4.into(), 2.into()],
        ]))
        .unwrap();

    // 2 rows for id >= 4, then 4 rows for id >= 2.
    assert_eq!(result.rows_affected(), Some(6));
    assert!(result.complete());
}

#[test]
fn test_connection_execute_inserts_every_row() {
    let conn = connection_with_people(0);
    let affected = Connection::execute(
        &conn,
        "INSERT INTO people (id, name) VALUES (?, ?)",
        ParameterBatch::from_rows(vec![
            vec![1.into(), "a".into()],
            vec![2.into(), Value::Null],
            vec![3.into(), "c".into()],
        ])
        .unwrap(),
    )
    .unwrap();

    assert_eq!(affected, 3);
    assert_eq!(conn.driver().row_count("people"), Some(3));
}

#[test]
fn test_param_count_mismatch_is_usage_error() {
    let conn = connection_with_people(1);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people WHERE id = ?").unwrap();
    let err = result
        .bind(ParameterBatch::from_columns(vec![vec![1.into()], vec![2.into()]]))
        .unwrap_err();

    assert_eq!(err, RowsetError::usage("Number of params don't match (2 vs 1)"));
    assert_eq!(result.rows_affected(), None);
}

#[test]
fn test_bad_value_surfaces_server_error() {
    let conn = connection_with_people(0);
    let err = Connection::execute(
        &conn,
        "INSERT INTO people (id) VALUES (?)",
        ParameterBatch::from_columns(vec![vec!["not a number".into()]]),
    )
    .unwrap_err();

    assert_eq!(err.server_code(), Some(1366));
    assert!(err.to_string().ends_with("[1366]"));
}

#[test]
fn test_rebinding_restarts_the_batch() {
    let conn = connection_with_people(4);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people WHERE id = ?").unwrap();

    result
        .bind(ParameterBatch::from_columns(vec![vec![1.into(), 2.into()]]))
        .unwrap();
    assert!(result.step().unwrap());

    result
        .bind(ParameterBatch::from_columns(vec![vec![4.into()]]))
        .unwrap();
    let frame = result.fetch(None).unwrap();
    assert_eq!(frame.row(0), vec![Value::Int(4)]);
    assert_eq!(frame.row_count(), 1);
}

#[test]
fn test_parenthesized_where_clause() {
    let conn = connection_with_people(4);
    let mut result = Connection::send_query(
        &conn,
        "SELECT id FROM people WHERE (id >= ?) AND (people.id < (?)) ORDER BY id",
    )
    .unwrap();
    assert_eq!(result.param_count(), 2);

    result
        .bind(ParameterBatch::from_columns(vec![
            vec![2.into()],
            vec![4.into()],
        ]))
        .unwrap();
    let frame = result.fetch(None).unwrap();
    assert_eq!(frame.row(0), vec![Value::Int(2)]);
    assert_eq!(frame.row(1), vec![Value::Int(3)]);
    assert_eq!(frame.row_count(), 2);
}
