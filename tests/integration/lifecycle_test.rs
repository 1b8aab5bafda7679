//! Result lifecycle integration tests.
//!
//! Tests statement release, autocommit restoration and error propagation.

use db_rowset::db::memory::codes;
use db_rowset::{Connection, MemoryServer, ParameterBatch, RowsetError, Warning};
use pretty_assertions::assert_eq;

use super::connection_with_people;

#[test]
fn test_close_twice_releases_once() {
    let conn = connection_with_people(2);
    let server = conn.driver().clone();
    let autocommits = server.autocommit_calls();

    let mut result = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    assert_eq!(server.open_statements(), 1);

    result.close();
    result.close();
    drop(result);

    assert_eq!(server.open_statements(), 0);
    assert_eq!(server.autocommit_calls(), autocommits + 1);
}

#[test]
fn test_drop_closes_statement() {
    let conn = connection_with_people(2);
    let server = conn.driver().clone();
    {
        let _result = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
        assert_eq!(server.open_statements(), 1);
    }
    assert_eq!(server.open_statements(), 0);
    assert!(conn.current_result().is_none());
}

#[test]
fn test_closed_result_rejects_use() {
    let conn = connection_with_people(2);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people WHERE id = ?").unwrap();
    result.close();

    let closed = RowsetError::usage("Result set has been closed");
    assert_eq!(result.bind(ParameterBatch::empty()).unwrap_err(), closed);
    assert_eq!(result.step().unwrap_err(), closed);
    assert_eq!(result.fetch(None).unwrap_err(), closed);
    assert!(!result.complete());
    assert_eq!(result.rows_fetched(), None);
}

#[test]
fn test_statement_allocation_failure() {
    let conn = Connection::new(MemoryServer::with_statement_limit(1));
    let _first = Connection::send_query(&conn, "SELECT 1").unwrap();

    let err = Connection::send_query(&conn, "SELECT 2").unwrap_err();
    assert_eq!(err, RowsetError::resource("Out of memory"));
}

#[test]
fn test_prepare_errors_carry_server_code() {
    let conn = connection_with_people(0);

    let err = Connection::send_query(&conn, "SELECT * FROM nowhere").unwrap_err();
    assert_eq!(err.server_code(), Some(codes::ER_NO_SUCH_TABLE));

    let err = Connection::send_query(&conn, "SELECT missing FROM people").unwrap_err();
    assert_eq!(err.server_code(), Some(codes::ER_BAD_FIELD_ERROR));

    let err = Connection::send_query(&conn, "SELEKT 1").unwrap_err();
    assert_eq!(err.server_code(), Some(codes::ER_PARSE_ERROR));
    assert_eq!(err.category(), "Server Error");

    assert_eq!(conn.driver().open_statements(), 0);
}

#[test]
fn test_fetch_error_is_fatal_for_the_call() {
    let conn = connection_with_people(3);
    let mut result = Connection::send_query(&conn, "SELECT id FROM people").unwrap();

    conn.driver()
        .inject_fetch_error("Lost connection to server during query", 2013);
    let err = result.fetch(None).unwrap_err();

    assert_eq!(
        err.to_string(),
        "Lost connection to server during query [2013]"
    );
}

#[test]
fn test_statement_fetch_warns_and_returns_empty() {
    let conn = connection_with_people(3);
    let mut result = Connection::send_query(&conn, "DELETE FROM people WHERE id > 1").unwrap();
    assert!(!result.has_result());
    assert!(result.complete());

    let frame = result.fetch(Some(10)).unwrap();
    assert_eq!(frame.num_columns(), 0);
    assert_eq!(frame.row_count(), 0);
    assert_eq!(result.take_warnings(), vec![Warning::NoResultSet]);
    assert_eq!(result.rows_affected(), Some(2));
}

#[test]
fn test_table_lifecycle() {
    let conn = Connection::new(MemoryServer::new());
    Connection::execute(&conn, "CREATE TABLE a (x INT)", ParameterBatch::empty()).unwrap();
    Connection::execute(&conn, "CREATE TABLE b (y INT)", ParameterBatch::empty()).unwrap();
    assert_eq!(conn.driver().table_names(), vec!["a", "b"]);

    let err = Connection::execute(&conn, "CREATE TABLE a (x INT)", ParameterBatch::empty())
        .unwrap_err();
    assert_eq!(err.server_code(), Some(codes::ER_TABLE_EXISTS_ERROR));

    Connection::execute(&conn, "DROP TABLE a", ParameterBatch::empty()).unwrap();
    Connection::execute(&conn, "DROP TABLE IF EXISTS a", ParameterBatch::empty()).unwrap();
    assert_eq!(conn.driver().table_names(), vec!["b"]);
}
