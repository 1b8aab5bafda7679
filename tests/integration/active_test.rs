//! Active result registry integration tests.

use db_rowset::{Connection, RowsetError};
use pretty_assertions::assert_eq;

use super::connection_with_people;

#[test]
fn test_new_result_supersedes_previous() {
    let conn = connection_with_people(3);
    let mut first = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    assert!(first.active());
    assert_eq!(conn.current_result(), Some(first.id()));

    let mut second = Connection::send_query(&conn, "SELECT name FROM people").unwrap();
    assert!(!first.active());
    assert!(second.active());

    assert_eq!(
        first.fetch(None).unwrap_err(),
        RowsetError::usage("Inactive result set")
    );
    assert_eq!(second.fetch(None).unwrap().row_count(), 3);
}

#[test]
fn test_dropping_superseded_result_keeps_current() {
    let conn = connection_with_people(1);
    let first = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    let second = Connection::send_query(&conn, "SELECT name FROM people").unwrap();

    drop(first);
    assert_eq!(conn.current_result(), Some(second.id()));

    drop(second);
    assert!(conn.current_result().is_none());
}

#[test]
fn test_superseded_result_can_still_step() {
    let conn = connection_with_people(2);
    let mut first = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    let _second = Connection::send_query(&conn, "SELECT id FROM people").unwrap();

    // Only the batch fetch checks activity.
    assert!(first.step().unwrap());
    assert_eq!(first.rows_fetched(), Some(1));
}

#[test]
fn test_reactivating_a_result() {
    let conn = connection_with_people(2);
    let mut first = Connection::send_query(&conn, "SELECT id FROM people").unwrap();
    let _second = Connection::send_query(&conn, "SELECT id FROM people").unwrap();

    conn.set_current_result(Some(first.id()));
    assert!(first.active());
    assert_eq!(first.fetch(None).unwrap().row_count(), 2);
}
