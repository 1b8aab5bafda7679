//! Script runner integration tests.

use std::io::Write;

use db_rowset::cli::OutputFormat;
use db_rowset::config::FetchConfig;
use db_rowset::script::{self, RunOptions, Script};

const SCRIPT: &str = r#"
[[step]]
sql = "CREATE TABLE books (id INT, title VARCHAR(80))"

[[step]]
sql = "INSERT INTO books VALUES (?, ?)"
params = [[1, "Dune"], [2, "Solaris"], [3, "Ubik"]]

[[step]]
sql = "SELECT title FROM books WHERE id >= ? ORDER BY id"
params = [[2]]

[[step]]
sql = "DELETE FROM books WHERE id = 1"
"#;

fn script_file(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn test_load_and_run_script_file() {
    let file = script_file(SCRIPT);
    let script = Script::load(file.path()).unwrap();
    let outputs = script::run(&script, FetchConfig::default(), RunOptions::default()).unwrap();

    assert_eq!(outputs.len(), 4);
    assert_eq!(outputs[1].rows_affected, Some(3));
    assert_eq!(outputs[2].chunks[0].row_count(), 2);
    assert_eq!(outputs[3].rows_affected, Some(1));
}

#[test]
fn test_text_output() {
    let script = Script::parse(SCRIPT).unwrap();
    let options = RunOptions {
        batch_size: None,
        columns: true,
    };
    let outputs = script::run(&script, FetchConfig::default(), options).unwrap();
    let text = script::render(&outputs, OutputFormat::Text);

    assert!(text.contains("> SELECT title FROM books WHERE id >= ? ORDER BY id\n"));
    assert!(text.contains("title | string"));
    assert!(text.contains("Solaris\nUbik\n(2 rows)"));
    assert!(text.contains("Rows affected: 1"));
}

#[test]
fn test_json_output() {
    let script = Script::parse(SCRIPT).unwrap();
    let options = RunOptions {
        batch_size: Some(1),
        columns: true,
    };
    let outputs = script::run(&script, FetchConfig::default(), options).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&script::render(&outputs, OutputFormat::Json)).unwrap();

    assert_eq!(
        json[2]["rows"],
        serde_json::json!([{"title": "Solaris"}, {"title": "Ubik"}])
    );
    assert_eq!(
        json[2]["columns"],
        serde_json::json!([{"name": "title", "type": "string"}])
    );
    assert_eq!(json[3]["rows_affected"], 1);
}

#[test]
fn test_missing_script_is_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = Script::load(&dir.path().join("missing.toml")).unwrap_err();
    assert_eq!(err.category(), "Configuration Error");
}

#[test]
fn test_zero_batch_size_is_rejected() {
    let script = Script::parse(SCRIPT).unwrap();
    let options = RunOptions {
        batch_size: Some(0),
        columns: false,
    };
    assert!(script::run(&script, FetchConfig::default(), options).is_err());
}
