//! Statement scripts for the `rowset` binary.
//!
//! A script is a TOML file with one `[[step]]` table per statement:
//!
//! ```toml
//! [[step]]
//! sql = "INSERT INTO t VALUES (?, ?)"
//! params = [[1, "a"], [2, "b"]]
//!
//! [[step]]
//! sql = "SELECT * FROM t"
//! fetch = 10
//! ```
//!
//! Steps run in order against one fresh `MemoryServer` connection.

use std::path::Path;
use std::rc::Rc;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cli::OutputFormat;
use crate::config::FetchConfig;
use crate::connection::Connection;
use crate::db::{MemoryServer, Value};
use crate::error::{Result, RowsetError};
use crate::result::{ParameterBatch, ResultFrame, ResultSet};

/// A parsed script.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct Script {
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

/// One statement of a script.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Step {
    /// SQL text, with `?` placeholders for parameters.
    pub sql: String,

    /// Parameter rows. Omitted for parameter-free statements.
    #[serde(default)]
    pub params: Vec<Vec<toml::Value>>,

    /// Maximum rows to fetch. Omitted fetches all rows.
    #[serde(default)]
    pub fetch: Option<usize>,
}

impl Script {
    /// Loads a script from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            RowsetError::config(format!("Failed to read script {}: {e}", path.display()))
        })?;
        Self::parse(&content)
            .map_err(|e| RowsetError::config(format!("Script error in {}:\n  {e}", path.display())))
    }

    /// Parses a script from TOML text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| RowsetError::config(e.to_string()))
    }
}

/// Options that shape how each step's rows are fetched and reported.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Fetch in chunks of this many rows.
    pub batch_size: Option<usize>,

    /// Report column info for each result.
    pub columns: bool,
}

/// What one step produced.
#[derive(Debug, Clone, PartialEq)]
pub struct StepOutput {
    pub sql: String,
    pub column_info: Option<ResultFrame>,
    pub chunks: Vec<ResultFrame>,
    pub rows_affected: Option<u64>,
    pub rows_fetched: Option<u64>,
    pub warnings: Vec<String>,
}

/// Runs every step of `script` against a fresh in-memory server.
pub fn run(script: &Script, config: FetchConfig, options: RunOptions) -> Result<Vec<StepOutput>> {
    config.validate()?;
    if options.batch_size == Some(0) {
        return Err(RowsetError::config("--batch-size must be positive"));
    }

    let conn = Connection::with_config(MemoryServer::new(), config);
    let mut outputs = Vec::with_capacity(script.steps.len());

    for (index, step) in script.steps.iter().enumerate() {
        debug!(step = index + 1, sql = %step.sql, "Running step");
        outputs.push(run_step(&conn, step, options).map_err(|e| match e {
            RowsetError::Server { message, code } => {
                RowsetError::server(format!("step {}: {message}", index + 1), code)
            }
            other => other,
        })?);
    }

    info!(steps = outputs.len(), "Script finished");
    Ok(outputs)
}

fn run_step(
    conn: &Rc<Connection<MemoryServer>>,
    step: &Step,
    options: RunOptions,
) -> Result<StepOutput> {
    let mut result = Connection::send_query(conn, &step.sql)?;

    if !step.params.is_empty() {
        let rows = step
            .params
            .iter()
            .map(|row| row.iter().map(to_value).collect::<Result<Vec<_>>>())
            .collect::<Result<Vec<_>>>()?;
        result.bind(ParameterBatch::from_rows(rows)?)?;
    }

    let column_info = options.columns.then(|| result.column_info());
    let chunks = if result.has_result() {
        fetch_chunks(&mut result, step.fetch, options.batch_size)?
    } else {
        Vec::new()
    };

    Ok(StepOutput {
        sql: step.sql.clone(),
        column_info,
        chunks,
        rows_affected: (!result.has_result())
            .then(|| result.rows_affected())
            .flatten(),
        rows_fetched: result.rows_fetched().filter(|_| result.has_result()),
        warnings: result
            .take_warnings()
            .iter()
            .map(ToString::to_string)
            .collect(),
    })
}

fn fetch_chunks(
    result: &mut ResultSet<MemoryServer>,
    limit: Option<usize>,
    batch_size: Option<usize>,
) -> Result<Vec<ResultFrame>> {
    let Some(batch_size) = batch_size else {
        return Ok(vec![result.fetch(limit)?]);
    };

    let mut chunks = Vec::new();
    let mut remaining = limit;
    while !result.complete() && remaining != Some(0) {
        let size = remaining.map_or(batch_size, |left| left.min(batch_size));
        let chunk = result.fetch(Some(size))?;
        if chunk.row_count() == 0 {
            break;
        }
        remaining = remaining.map(|left| left - chunk.row_count());
        chunks.push(chunk);
    }
    Ok(chunks)
}

/// Converts a TOML parameter into a host value. An empty inline table
/// (`{}`) is SQL NULL.
fn to_value(value: &toml::Value) -> Result<Value> {
    let converted = match value {
        toml::Value::Integer(i) => Value::Int(*i),
        toml::Value::Float(f) => Value::Float(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Datetime(dt) => datetime_value(dt)?,
        toml::Value::Table(table) if table.is_empty() => Value::Null,
        other => {
            return Err(RowsetError::config(format!(
                "Unsupported parameter value: {other}"
            )))
        }
    };
    Ok(converted)
}

fn datetime_value(dt: &toml::value::Datetime) -> Result<Value> {
    let invalid = || RowsetError::config(format!("Invalid date/time parameter: {dt}"));

    let date = dt
        .date
        .map(|d| NaiveDate::from_ymd_opt(i32::from(d.year), u32::from(d.month), u32::from(d.day)))
        .map(|d| d.ok_or_else(invalid))
        .transpose()?;
    let time = dt
        .time
        .map(|t| {
            NaiveTime::from_hms_nano_opt(
                u32::from(t.hour),
                u32::from(t.minute),
                u32::from(t.second),
                t.nanosecond,
            )
        })
        .map(|t| t.ok_or_else(invalid))
        .transpose()?;

    match (date, time) {
        (Some(date), Some(time)) => Ok(Value::DateTime(NaiveDateTime::new(date, time))),
        (Some(date), None) => Ok(Value::Date(date)),
        (None, Some(time)) => Ok(Value::Time(time)),
        (None, None) => Err(invalid()),
    }
}

#[derive(Serialize)]
struct JsonColumn {
    name: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Serialize)]
struct JsonStep<'a> {
    sql: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<JsonColumn>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows: Option<Vec<serde_json::Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rows_affected: Option<u64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    warnings: Vec<String>,
}

/// Renders step outputs in the requested format.
pub fn render(outputs: &[StepOutput], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => render_text(outputs),
        OutputFormat::Json => render_json(outputs),
    }
}

fn render_text(outputs: &[StepOutput]) -> String {
    let mut text = String::new();
    for output in outputs {
        text.push_str(&format!("> {}\n", output.sql));
        if let Some(info) = &output.column_info {
            text.push_str(&format!("{info}\n"));
        }
        for chunk in &output.chunks {
            text.push_str(&format!("{chunk}\n"));
        }
        if let Some(affected) = output.rows_affected {
            text.push_str(&format!("Rows affected: {affected}\n"));
        }
        for warning in &output.warnings {
            text.push_str(&format!("Warning: {warning}\n"));
        }
        text.push('\n');
    }
    text
}

fn render_json(outputs: &[StepOutput]) -> String {
    let steps: Vec<JsonStep<'_>> = outputs
        .iter()
        .map(|output| JsonStep {
            sql: &output.sql,
            columns: output.column_info.as_ref().map(|info| {
                (0..info.row_count())
                    .map(|index| {
                        let row = info.row(index);
                        JsonColumn {
                            name: row[0].to_display_string(),
                            kind: row[1].to_display_string(),
                        }
                    })
                    .collect()
            }),
            rows: (!output.chunks.is_empty()).then(|| {
                output
                    .chunks
                    .iter()
                    .flat_map(|chunk| match chunk.to_json() {
                        serde_json::Value::Array(rows) => rows,
                        other => vec![other],
                    })
                    .collect()
            }),
            rows_affected: output.rows_affected,
            warnings: output.warnings.clone(),
        })
        .collect();

    serde_json::to_string_pretty(&steps)
        .unwrap_or_else(|e| format!("{{\"error\": \"Failed to serialize: {e}\"}}"))
}
