//! Statement planning and execution for the in-memory server.
//!
//! Planning resolves names against the catalog at prepare time and fixes
//! the result metadata. Execution evaluates a plan with bound parameters.

use std::cmp::Ordering;

use super::catalog::{coerce, compare, Catalog, Table};
use super::codes;
use super::parser::{Command, CompareOp, Operand, Predicate, SelectItem};
use crate::db::{FieldDescriptor, ResultMetadata, Value};
use crate::error::{Result, RowsetError};
use crate::types::{FieldType, BINARY_CHARSET, UTF8MB4_CHARSET};

#[derive(Debug, Clone)]
pub(crate) enum Projection {
    Column(usize),
    Operand(Operand),
}

#[derive(Debug, Clone)]
pub(crate) enum Test {
    Compare(CompareOp, Operand),
    IsNull { negated: bool },
}

#[derive(Debug, Clone)]
pub(crate) struct Filter {
    column: usize,
    test: Test,
}

#[derive(Debug, Clone)]
pub(crate) enum Plan {
    CreateTable {
        table: Table,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        targets: Vec<usize>,
        rows: Vec<Vec<Operand>>,
    },
    Select {
        table: Option<String>,
        projection: Vec<Projection>,
        filter: Vec<Filter>,
        order_by: Option<(usize, bool)>,
        limit: Option<usize>,
    },
    Update {
        table: String,
        assignments: Vec<(usize, Operand)>,
        filter: Vec<Filter>,
    },
    Delete {
        table: String,
        filter: Vec<Filter>,
    },
}

/// What an execution produced.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Outcome {
    Rows(Vec<Vec<Value>>),
    Affected(u64),
}

/// Resolves a parsed command against the catalog.
pub(crate) fn plan(command: Command, catalog: &Catalog) -> Result<(Plan, Option<ResultMetadata>)> {
    let planned = match command {
        Command::CreateTable {
            table,
            columns,
            if_not_exists,
        } => (
            Plan::CreateTable {
                table: Table {
                    name: table,
                    columns,
                    rows: Vec::new(),
                },
                if_not_exists,
            },
            None,
        ),
        Command::DropTable { table, if_exists } => (Plan::DropTable { table, if_exists }, None),
        Command::Insert {
            table,
            columns,
            rows,
        } => {
            let stored = catalog.table(&table)?;
            let targets = match columns {
                Some(names) => names
                    .iter()
                    .map(|name| stored.column_index(name))
                    .collect::<Result<Vec<_>>>()?,
                None => (0..stored.columns.len()).collect(),
            };
            if let Some(index) = rows.iter().position(|row| row.len() != targets.len()) {
                return Err(RowsetError::server(
                    format!("Column count doesn't match value count at row {}", index + 1),
                    codes::ER_WRONG_VALUE_COUNT_ON_ROW,
                ));
            }
            (
                Plan::Insert {
                    table,
                    targets,
                    rows,
                },
                None,
            )
        }
        Command::Select {
            table,
            items,
            filter,
            order_by,
            limit,
        } => {
            let stored = table.as_deref().map(|name| catalog.table(name)).transpose()?;
            let mut projection = Vec::new();
            let mut fields = Vec::new();

            for item in items {
                match item {
                    SelectItem::Wildcard => {
                        let stored = stored.ok_or_else(|| {
                            RowsetError::server("No tables used", codes::ER_NO_TABLES_USED)
                        })?;
                        for (index, column) in stored.columns.iter().enumerate() {
                            projection.push(Projection::Column(index));
                            fields.push(column.descriptor(&column.name));
                        }
                    }
                    SelectItem::Column { name, alias } => {
                        let stored = stored.ok_or_else(|| unknown_column(&name))?;
                        let index = stored.column_index(&name)?;
                        let column = &stored.columns[index];
                        let label = alias.unwrap_or_else(|| column.name.clone());
                        projection.push(Projection::Column(index));
                        fields.push(column.descriptor(&label));
                    }
                    SelectItem::Operand { operand, label } => {
                        fields.push(operand_descriptor(&operand, &label));
                        projection.push(Projection::Operand(operand));
                    }
                }
            }

            let filter = match stored {
                Some(stored) => resolve_filter(filter, stored)?,
                None if filter.is_empty() => Vec::new(),
                None => return Err(RowsetError::server("No tables used", codes::ER_NO_TABLES_USED)),
            };

            let order_by = match (order_by, stored) {
                (Some(order), Some(stored)) => {
                    Some((stored.column_index(&order.column)?, order.descending))
                }
                (Some(order), None) => return Err(unknown_column(&order.column)),
                (None, _) => None,
            };

            (
                Plan::Select {
                    table,
                    projection,
                    filter,
                    order_by,
                    limit,
                },
                Some(ResultMetadata::new(fields)),
            )
        }
        Command::Update {
            table,
            assignments,
            filter,
        } => {
            let stored = catalog.table(&table)?;
            let assignments = assignments
                .into_iter()
                .map(|(name, operand)| Ok((stored.column_index(&name)?, operand)))
                .collect::<Result<Vec<_>>>()?;
            let filter = resolve_filter(filter, stored)?;
            (
                Plan::Update {
                    table,
                    assignments,
                    filter,
                },
                None,
            )
        }
        Command::Delete { table, filter } => {
            let stored = catalog.table(&table)?;
            let filter = resolve_filter(filter, stored)?;
            (Plan::Delete { table, filter }, None)
        }
    };

    Ok(planned)
}

fn unknown_column(name: &str) -> RowsetError {
    RowsetError::server(
        format!("Unknown column '{name}' in 'field list'"),
        codes::ER_BAD_FIELD_ERROR,
    )
}

fn operand_descriptor(operand: &Operand, label: &str) -> FieldDescriptor {
    let (field_type, charset) = match operand {
        Operand::Literal(Value::Int(_)) => (FieldType::LongLong, BINARY_CHARSET),
        Operand::Literal(Value::Float(_)) => (FieldType::Double, BINARY_CHARSET),
        Operand::Literal(Value::Null) => (FieldType::Null, BINARY_CHARSET),
        // Parameter types are unknown at prepare time; they are returned as text.
        _ => (FieldType::VarString, UTF8MB4_CHARSET),
    };
    FieldDescriptor::new(label, field_type.code(), charset)
}

fn resolve_filter(filter: Vec<Predicate>, table: &Table) -> Result<Vec<Filter>> {
    filter
        .into_iter()
        .map(|predicate| match predicate {
            Predicate::Compare { column, op, rhs } => Ok(Filter {
                column: table.column_index(&column)?,
                test: Test::Compare(op, rhs),
            }),
            Predicate::IsNull { column, negated } => Ok(Filter {
                column: table.column_index(&column)?,
                test: Test::IsNull { negated },
            }),
        })
        .collect()
}

fn matches(row: &[Value], filter: &[Filter], table: &Table, params: &[Value]) -> bool {
    filter.iter().all(|f| {
        let Some(value) = row.get(f.column) else {
            return false;
        };
        match &f.test {
            Test::IsNull { negated } => value.is_null() != *negated,
            Test::Compare(op, rhs) => {
                let rhs = rhs.eval(params);
                let rhs = match table.columns.get(f.column) {
                    Some(column) => coerce(rhs.clone(), column).unwrap_or(rhs),
                    None => rhs,
                };
                let Some(ordering) = compare(value, &rhs) else {
                    return false;
                };
                match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::NotEq => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::LtEq => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::GtEq => ordering != Ordering::Less,
                }
            }
        }
    })
}

fn check_column(table: &Table, index: usize) -> Result<()> {
    if index < table.columns.len() {
        Ok(())
    } else {
        Err(RowsetError::server(
            format!("Table definition has changed for '{}'", table.name),
            codes::ER_PS_REBIND,
        ))
    }
}

/// Executes a plan with the given parameter values.
pub(crate) fn execute(plan: &Plan, params: &[Value], catalog: &mut Catalog) -> Result<Outcome> {
    match plan {
        Plan::CreateTable {
            table,
            if_not_exists,
        } => {
            catalog.create(table.clone(), *if_not_exists)?;
            Ok(Outcome::Affected(0))
        }
        Plan::DropTable { table, if_exists } => {
            catalog.drop_table(table, *if_exists)?;
            Ok(Outcome::Affected(0))
        }
        Plan::Insert {
            table,
            targets,
            rows,
        } => {
            let stored = catalog.table_mut(table)?;
            for &target in targets {
                check_column(stored, target)?;
            }

            let mut staged = Vec::with_capacity(rows.len());
            for operands in rows {
                let mut row = vec![Value::Null; stored.columns.len()];
                for (&target, operand) in targets.iter().zip(operands) {
                    row[target] = coerce(operand.eval(params), &stored.columns[target])?;
                }
                staged.push(row);
            }

            let inserted = staged.len() as u64;
            stored.rows.extend(staged);
            Ok(Outcome::Affected(inserted))
        }
        Plan::Select {
            table,
            projection,
            filter,
            order_by,
            limit,
        } => {
            let Some(name) = table else {
                let row = projection
                    .iter()
                    .map(|p| match p {
                        Projection::Operand(op) => op.eval(params),
                        Projection::Column(_) => Value::Null,
                    })
                    .collect();
                return Ok(Outcome::Rows(vec![row]));
            };

            let stored = catalog.table(name)?;
            for p in projection {
                if let Projection::Column(index) = p {
                    check_column(stored, *index)?;
                }
            }

            let mut selected: Vec<&Vec<Value>> = stored
                .rows
                .iter()
                .filter(|row| matches(row, filter, stored, params))
                .collect();

            if let Some((column, descending)) = order_by {
                selected.sort_by(|a, b| {
                    let ordering = match (a[*column].is_null(), b[*column].is_null()) {
                        (true, true) => Ordering::Equal,
                        (true, false) => Ordering::Less,
                        (false, true) => Ordering::Greater,
                        (false, false) => {
                            compare(&a[*column], &b[*column]).unwrap_or(Ordering::Equal)
                        }
                    };
                    if *descending {
                        ordering.reverse()
                    } else {
                        ordering
                    }
                });
            }

            let rows = selected
                .into_iter()
                .take(limit.unwrap_or(usize::MAX))
                .map(|row| {
                    projection
                        .iter()
                        .map(|p| match p {
                            Projection::Column(index) => row[*index].clone(),
                            Projection::Operand(op) => op.eval(params),
                        })
                        .collect()
                })
                .collect();

            Ok(Outcome::Rows(rows))
        }
        Plan::Update {
            table,
            assignments,
            filter,
        } => {
            let stored = catalog.table(table)?;
            for (index, _) in assignments {
                check_column(stored, *index)?;
            }

            // Evaluate against a snapshot so a failing coercion leaves the table untouched.
            let mut updated = stored.rows.clone();
            let mut changed = 0u64;
            for row in updated.iter_mut() {
                if !matches(row, filter, stored, params) {
                    continue;
                }
                let mut row_changed = false;
                for (index, operand) in assignments {
                    let value = coerce(operand.eval(params), &stored.columns[*index])?;
                    if row[*index] != value {
                        row[*index] = value;
                        row_changed = true;
                    }
                }
                if row_changed {
                    changed += 1;
                }
            }

            catalog.table_mut(table)?.rows = updated;
            Ok(Outcome::Affected(changed))
        }
        Plan::Delete { table, filter } => {
            let stored = catalog.table(table)?;
            let kept: Vec<Vec<Value>> = stored
                .rows
                .iter()
                .filter(|row| !matches(row, filter, stored, params))
                .cloned()
                .collect();
            let deleted = (stored.rows.len() - kept.len()) as u64;

            catalog.table_mut(table)?.rows = kept;
            Ok(Outcome::Affected(deleted))
        }
    }
}
