//! SQL front end for the in-memory server.
//!
//! Statements are parsed with sqlparser's MySQL dialect and the resulting
//! AST is lowered into a small command tree. Only the subset the server can
//! execute is accepted; other well-formed statements fail with
//! `ER_NOT_SUPPORTED_YET`.

use sqlparser::ast::{
    self, AssignmentTarget, BinaryOperator, DataType, Expr, FromTable, GroupByExpr, ObjectName,
    ObjectType, OrderByExpr, Query, SetExpr, Statement, TableFactor, TableWithJoins, UnaryOperator,
};
use sqlparser::dialect::MySqlDialect;
use sqlparser::parser::Parser;

use super::catalog::ColumnDef;
use super::codes;
use crate::db::Value;
use crate::error::{Result, RowsetError};
use crate::types::{FieldType, BINARY_CHARSET, UTF8MB4_CHARSET};

/// A scalar operand: literal or positional parameter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Literal(Value),
    Param(usize),
}

impl Operand {
    /// Resolves the operand against bound parameters.
    pub(crate) fn eval(&self, params: &[Value]) -> Value {
        match self {
            Self::Literal(v) => v.clone(),
            Self::Param(i) => params.get(*i).cloned().unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Predicate {
    Compare {
        column: String,
        op: CompareOp,
        rhs: Operand,
    },
    IsNull {
        column: String,
        negated: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SelectItem {
    Wildcard,
    Column {
        name: String,
        alias: Option<String>,
    },
    Operand {
        operand: Operand,
        label: String,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct OrderBy {
    pub column: String,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    CreateTable {
        table: String,
        columns: Vec<ColumnDef>,
        if_not_exists: bool,
    },
    DropTable {
        table: String,
        if_exists: bool,
    },
    Insert {
        table: String,
        columns: Option<Vec<String>>,
        rows: Vec<Vec<Operand>>,
    },
    Select {
        table: Option<String>,
        items: Vec<SelectItem>,
        filter: Vec<Predicate>,
        order_by: Option<OrderBy>,
        limit: Option<usize>,
    },
    Update {
        table: String,
        assignments: Vec<(String, Operand)>,
        filter: Vec<Predicate>,
    },
    Delete {
        table: String,
        filter: Vec<Predicate>,
    },
}

/// A parsed statement and its placeholder count.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Parsed {
    pub command: Command,
    pub param_count: usize,
}

/// Parses one SQL statement.
pub(crate) fn parse(sql: &str) -> Result<Parsed> {
    let mut statements = Parser::parse_sql(&MySqlDialect {}, sql).map_err(|e| {
        RowsetError::server(
            format!("You have an error in your SQL syntax: {e}"),
            codes::ER_PARSE_ERROR,
        )
    })?;
    if statements.len() != 1 {
        return Err(RowsetError::server(
            "You have an error in your SQL syntax: expected exactly one statement",
            codes::ER_PARSE_ERROR,
        ));
    }

    let mut lowering = Lowering::default();
    let command = lowering.statement(statements.remove(0))?;
    Ok(Parsed {
        command,
        param_count: lowering.params,
    })
}

fn unsupported(what: impl std::fmt::Display) -> RowsetError {
    RowsetError::server(
        format!("This version doesn't yet support '{what}'"),
        codes::ER_NOT_SUPPORTED_YET,
    )
}

fn object_name(name: &ObjectName) -> Result<String> {
    name.0
        .last()
        .map(|ident| ident.value.clone())
        .ok_or_else(|| unsupported(name))
}

/// Resolves a single plain table reference.
fn single_table(tables: &[TableWithJoins]) -> Result<String> {
    match tables {
        [TableWithJoins { relation, joins }] if joins.is_empty() => match relation {
            TableFactor::Table {
                name, args: None, ..
            } => object_name(name),
            other => Err(unsupported(other)),
        },
        [_] => Err(unsupported("JOIN")),
        _ => Err(unsupported("multiple tables")),
    }
}

fn column_name(expr: &Expr) -> Option<String> {
    match expr {
        Expr::Identifier(ident) => Some(ident.value.clone()),
        Expr::CompoundIdentifier(parts) => parts.last().map(|ident| ident.value.clone()),
        Expr::Nested(inner) => column_name(inner),
        _ => None,
    }
}

fn column_type(data_type: &DataType) -> Result<(FieldType, u16)> {
    let text = UTF8MB4_CHARSET;
    let binary = BINARY_CHARSET;

    let mapped = match data_type {
        DataType::TinyInt(_)
        | DataType::UnsignedTinyInt(_)
        | DataType::Bool
        | DataType::Boolean => (FieldType::Tiny, binary),
        DataType::SmallInt(_) | DataType::UnsignedSmallInt(_) => (FieldType::Short, binary),
        DataType::MediumInt(_) | DataType::UnsignedMediumInt(_) => (FieldType::Int24, binary),
        DataType::Int(_)
        | DataType::Integer(_)
        | DataType::UnsignedInt(_)
        | DataType::UnsignedInteger(_) => (FieldType::Long, binary),
        DataType::BigInt(_) | DataType::UnsignedBigInt(_) => (FieldType::LongLong, binary),
        DataType::Float(_) => (FieldType::Float, binary),
        DataType::Double | DataType::DoublePrecision | DataType::Real => {
            (FieldType::Double, binary)
        }
        DataType::Decimal(_) | DataType::Numeric(_) | DataType::Dec(_) => {
            (FieldType::NewDecimal, binary)
        }
        DataType::Date => (FieldType::Date, binary),
        DataType::Datetime(_) => (FieldType::DateTime, binary),
        DataType::Timestamp(..) => (FieldType::Timestamp, binary),
        DataType::Time(..) => (FieldType::Time, binary),
        DataType::Char(_) | DataType::Character(_) => (FieldType::String, text),
        DataType::Varchar(_) | DataType::CharVarying(_) | DataType::CharacterVarying(_) => {
            (FieldType::VarString, text)
        }
        DataType::Binary(_) => (FieldType::String, binary),
        DataType::Varbinary(_) => (FieldType::VarString, binary),
        DataType::Text => (FieldType::Blob, text),
        DataType::Blob(_) => (FieldType::Blob, binary),
        DataType::JSON => (FieldType::Json, text),
        // MySQL-only type names come through as custom types.
        DataType::Custom(name, _) => match name.to_string().to_ascii_uppercase().as_str() {
            "YEAR" => (FieldType::Year, binary),
            "BIT" => (FieldType::Bit, binary),
            "TINYTEXT" => (FieldType::TinyBlob, text),
            "MEDIUMTEXT" => (FieldType::MediumBlob, text),
            "LONGTEXT" => (FieldType::LongBlob, text),
            "TINYBLOB" => (FieldType::TinyBlob, binary),
            "MEDIUMBLOB" => (FieldType::MediumBlob, binary),
            "LONGBLOB" => (FieldType::LongBlob, binary),
            other => return Err(unsupported(format!("column type {other}"))),
        },
        other => return Err(unsupported(format!("column type {other}"))),
    };
    Ok(mapped)
}

/// Walks a statement in source order, numbering `?` placeholders.
#[derive(Default)]
struct Lowering {
    params: usize,
}

impl Lowering {
    fn statement(&mut self, statement: Statement) -> Result<Command> {
        match statement {
            Statement::Query(query) => self.select(*query),
            Statement::Insert(insert) => {
                if insert.on.is_some() || insert.returning.is_some() || insert.replace_into {
                    return Err(unsupported("INSERT options"));
                }
                let table = object_name(&insert.table_name)?;
                let columns = (!insert.columns.is_empty())
                    .then(|| insert.columns.iter().map(|c| c.value.clone()).collect());
                let rows = match insert.source.as_deref().map(|source| source.body.as_ref()) {
                    Some(SetExpr::Values(values)) => values
                        .rows
                        .iter()
                        .map(|row| {
                            row.iter()
                                .map(|expr| self.operand(expr))
                                .collect::<Result<Vec<_>>>()
                        })
                        .collect::<Result<Vec<Vec<Operand>>>>()?,
                    _ => return Err(unsupported("INSERT without VALUES")),
                };
                Ok(Command::Insert {
                    table,
                    columns,
                    rows,
                })
            }
            Statement::Update {
                table,
                assignments,
                from,
                selection,
                returning,
            } => {
                if from.is_some() || returning.is_some() {
                    return Err(unsupported("UPDATE ... FROM"));
                }
                let table = single_table(std::slice::from_ref(&table))?;
                let assignments = assignments
                    .iter()
                    .map(|assignment| match &assignment.target {
                        AssignmentTarget::ColumnName(name) => {
                            Ok((object_name(name)?, self.operand(&assignment.value)?))
                        }
                        other => Err(unsupported(other)),
                    })
                    .collect::<Result<Vec<_>>>()?;
                let filter = self.filter(selection.as_ref())?;
                Ok(Command::Update {
                    table,
                    assignments,
                    filter,
                })
            }
            Statement::Delete(delete) => {
                if delete.using.is_some()
                    || delete.limit.is_some()
                    || !delete.tables.is_empty()
                    || !delete.order_by.is_empty()
                {
                    return Err(unsupported("DELETE options"));
                }
                let table = match &delete.from {
                    FromTable::WithFromKeyword(tables) | FromTable::WithoutKeyword(tables) => {
                        single_table(tables)?
                    }
                };
                let filter = self.filter(delete.selection.as_ref())?;
                Ok(Command::Delete { table, filter })
            }
            Statement::CreateTable(create) => {
                if create.query.is_some() || create.like.is_some() || create.clone.is_some() {
                    return Err(unsupported("CREATE TABLE ... AS"));
                }
                let table = object_name(&create.name)?;
                // Constraints, column options and table options are accepted and ignored.
                let columns = create
                    .columns
                    .iter()
                    .map(|column| {
                        let (field_type, charset) = column_type(&column.data_type)?;
                        Ok(ColumnDef {
                            name: column.name.value.clone(),
                            field_type,
                            charset,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(Command::CreateTable {
                    table,
                    columns,
                    if_not_exists: create.if_not_exists,
                })
            }
            Statement::Drop {
                object_type: ObjectType::Table,
                if_exists,
                names,
                ..
            } => match names.as_slice() {
                [name] => Ok(Command::DropTable {
                    table: object_name(name)?,
                    if_exists,
                }),
                _ => Err(unsupported("DROP of several tables")),
            },
            other => Err(unsupported(first_word(&other.to_string()))),
        }
    }

    fn select(&mut self, query: Query) -> Result<Command> {
        if query.with.is_some() || query.offset.is_some() || query.fetch.is_some() {
            return Err(unsupported("WITH, OFFSET or FETCH"));
        }
        let select = match *query.body {
            SetExpr::Select(select) => select,
            other => return Err(unsupported(other)),
        };
        let has_grouping = match &select.group_by {
            GroupByExpr::All(_) => true,
            GroupByExpr::Expressions(exprs, _) => !exprs.is_empty(),
        };
        if select.distinct.is_some() || has_grouping || select.having.is_some() {
            return Err(unsupported("DISTINCT, GROUP BY or HAVING"));
        }

        let items = select
            .projection
            .iter()
            .map(|item| self.select_item(item))
            .collect::<Result<Vec<_>>>()?;

        let table = if select.from.is_empty() {
            None
        } else {
            Some(single_table(&select.from)?)
        };

        let filter = self.filter(select.selection.as_ref())?;

        let order_by = match query.order_by.as_ref().map(|o| o.exprs.as_slice()) {
            None | Some([]) => None,
            Some([OrderByExpr { expr, asc, .. }]) => Some(OrderBy {
                column: column_name(expr).ok_or_else(|| unsupported(expr))?,
                descending: *asc == Some(false),
            }),
            Some(_) => return Err(unsupported("ORDER BY on several columns")),
        };

        let limit = match &query.limit {
            None => None,
            Some(Expr::Value(ast::Value::Number(n, _))) => Some(n.parse().map_err(|_| {
                RowsetError::server(
                    format!("You have an error in your SQL syntax near 'LIMIT {n}'"),
                    codes::ER_PARSE_ERROR,
                )
            })?),
            Some(other) => return Err(unsupported(format!("LIMIT {other}"))),
        };

        Ok(Command::Select {
            table,
            items,
            filter,
            order_by,
            limit,
        })
    }

    fn select_item(&mut self, item: &ast::SelectItem) -> Result<SelectItem> {
        let (expr, alias) = match item {
            ast::SelectItem::Wildcard(_) => return Ok(SelectItem::Wildcard),
            ast::SelectItem::UnnamedExpr(expr) => (expr, None),
            ast::SelectItem::ExprWithAlias { expr, alias } => (expr, Some(alias)),
            other => return Err(unsupported(other)),
        };
        let alias = alias.map(|ident| ident.value.clone());

        if let Some(name) = column_name(expr) {
            return Ok(SelectItem::Column { name, alias });
        }

        let operand = self.operand(expr)?;
        let label = match (alias, &operand) {
            (Some(alias), _) => alias,
            (None, Operand::Literal(Value::String(s))) if !s.is_empty() => s.clone(),
            (None, Operand::Literal(Value::String(_))) => expr.to_string(),
            (None, Operand::Literal(v)) => v.to_display_string(),
            (None, Operand::Param(_)) => "?".to_string(),
        };
        Ok(SelectItem::Operand { operand, label })
    }

    /// Flattens a `WHERE` clause into a conjunction of predicates.
    fn filter(&mut self, selection: Option<&Expr>) -> Result<Vec<Predicate>> {
        let mut filter = Vec::new();
        if let Some(expr) = selection {
            self.conjunct(expr, &mut filter)?;
        }
        Ok(filter)
    }

    fn conjunct(&mut self, expr: &Expr, filter: &mut Vec<Predicate>) -> Result<()> {
        match expr {
            Expr::Nested(inner) => self.conjunct(inner, filter),
            Expr::BinaryOp {
                left,
                op: BinaryOperator::And,
                right,
            } => {
                self.conjunct(left, filter)?;
                self.conjunct(right, filter)
            }
            Expr::BinaryOp {
                op: BinaryOperator::Or,
                ..
            } => Err(unsupported("OR")),
            Expr::BinaryOp { left, op, right } => {
                let op = match op {
                    BinaryOperator::Eq => CompareOp::Eq,
                    BinaryOperator::NotEq => CompareOp::NotEq,
                    BinaryOperator::Lt => CompareOp::Lt,
                    BinaryOperator::LtEq => CompareOp::LtEq,
                    BinaryOperator::Gt => CompareOp::Gt,
                    BinaryOperator::GtEq => CompareOp::GtEq,
                    _ => return Err(unsupported(format!("predicate {expr}"))),
                };
                let column =
                    column_name(left).ok_or_else(|| unsupported(format!("predicate {expr}")))?;
                let rhs = self.operand(right)?;
                filter.push(Predicate::Compare { column, op, rhs });
                Ok(())
            }
            Expr::IsNull(inner) | Expr::IsNotNull(inner) => {
                let column =
                    column_name(inner).ok_or_else(|| unsupported(format!("predicate {expr}")))?;
                filter.push(Predicate::IsNull {
                    column,
                    negated: matches!(expr, Expr::IsNotNull(_)),
                });
                Ok(())
            }
            other => Err(unsupported(format!("predicate {other}"))),
        }
    }

    fn operand(&mut self, expr: &Expr) -> Result<Operand> {
        match expr {
            Expr::Nested(inner) => self.operand(inner),
            Expr::Value(value) => self.value(value, false),
            Expr::UnaryOp {
                op: UnaryOperator::Minus,
                expr: inner,
            } => match inner.as_ref() {
                Expr::Value(value @ ast::Value::Number(..)) => self.value(value, true),
                other => Err(unsupported(format!("expression -{other}"))),
            },
            other => Err(unsupported(format!("expression {other}"))),
        }
    }

    fn value(&mut self, value: &ast::Value, negative: bool) -> Result<Operand> {
        let literal = match value {
            ast::Value::Number(n, _) => {
                if let Ok(i) = n.parse::<i64>() {
                    Value::Int(if negative { -i } else { i })
                } else {
                    let f: f64 = n.parse().map_err(|_| unsupported(format!("number {n}")))?;
                    Value::Float(if negative { -f } else { f })
                }
            }
            ast::Value::SingleQuotedString(s) | ast::Value::DoubleQuotedString(s) => {
                Value::String(s.clone())
            }
            ast::Value::Boolean(b) => Value::Int(i64::from(*b)),
            ast::Value::Null => Value::Null,
            ast::Value::Placeholder(p) if p.starts_with('?') => {
                let index = self.params;
                self.params += 1;
                return Ok(Operand::Param(index));
            }
            other => return Err(unsupported(format!("literal {other}"))),
        };
        Ok(Operand::Literal(literal))
    }
}

fn first_word(sql: &str) -> &str {
    sql.split_whitespace().next().unwrap_or_default()
}
