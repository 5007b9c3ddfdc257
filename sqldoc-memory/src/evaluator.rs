//! Evaluation of caller query text against in-memory tables.
//!
//! Statements are parsed with `sqlparser` in the target's dialect. The in-memory executor
//! runs the subset of `SELECT` that the session emits plus simple document lookups:
//!
//! ```text
//! SELECT <columns> FROM <table> [WHERE <predicate>] [;]
//!
//! columns   := '*' | column (',' column)*          -- column is id / data, quoted or not
//! predicate := predicate AND predicate | predicate OR predicate | '(' predicate ')'
//!            | column '=' param                    -- key match
//!            | data ('->' | '->>') '<field>' ... '=' param
//!            | JSON_VALUE '(' data ',' '$.<path>' ')' '=' param
//! param     := $n | @Pn
//! ```
//!
//! Field filters read payloads as JSON, so they are refused on the SqlServer-XML dialect,
//! where only key filters apply. Anything else is rejected with a backend error naming the
//! statement, the way a server would reject a statement it cannot run.

use serde_json::Value;
use sqlparser::{
    ast::{
        BinaryOperator, Expr, FunctionArg, FunctionArgExpr, FunctionArguments, Ident,
        ObjectName, ObjectNamePart, Query, SelectItem, SetExpr, Statement, TableFactor,
        Value as SqlLiteral,
    },
    parser::Parser,
};

use sqldoc_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    statement::SqlValue,
    target::Dialect,
};

use crate::store::StoredRow;

/// A parsed `SELECT`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Select {
    /// Lowercased table name.
    pub table: String,
    /// Whether the key column is projected.
    pub with_key: bool,
    pub filter: Option<Filter>,
}

/// A `WHERE` predicate. Parameter positions are 1-based.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Filter {
    Key(usize),
    Field { path: Vec<String>, param: usize },
    And(Box<Filter>, Box<Filter>),
    Or(Box<Filter>, Box<Filter>),
}

impl Filter {
    /// Tests `row` against the predicate using the statement's positional `params`.
    pub fn matches(&self, row: &StoredRow, params: &[SqlValue]) -> DocumentStoreResult<bool> {
        match self {
            Filter::Key(param) => Ok(same_value(&row.key, param_at(params, *param)?)),
            Filter::Field { path, param } => {
                let expected = param_at(params, *param)?;
                let document: Value = serde_json::from_str(&row.payload).map_err(|err| {
                    DocumentStoreError::Backend(format!("payload is not valid JSON: {err}"))
                })?;

                let found = path.iter().try_fold(&document, |value, part| value.get(part));

                Ok(match (found, expected) {
                    (None | Some(Value::Null), _) | (_, SqlValue::Null) => false,
                    (Some(Value::String(text)), expected) => *text == expected.to_string(),
                    (Some(other), expected) => other.to_string() == expected.to_string(),
                })
            }
            Filter::And(left, right) => {
                Ok(left.matches(row, params)? && right.matches(row, params)?)
            }
            Filter::Or(left, right) => {
                Ok(left.matches(row, params)? || right.matches(row, params)?)
            }
        }
    }

    fn reads_payload(&self) -> bool {
        match self {
            Filter::Key(_) => false,
            Filter::Field { .. } => true,
            Filter::And(left, right) | Filter::Or(left, right) => {
                left.reads_payload() || right.reads_payload()
            }
        }
    }
}

/// Parses `sql` as a `SELECT` the in-memory executor can run against `dialect` payloads.
pub(crate) fn parse_select(sql: &str, dialect: Dialect) -> DocumentStoreResult<Select> {
    let unsupported = || {
        DocumentStoreError::Backend(format!("in-memory executor cannot run statement: {sql}"))
    };

    let statements = Parser::parse_sql(dialect.sql_dialect(), sql).map_err(|err| {
        DocumentStoreError::Backend(format!("in-memory executor cannot parse statement: {err}"))
    })?;

    let query = match statements.as_slice() {
        [Statement::Query(query)] => query,
        _ => return Err(unsupported()),
    };
    let select = plain_select(query).ok_or_else(unsupported)?;

    let with_key = projection(&select.projection).ok_or_else(unsupported)?;

    let table = match select.from.as_slice() {
        [from] if from.joins.is_empty() => match &from.relation {
            TableFactor::Table { name, .. } => table_name(name),
            _ => None,
        },
        _ => None,
    }
    .ok_or_else(unsupported)?;

    let filter = select
        .selection
        .as_ref()
        .map(|expr| predicate(expr).ok_or_else(unsupported))
        .transpose()?;

    if dialect == Dialect::SqlServerXml && filter.as_ref().is_some_and(Filter::reads_payload) {
        return Err(DocumentStoreError::Backend(format!(
            "in-memory executor filters XML payloads by key only: {sql}"
        )));
    }

    Ok(Select { table, with_key, filter })
}

fn plain_select(query: &Query) -> Option<&sqlparser::ast::Select> {
    if query.with.is_some()
        || query.order_by.is_some()
        || query.limit_clause.is_some()
        || query.fetch.is_some()
    {
        return None;
    }

    match query.body.as_ref() {
        SetExpr::Select(select)
            if select.distinct.is_none()
                && select.top.is_none()
                && select.having.is_none() =>
        {
            Some(&**select)
        }
        _ => None,
    }
}

fn table_name(name: &ObjectName) -> Option<String> {
    let parts = name
        .0
        .iter()
        .map(|part| match part {
            ObjectNamePart::Identifier(ident) => Some(ident.value.to_ascii_lowercase()),
            #[allow(unreachable_patterns)]
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    Some(parts.join("."))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Key,
    Data,
}

fn column(ident: &Ident) -> Option<Column> {
    if ident.value.eq_ignore_ascii_case("id") {
        Some(Column::Key)
    } else if ident.value.eq_ignore_ascii_case("data") {
        Some(Column::Data)
    } else {
        None
    }
}

fn column_of(expr: &Expr) -> Option<Column> {
    match expr {
        Expr::Identifier(ident) => column(ident),
        Expr::CompoundIdentifier(idents) => idents.last().and_then(column),
        Expr::Nested(inner) => column_of(inner),
        _ => None,
    }
}

/// Returns whether the key column is projected. The payload column must be.
fn projection(items: &[SelectItem]) -> Option<bool> {
    if let [SelectItem::Wildcard(_)] = items {
        return Some(true);
    }

    let columns = items
        .iter()
        .map(|item| match item {
            SelectItem::UnnamedExpr(expr) | SelectItem::ExprWithAlias { expr, .. } => {
                column_of(expr)
            }
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;

    columns
        .contains(&Column::Data)
        .then(|| columns.contains(&Column::Key))
}

fn predicate(expr: &Expr) -> Option<Filter> {
    match expr {
        Expr::Nested(inner) => predicate(inner),
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => Some(Filter::And(
            Box::new(predicate(left)?),
            Box::new(predicate(right)?),
        )),
        Expr::BinaryOp { left, op: BinaryOperator::Or, right } => Some(Filter::Or(
            Box::new(predicate(left)?),
            Box::new(predicate(right)?),
        )),
        Expr::BinaryOp { left, op: BinaryOperator::Eq, right } => {
            let (operand, param) = match (param_position(left), param_position(right)) {
                (None, Some(param)) => (left, param),
                (Some(param), None) => (right, param),
                _ => return None,
            };

            if column_of(operand) == Some(Column::Key) {
                return Some(Filter::Key(param));
            }

            field_path(operand).map(|path| Filter::Field { path, param })
        }
        _ => None,
    }
}

/// Reads `$n` (a placeholder value) or `@Pn` (a SQL Server variable) as a position.
fn param_position(expr: &Expr) -> Option<usize> {
    let text = match expr {
        Expr::Value(value) => match &value.value {
            SqlLiteral::Placeholder(text) => text.as_str(),
            _ => return None,
        },
        Expr::Identifier(ident) if ident.quote_style.is_none() => ident.value.as_str(),
        Expr::Nested(inner) => return param_position(inner),
        _ => return None,
    };

    let digits = text
        .strip_prefix('$')
        .or_else(|| text.strip_prefix("@P"))
        .or_else(|| text.strip_prefix("@p"))?;

    digits.parse().ok()
}

fn string_literal(expr: &Expr) -> Option<&str> {
    match expr {
        Expr::Value(value) => match &value.value {
            SqlLiteral::SingleQuotedString(text) => Some(text),
            _ => None,
        },
        _ => None,
    }
}

/// The JSON path addressed by `data->'a'->>'b'` or `JSON_VALUE(data, '$.a.b')`.
fn field_path(expr: &Expr) -> Option<Vec<String>> {
    match expr {
        Expr::Nested(inner) => field_path(inner),
        Expr::BinaryOp { left, op: BinaryOperator::Arrow | BinaryOperator::LongArrow, right } => {
            let mut path = match column_of(left) {
                Some(Column::Data) => Vec::new(),
                Some(Column::Key) => return None,
                None => field_path(left)?,
            };
            path.push(string_literal(right)?.to_string());
            Some(path)
        }
        Expr::Function(function)
            if table_name(&function.name).as_deref() == Some("json_value") =>
        {
            let FunctionArguments::List(list) = &function.args else {
                return None;
            };

            let args = list
                .args
                .iter()
                .map(|arg| match arg {
                    FunctionArg::Unnamed(FunctionArgExpr::Expr(expr)) => Some(expr),
                    _ => None,
                })
                .collect::<Option<Vec<_>>>()?;

            match args.as_slice() {
                [column, path] if column_of(column) == Some(Column::Data) => {
                    let path = string_literal(path)?.strip_prefix("$.")?;
                    Some(path.split('.').map(str::to_string).collect())
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn param_at(params: &[SqlValue], position: usize) -> DocumentStoreResult<&SqlValue> {
    position
        .checked_sub(1)
        .and_then(|index| params.get(index))
        .ok_or_else(|| {
            DocumentStoreError::Backend(format!("there is no parameter at position {position}"))
        })
}

/// SQL equality, with text comparison across value kinds the way a server coerces literals.
fn same_value(left: &SqlValue, right: &SqlValue) -> bool {
    match (left, right) {
        (SqlValue::Null, _) | (_, SqlValue::Null) => false,
        (left, right) => left == right || left.to_string() == right.to_string(),
    }
}
