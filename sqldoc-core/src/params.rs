//! Named query parameters and their translation into positional placeholders.
//!
//! Caller-supplied SQL names its parameters `:name` or `@name`. Before the text reaches a
//! backend every such placeholder is rewritten into the dialect's positional form (`$1` for
//! PostgreSQL, `@P1` for SQL Server) and the values are laid out in placeholder order.
//!
//! Placeholders are found with the dialect's `sqlparser` tokenizer, so these are left alone:
//!
//! - string literals, including PostgreSQL `E'...'` escape strings and `$$...$$` bodies
//! - quoted identifiers (`"..."`, `[...]`)
//! - line (`-- ...`) and block (`/* ... */`) comments
//! - PostgreSQL casts (`::jsonb`) and SQL Server globals (`@@ROWCOUNT`)
//!
//! # Example
//!
//! ```ignore
//! use sqldoc::params::Parameters;
//!
//! let params = Parameters::new().bind("id", "p1");
//! let (sql, values) = params.bind_to(
//!     "select data from Person where data->>'_id' = :id",
//!     Dialect::PostgresJson,
//! )?;
//! assert_eq!(sql, "select data from Person where data->>'_id' = $1");
//! ```

use std::collections::HashMap;

use sqlparser::tokenizer::{Location, Token, TokenWithSpan, Tokenizer};
use tracing::debug;

use crate::{
    error::{DocumentStoreError, DocumentStoreResult},
    statement::{SqlValue, Statement},
    target::Dialect,
};

/// An ordered mapping from parameter name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    values: Vec<(String, SqlValue)>,
}

impl Parameters {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` to `name`, replacing any earlier binding of the same name.
    ///
    /// A leading `:` or `@` on the name is ignored.
    pub fn bind(mut self, name: impl AsRef<str>, value: impl Into<SqlValue>) -> Self {
        self.insert(name, value);
        self
    }

    /// In-place variant of [`Parameters::bind`].
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<SqlValue>) {
        let name = strip_sigil(name.as_ref()).to_string();
        let value = value.into();

        match self.values.iter_mut().find(|(n, _)| *n == name) {
            Some(slot) => slot.1 = value,
            None => self.values.push((name, value)),
        }
    }

    /// Looks up the value bound to `name`.
    pub fn get(&self, name: &str) -> Option<&SqlValue> {
        let name = strip_sigil(name);
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Rewrites the named placeholders in `sql` for `dialect` and orders the values to match.
    ///
    /// Text the dialect's tokenizer cannot split is sent unchanged, so the backend reports
    /// the syntax error itself.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnboundParameter`] when the text names a parameter that
    /// has no value.
    pub fn bind_to(
        &self,
        sql: &str,
        dialect: Dialect,
    ) -> DocumentStoreResult<(String, Vec<SqlValue>)> {
        let tokens = match Tokenizer::new(dialect.sql_dialect(), sql).tokenize_with_location() {
            Ok(tokens) => tokens,
            Err(err) => {
                debug!(%dialect, error = %err, "query text not tokenized, sending it unchanged");
                return Ok((sql.to_string(), Vec::new()));
            }
        };

        let offsets = Offsets::new(sql);
        let mut out = String::with_capacity(sql.len());
        let mut order: Vec<String> = Vec::new();
        let mut values = Vec::new();
        let mut copied = 0;
        let mut i = 0;

        while i < tokens.len() {
            let Some((name, width)) = placeholder_at(&tokens[i..]) else {
                i += 1;
                continue;
            };

            let start = offsets.at(tokens[i].span.start);
            let end = offsets.at(tokens[i + width - 1].span.end);

            let position = match order.iter().position(|n| *n == name) {
                Some(p) => p + 1,
                None => {
                    let value = self
                        .get(&name)
                        .cloned()
                        .ok_or_else(|| DocumentStoreError::UnboundParameter(name.clone()))?;
                    order.push(name);
                    values.push(value);
                    order.len()
                }
            };

            out.push_str(&sql[copied..start]);
            out.push_str(&dialect.placeholder(position));
            copied = end;
            i += width;
        }

        out.push_str(&sql[copied..]);
        Ok((out, values))
    }

    /// Builds a query statement from caller SQL.
    pub fn to_statement(&self, sql: &str, dialect: Dialect) -> DocumentStoreResult<Statement> {
        let (sql, params) = self.bind_to(sql, dialect)?;
        Ok(Statement::query(sql, params))
    }
}

impl<N: AsRef<str>, V: Into<SqlValue>> FromIterator<(N, V)> for Parameters {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        let mut params = Parameters::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

impl<V: Into<SqlValue>> From<HashMap<String, V>> for Parameters {
    fn from(map: HashMap<String, V>) -> Self {
        map.into_iter().collect()
    }
}

fn strip_sigil(name: &str) -> &str {
    name.strip_prefix([':', '@']).unwrap_or(name)
}

/// Recognizes a named placeholder at the head of `tokens`, returning its name and how many
/// tokens it spans.
///
/// Depending on the dialect `:name` and `@name` arrive as a sigil token followed by a word,
/// as a single `@name` word, or as a placeholder token. `@@name` globals and quoted
/// identifiers never match.
fn placeholder_at(tokens: &[TokenWithSpan]) -> Option<(String, usize)> {
    let plain = |token: Option<&TokenWithSpan>| match token.map(|t| &t.token) {
        Some(Token::Word(word)) if word.quote_style.is_none() && is_name(&word.value) => {
            Some(word.value.clone())
        }
        _ => None,
    };

    match &tokens.first()?.token {
        Token::Colon | Token::AtSign => plain(tokens.get(1)).map(|name| (name, 2)),
        Token::Placeholder(text) => text
            .strip_prefix([':', '@'])
            .filter(|name| is_name(name))
            .map(|name| (name.to_string(), 1)),
        Token::Word(word) if word.quote_style.is_none() => word
            .value
            .strip_prefix('@')
            .filter(|name| is_name(name))
            .map(|name| (name.to_string(), 1)),
        _ => None,
    }
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next().is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Maps tokenizer locations (1-based line and character column) to byte offsets.
struct Offsets<'a> {
    sql: &'a str,
    lines: Vec<usize>,
}

impl<'a> Offsets<'a> {
    fn new(sql: &'a str) -> Self {
        let lines = std::iter::once(0)
            .chain(sql.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self { sql, lines }
    }

    fn at(&self, location: Location) -> usize {
        let line = (location.line as usize).saturating_sub(1);
        let column = (location.column as usize).saturating_sub(1);

        match self.lines.get(line) {
            Some(&start) => self.sql[start..]
                .char_indices()
                .nth(column)
                .map_or(self.sql.len(), |(i, _)| start + i),
            None => self.sql.len(),
        }
    }
}
