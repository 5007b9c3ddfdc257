//! In-memory executor for document sessions.
//!
//! This module provides a simple backend that keeps every table as an ordered list of
//! key/payload rows behind an async-safe read-write lock. It runs the statements a session
//! generates and a small subset of caller SQL (see [`crate::evaluator`]).

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use mea::rwlock::RwLock;
use tracing::debug;

use sqldoc_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    executor::{CommitGuarantee, Executor, ExecutorBuilder, Row},
    statement::{Command, SqlValue, Statement},
    target::StoreTarget,
};

use crate::evaluator::parse_select;

/// One stored row: the key column and the encoded payload column.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct StoredRow {
    pub key: SqlValue,
    pub payload: String,
}

/// Table name (lowercased) -> rows in insertion order.
type TableMap = HashMap<String, Vec<StoredRow>>;


/// Thread-safe in-memory statement executor.
///
/// Tables spring into existence on their first insert. Keys are unique per table: inserting
/// a key twice fails the way a primary key violation would. Updates and deletes that match
/// nothing affect zero rows and succeed.
///
/// # Thread Safety
///
/// `InMemoryExecutor` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying tables.
///
/// # Atomicity
///
/// A batch is applied to a staged copy of the tables and swapped in only when every
/// statement succeeded, so a failed commit leaves nothing behind.
///
/// # Example
///
/// ```ignore
/// use sqldoc_memory::InMemoryExecutor;
/// use sqldoc::prelude::*;
///
/// let executor = InMemoryExecutor::builder()
///     .target(StoreTarget::sql_server_xml("memory"))
///     .build()
///     .await?;
/// let mut session = DocumentSession::<i64, _>::new(executor);
/// ```
#[derive(Clone, Debug)]
pub struct InMemoryExecutor {
    target: StoreTarget,
    tables: Arc<RwLock<TableMap>>,
}

impl InMemoryExecutor {
    /// Creates an empty executor speaking the given target's dialect.
    pub fn new(target: StoreTarget) -> Self {
        Self {
            target,
            tables: Arc::new(RwLock::new(TableMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryExecutor`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// use sqldoc_memory::InMemoryExecutor;
    ///
    /// let executor = InMemoryExecutor::builder().build().await.unwrap();
    /// ```
    pub fn builder() -> InMemoryExecutorBuilder {
        InMemoryExecutorBuilder::default()
    }

    /// Returns the `(key, payload)` rows of `table` in insertion order.
    pub async fn rows(&self, table: &str) -> Vec<(SqlValue, String)> {
        self.tables
            .read()
            .await
            .get(&table.to_ascii_lowercase())
            .map(|rows| {
                rows.iter()
                    .map(|row| (row.key.clone(), row.payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}


#[async_trait]
impl Executor for InMemoryExecutor {
    fn target(&self) -> &StoreTarget {
        &self.target
    }

    fn guarantee(&self) -> CommitGuarantee {
        CommitGuarantee::Atomic
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        let mut tables = self.tables.write().await;
        let mut staged = tables.clone();
        let mut affected = 0;

        for statement in &statements {
            affected += apply(&mut staged, statement)?;
        }

        *tables = staged;
        debug!(statements = statements.len(), affected, "in-memory batch applied");

        Ok(affected)
    }

    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        let tables = self.tables.read().await;

        match &statement.command {
            Command::Load { table } => {
                let key = bound(&statement, 0)?;
                Ok(tables
                    .get(&table.to_ascii_lowercase())
                    .into_iter()
                    .flatten()
                    .filter(|row| row.key == *key)
                    .map(|row| Row::new(None, Some(row.payload.clone())))
                    .collect())
            }
            Command::Query => {
                let select = parse_select(&statement.sql, self.target.dialect())?;
                let mut rows = Vec::new();

                for row in tables.get(&select.table).into_iter().flatten() {
                    let keep = match &select.filter {
                        Some(filter) => filter.matches(row, &statement.params)?,
                        None => true,
                    };

                    if keep {
                        let key = select.with_key.then(|| row.key.clone());
                        rows.push(Row::new(key, Some(row.payload.clone())));
                    }
                }

                Ok(rows)
            }
            Command::Insert { .. } | Command::Update { .. } | Command::Delete { .. } => Err(
                DocumentStoreError::Backend(format!("statement returns no rows: {}", statement.sql)),
            ),
        }
    }
}

/// Applies one mutation to `tables` and returns the number of affected rows.
fn apply(tables: &mut TableMap, statement: &Statement) -> DocumentStoreResult<u64> {
    match &statement.command {
        Command::Insert { table } => {
            let key = bound(statement, 0)?;
            let payload = payload(statement, 1)?;
            let rows = tables.entry(table.to_ascii_lowercase()).or_default();

            if rows.iter().any(|row| row.key == *key) {
                return Err(DocumentStoreError::Backend(format!(
                    "duplicate key value violates unique constraint on \"{table}\": Key (id)=({key}) already exists"
                )));
            }

            rows.push(StoredRow { key: key.clone(), payload });
            Ok(1)
        }
        Command::Update { table } => {
            let payload = payload(statement, 0)?;
            let key = bound(statement, 1)?;
            let mut affected = 0;

            if let Some(rows) = tables.get_mut(&table.to_ascii_lowercase()) {
                for row in rows.iter_mut().filter(|row| row.key == *key) {
                    row.payload = payload.clone();
                    affected += 1;
                }
            }

            Ok(affected)
        }
        Command::Delete { table } => {
            let key = bound(statement, 0)?;

            Ok(match tables.get_mut(&table.to_ascii_lowercase()) {
                Some(rows) => {
                    let before = rows.len();
                    rows.retain(|row| row.key != *key);
                    (before - rows.len()) as u64
                }
                None => 0,
            })
        }
        Command::Load { .. } | Command::Query => Err(DocumentStoreError::Backend(format!(
            "in-memory executor only applies mutations in a batch: {}",
            statement.sql
        ))),
    }
}

fn bound(statement: &Statement, index: usize) -> DocumentStoreResult<&SqlValue> {
    statement.params.get(index).ok_or_else(|| {
        DocumentStoreError::Backend(format!(
            "statement expects parameter {}: {}",
            index + 1,
            statement.sql
        ))
    })
}

fn payload(statement: &Statement, index: usize) -> DocumentStoreResult<String> {
    match bound(statement, index)? {
        SqlValue::Text(text) => Ok(text.clone()),
        other => Err(DocumentStoreError::Backend(format!(
            "payload parameter must be text, got {other}"
        ))),
    }
}


/// Builder for constructing [`InMemoryExecutor`] instances.
///
/// The target decides the dialect (and therefore the payload encoding) sessions use against
/// the executor; its connection string is ignored. Defaults to Postgres-JSON.
///
/// # Example
///
/// ```ignore
/// use sqldoc_memory::InMemoryExecutor;
/// use sqldoc::executor::ExecutorBuilder;
///
/// let executor = InMemoryExecutor::builder().build().await.unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct InMemoryExecutorBuilder {
    target: StoreTarget,
}

impl Default for InMemoryExecutorBuilder {
    fn default() -> Self {
        Self { target: StoreTarget::postgres("memory") }
    }
}

impl InMemoryExecutorBuilder {
    pub fn target(mut self, target: StoreTarget) -> Self {
        self.target = target;
        self
    }
}

#[async_trait]
impl ExecutorBuilder for InMemoryExecutorBuilder {
    type Executor = InMemoryExecutor;

    /// Builds and returns a new, empty [`InMemoryExecutor`].
    ///
    /// This always succeeds.
    async fn build(self) -> DocumentStoreResult<Self::Executor> {
        Ok(InMemoryExecutor::new(self.target))
    }
}
