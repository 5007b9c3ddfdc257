//! Ordered queues of pending operations committed as one request.
//!
//! A [`UnitOfWork`] is a FIFO buffer. Committing it drains the whole queue, encodes every
//! payload for the executor's dialect, translates each operation into exactly one statement
//! and hands the statements to the executor as a single batch.
//!
//! Operations are never reordered, merged or deduplicated: inserting, updating and then
//! deleting the same key in one commit issues three statements, in that order, and the row
//! ends up deleted.
//!
//! # Failed commits
//!
//! The queue is empty after a commit whatever the outcome; operations are never retried.
//! What a failure leaves behind in the backend depends on the executor's
//! [`CommitGuarantee`]: an atomic executor rolls the whole batch back, a per-statement
//! executor keeps every statement that ran before the failing one.

use std::collections::VecDeque;
use tracing::{debug, warn};

use crate::{
    document::DocumentKey,
    error::DocumentStoreResult,
    executor::{CommitGuarantee, Executor},
    operation::Operation,
    statement::Statement,
    target::Dialect,
};

/// Summary of a successful commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReport {
    /// Number of statements sent, one per operation.
    pub statements: usize,
    /// Rows the backend reported as affected.
    pub rows_affected: u64,
    /// The guarantee the executor gave for the batch.
    pub guarantee: CommitGuarantee,
}

/// An ordered queue of operations; insertion order is commit order.
#[derive(Debug)]
pub struct UnitOfWork<K: DocumentKey> {
    queue: VecDeque<Operation<K>>,
}

impl<K: DocumentKey> Default for UnitOfWork<K> {
    fn default() -> Self {
        Self { queue: VecDeque::new() }
    }
}

impl<K: DocumentKey> UnitOfWork<K> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an operation to the back of the queue.
    pub fn enqueue(&mut self, operation: Operation<K>) {
        self.queue.push_back(operation);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Iterates over the queued operations in commit order.
    pub fn iter(&self) -> impl Iterator<Item = &Operation<K>> {
        self.queue.iter()
    }

    /// Drops every queued operation without contacting a backend.
    pub fn clear(&mut self) {
        self.queue.clear();
    }

    /// Commits the queued operations through `executor`, leaving the queue empty.
    ///
    /// # Errors
    ///
    /// Returns the first encoding error (nothing is sent in that case) or the executor's error.
    pub async fn commit<E>(&mut self, executor: &E) -> DocumentStoreResult<CommitReport>
    where
        E: Executor + ?Sized,
    {
        let operations = std::mem::take(&mut self.queue);
        commit(executor, operations).await
    }
}

/// Commits `operations` in FIFO order as one batch against `executor`.
///
/// An empty queue commits without contacting the backend.
pub async fn commit<K, E>(
    executor: &E,
    operations: impl IntoIterator<Item = Operation<K>>,
) -> DocumentStoreResult<CommitReport>
where
    K: DocumentKey,
    E: Executor + ?Sized,
{
    let dialect = executor.target().dialect();
    let guarantee = executor.guarantee();

    let statements = operations
        .into_iter()
        .map(|op| to_statement(dialect, &op))
        .collect::<DocumentStoreResult<Vec<_>>>()?;

    if statements.is_empty() {
        return Ok(CommitReport { statements: 0, rows_affected: 0, guarantee });
    }

    let count = statements.len();
    debug!(%dialect, statements = count, ?guarantee, "committing unit of work");

    match executor.execute_batch(statements).await {
        Ok(rows_affected) => {
            debug!(%dialect, statements = count, rows_affected, "unit of work committed");
            Ok(CommitReport { statements: count, rows_affected, guarantee })
        }
        Err(err) => {
            warn!(%dialect, statements = count, ?guarantee, error = %err, "unit of work failed");
            Err(err)
        }
    }
}

fn to_statement<K: DocumentKey>(
    dialect: Dialect,
    operation: &Operation<K>,
) -> DocumentStoreResult<Statement> {
    let payload = operation
        .datum()
        .encode_with(dialect.encoding())?;

    Statement::for_verb(
        dialect,
        operation.verb(),
        operation.table(),
        operation.key().to_sql_value(),
        payload,
    )
}
