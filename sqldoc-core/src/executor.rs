//! Backend abstraction executing dialect statements.
//!
//! This module defines the seam between the session layer and a database driver. An
//! [`Executor`] runs statements written in the dialect of its [`StoreTarget`]; it never builds
//! SQL itself and never decides how payloads are encoded.
//!
//! # Traits
//!
//! - [`Executor`]: runs statement batches and row-returning statements
//! - [`ExecutorBuilder`]: factory trait for creating executor instances
//!
//! # Connections
//!
//! Executors acquire a connection for the duration of one call to [`Executor::execute_batch`]
//! or [`Executor::fetch`] and release it on every exit path, including errors. No connection
//! is held between calls.

use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::DocumentStoreResult,
    statement::{SqlValue, Statement},
    target::StoreTarget,
};

/// How much of a failed batch may already have taken effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommitGuarantee {
    /// The batch runs in one transaction; a failure leaves the backend untouched.
    Atomic,
    /// Statements are applied one by one; statements before the failing one stay applied.
    PerStatement,
}

/// One row returned by a query.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// The value of the row's key column, when the query selected one.
    pub key: Option<SqlValue>,
    /// The encoded payload, or `None` when the column was SQL `NULL`.
    pub payload: Option<String>,
}

impl Row {
    pub fn new(key: Option<SqlValue>, payload: Option<String>) -> Self {
        Self { key, payload }
    }
}

/// Abstract interface for statement executors.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`. Several sessions may share one executor; the
/// executor provides no ordering between their calls beyond what the backend does.
///
/// # Error Handling
///
/// Driver failures are returned as [`DocumentStoreError::Backend`](crate::error::DocumentStoreError::Backend)
/// carrying the driver's message unmodified. Executors never retry.
#[async_trait]
pub trait Executor: Send + Sync + Debug {
    /// Returns the target this executor talks to.
    fn target(&self) -> &StoreTarget;

    /// Returns the partial-failure guarantee of [`Executor::execute_batch`].
    fn guarantee(&self) -> CommitGuarantee;

    /// Runs `statements` in order as one unit and returns the total number of affected rows.
    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64>;

    /// Runs a row-returning statement and returns its rows in backend order.
    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>>;

    /// Releases every resource the executor holds.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DocumentStoreResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<E> Executor for &E
where
    E: Executor + ?Sized,
{
    fn target(&self) -> &StoreTarget {
        (**self).target()
    }

    fn guarantee(&self) -> CommitGuarantee {
        (**self).guarantee()
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        (**self).execute_batch(statements).await
    }

    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        (**self).fetch(statement).await
    }
}

#[async_trait]
impl<E> Executor for Box<E>
where
    E: Executor + ?Sized,
{
    fn target(&self) -> &StoreTarget {
        (**self).target()
    }

    fn guarantee(&self) -> CommitGuarantee {
        (**self).guarantee()
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        (**self).execute_batch(statements).await
    }

    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        (**self).fetch(statement).await
    }
}

#[async_trait]
impl<E> Executor for Arc<E>
where
    E: Executor + ?Sized,
{
    fn target(&self) -> &StoreTarget {
        (**self).target()
    }

    fn guarantee(&self) -> CommitGuarantee {
        (**self).guarantee()
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        (**self).execute_batch(statements).await
    }

    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        (**self).fetch(statement).await
    }
}

/// Factory trait for creating executors.
#[async_trait]
pub trait ExecutorBuilder {
    type Executor: Executor;

    async fn build(self) -> DocumentStoreResult<Self::Executor>;
}
