//! Caller-facing document sessions.
//!
//! A [`DocumentSession`] is bound to one executor (and therefore one [`StoreTarget`]) for its
//! whole life. Mutations are queued in memory and sent together by
//! [`DocumentSession::save_changes`]; reads go straight to the backend and never see queued
//! operations.
//!
//! Sessions are single-owner: mutating calls take `&mut self`, so sharing one session across
//! tasks needs external synchronization. Independent sessions may run concurrently against
//! the same backend.
//!
//! # Example
//!
//! ```ignore
//! use sqldoc::prelude::*;
//!
//! let mut session = DocumentSession::new(executor);
//! session.store(person.id, person.clone())?;
//! session.save_changes().await?;
//!
//! let fresh: Person = session.load(person.id).await?;
//! ```

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    document::{Document, DocumentKey},
    error::{DocumentStoreError, DocumentStoreResult},
    executor::Executor,
    operation::{Operation, Verb},
    params::Parameters,
    query::{QueryEngine, decode_row},
    statement::Statement,
    target::StoreTarget,
    unit_of_work::{CommitReport, UnitOfWork},
};

/// The read side of a session.
#[async_trait]
pub trait QuerySession<K: DocumentKey>: Send + Sync {
    /// Loads the single document of type `T` stored under `key`.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::NotFound`] if no row has the key
    /// - [`DocumentStoreError::Ambiguous`] if more than one row has the key
    /// - [`DocumentStoreError::Decode`] if the row does not decode into `T`
    async fn load<T: Document>(&self, key: K) -> DocumentStoreResult<T>;

    /// Runs caller SQL with named parameters and decodes each row into a `T`.
    async fn query<T: DeserializeOwned + Send>(
        &self,
        sql: &str,
        parameters: Parameters,
    ) -> DocumentStoreResult<Vec<T>>;
}

/// A unit of work and a query engine over one executor.
#[derive(Debug)]
pub struct DocumentSession<K: DocumentKey, E: Executor> {
    executor: E,
    unit_of_work: UnitOfWork<K>,
}

/// A session over a runtime-selected executor.
pub type DynDocumentSession<K> = DocumentSession<K, Box<dyn Executor>>;

impl<K: DocumentKey, E: Executor> DocumentSession<K, E> {
    /// Creates a session with an empty queue.
    pub fn new(executor: E) -> Self {
        Self { executor, unit_of_work: UnitOfWork::new() }
    }

    /// Returns the target every statement of this session runs against.
    pub fn target(&self) -> &StoreTarget {
        self.executor.target()
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    /// Queues an insert of `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ContractViolation`] if `value` is an empty payload.
    pub fn store<D: Document>(&mut self, key: K, value: D) -> DocumentStoreResult<()> {
        self.enqueue(Operation::new(key, Verb::Insert, value)?);
        Ok(())
    }

    /// Queues a replacement of the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ContractViolation`] if `value` is an empty payload.
    pub fn update<D: Document>(&mut self, key: K, value: D) -> DocumentStoreResult<()> {
        self.enqueue(Operation::new(key, Verb::Update, value)?);
        Ok(())
    }

    /// Queues the deletion of the document stored under `key`.
    ///
    /// `datum` is the last known version of the document; its type names the table.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ContractViolation`] if `datum` is an empty payload.
    pub fn delete<D: Document>(&mut self, key: K, datum: D) -> DocumentStoreResult<()> {
        self.enqueue(Operation::new(key, Verb::Delete, datum)?);
        Ok(())
    }

    /// Returns the number of queued operations.
    pub fn pending(&self) -> usize {
        self.unit_of_work.len()
    }

    /// Drops every queued operation without contacting the backend.
    pub fn discard_changes(&mut self) {
        self.unit_of_work.clear();
    }

    /// Sends every queued operation to the backend as one unit.
    ///
    /// The queue is empty afterwards, whether the commit succeeded or not. See
    /// [`CommitGuarantee`](crate::executor::CommitGuarantee) for what a failure leaves behind.
    pub async fn save_changes(&mut self) -> DocumentStoreResult<CommitReport> {
        self.unit_of_work.commit(&self.executor).await
    }

    fn enqueue(&mut self, operation: Operation<K>) {
        debug!(
            verb = %operation.verb(),
            table = operation.table(),
            key = %operation.key(),
            pending = self.unit_of_work.len() + 1,
            "queued operation"
        );
        self.unit_of_work.enqueue(operation);
    }
}

#[async_trait]
impl<K: DocumentKey, E: Executor> QuerySession<K> for DocumentSession<K, E> {
    async fn load<T: Document>(&self, key: K) -> DocumentStoreResult<T> {
        let target = self.executor.target();
        let table = T::table_name();
        let statement = Statement::load(target.dialect(), table, key.to_sql_value())?;

        let mut rows = self
            .executor
            .fetch(statement)
            .await
            .inspect_err(|err| warn!(dialect = %target.dialect(), table, error = %err, "load failed"))?;

        match rows.len() {
            0 => Err(DocumentStoreError::NotFound {
                table: table.to_string(),
                key: key.to_string(),
            }),
            1 => {
                let mut row = rows.remove(0);
                row.key.get_or_insert_with(|| key.to_sql_value());
                decode_row(target.dialect().encoding(), row)
            }
            count => Err(DocumentStoreError::Ambiguous {
                table: table.to_string(),
                key: key.to_string(),
                count,
            }),
        }
    }

    async fn query<T: DeserializeOwned + Send>(
        &self,
        sql: &str,
        parameters: Parameters,
    ) -> DocumentStoreResult<Vec<T>> {
        QueryEngine::new(&self.executor)
            .query(sql, parameters)
            .await
    }
}
