//! Main sqldoc crate: a document session layer over relational databases.
//!
//! This crate is the primary entry point for users of sqldoc. It re-exports the core types
//! and functionality from the sub-crates and gives access to the executors of every
//! supported backend.
//!
//! # Features
//!
//! - **Typed documents** - Define your data structures with Serde and store them as JSON or XML
//! - **Unit of work** - Queue inserts, updates and deletes and commit them in order as one batch
//! - **Multiple backends** - PostgreSQL (`jsonb`), SQL Server (`XML` or `NVARCHAR(MAX)`) and in-memory
//! - **Parameterized queries** - Plain SQL with `:name` / `@name` parameters, decoded into typed values
//!
//! # Quick Start
//!
//! ```ignore
//! use sqldoc::{prelude::*, memory::InMemoryExecutor};
//! use serde::{Serialize, Deserialize};
//! use uuid::Uuid;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! pub struct Person {
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let executor = InMemoryExecutor::builder().build().await?;
//!     let mut session = DocumentSession::new(executor);
//!
//!     // Queue a few operations; nothing reaches the backend yet
//!     let id = Uuid::new_v4();
//!     session.store(id, Person { name: "Ernesto".into(), age: 31 })?;
//!     session.update(id, Person { name: "Ernesto".into(), age: 32 })?;
//!
//!     // Commit them in order
//!     session.save_changes().await?;
//!
//!     // Read back
//!     let person: Person = session.load(id).await?;
//!     let adults: Vec<Person> = session
//!         .query("select data from Person", Parameters::new())
//!         .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! # Choosing a backend at runtime
//!
//! A [`StoreTarget`](target::StoreTarget) can be built from free-form text, and sessions can
//! be boxed over any executor:
//!
//! ```ignore
//! use sqldoc::prelude::*;
//!
//! let target = StoreTarget::from_backend(&settings.backend, &settings.connection_string)?;
//! let executor: Box<dyn Executor> = match target.backend() {
//!     Backend::Postgres => Box::new(sqldoc::postgres::PostgresExecutor::builder(target).build().await?),
//!     _ => Box::new(sqldoc::mssql::MssqlExecutor::builder(target).build().await?),
//! };
//! let session: DynDocumentSession<Uuid> = DocumentSession::new(executor);
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory tables for development and testing
//! - [`postgres`] - PostgreSQL over `sqlx` (requires `postgres` feature)
//! - [`mssql`] - SQL Server over `tiberius` (requires `mssql` feature)

#[allow(unused_extern_crates)]
extern crate self as sqldoc;

pub mod prelude;

pub use sqldoc_core::{
    codec, document, error, executor, operation, params, query, session, statement, target,
    unit_of_work,
};

// Re-exported for implementing `Executor` outside this workspace
pub use async_trait::async_trait;

/// In-memory executor implementations.
pub mod memory {
    pub use sqldoc_memory::{InMemoryExecutor, InMemoryExecutorBuilder};
}

/// PostgreSQL executor implementations.
///
/// This module is only available when the `postgres` feature is enabled.
#[cfg(feature = "postgres")]
pub mod postgres {
    pub use sqldoc_postgres::{PostgresExecutor, PostgresExecutorBuilder};
}

/// SQL Server executor implementations.
///
/// This module is only available when the `mssql` feature is enabled.
#[cfg(feature = "mssql")]
pub mod mssql {
    pub use sqldoc_mssql::{MssqlExecutor, MssqlExecutorBuilder};
}
