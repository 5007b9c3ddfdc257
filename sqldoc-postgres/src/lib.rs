//! PostgreSQL executor for sqldoc.
//!
//! Documents live in tables shaped `(id <key type> PRIMARY KEY, data jsonb NOT NULL)`. The
//! executor never creates tables; they are expected to exist before a session writes to them.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqldoc::{prelude::*, postgres::PostgresExecutor};
//!
//! let executor = PostgresExecutor::builder(StoreTarget::postgres("postgres://localhost/docs"))
//!     .max_connections(5)
//!     .build()
//!     .await?;
//!
//! let mut session = DocumentSession::new(executor);
//! ```

#[allow(unused_extern_crates)]
extern crate self as sqldoc_postgres;

pub mod store;

pub use store::{PostgresExecutor, PostgresExecutorBuilder};
