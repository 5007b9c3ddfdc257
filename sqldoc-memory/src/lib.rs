//! In-memory statement executor for sqldoc.
//!
//! This crate provides a thread-safe, in-memory implementation of the `Executor` trait.
//! It uses async-aware read-write locks for concurrent access and is meant for development
//! and tests that should not need a database server.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Any dialect** - Runs the statements of whichever target it is built with
//! - **Atomic batches** - A failed commit leaves the tables untouched
//! - **Simple queries** - Key lookups and JSON field equality in caller SQL
//!
//! # Quick Start
//!
//! ```ignore
//! use sqldoc::{prelude::*, memory::InMemoryExecutor};
//! use serde::{Serialize, Deserialize};
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
//!     session.store(1i64, Person { name: "Ernesto".into(), age: 31 })?;
//!     session.save_changes().await?;
//!
//!     let person: Person = session.load(1).await?;
//!     assert_eq!(person.age, 31);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as sqldoc_memory;

pub mod store;
mod evaluator;

pub use store::{InMemoryExecutor, InMemoryExecutorBuilder};
