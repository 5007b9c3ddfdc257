//! A thin document-store client layer over SQL databases.
//!
//! Application values are serialized into a single payload column and addressed by a key
//! column. This crate is the core of the sqldoc project and provides:
//!
//! - **Backend selection** ([`target`]) - Store targets and the SQL dialects they imply
//! - **Payload codecs** ([`codec`]) - JSON and XML encodings of documents
//! - **Document traits** ([`document`]) - Table naming, keys and type-erased payloads
//! - **Operations** ([`operation`]) - Pending insert, update and delete requests
//! - **Statements** ([`statement`]) - Dialect SQL text with positional parameters
//! - **Parameters** ([`params`]) - Named parameters bound into positional placeholders
//! - **Executor abstraction** ([`executor`]) - Traits for implementing database drivers
//! - **Unit of work** ([`unit_of_work`]) - FIFO queues committed as one batch
//! - **Queries** ([`query`]) - Parameterized queries decoded into typed values
//! - **Sessions** ([`session`]) - The caller-facing store, load and query API
//! - **Error handling** ([`error`]) - Error and result types
//!
//! # Example
//!
//! ```ignore
//! use sqldoc::prelude::*;
//! use serde::{Serialize, Deserialize};
//! use uuid::Uuid;
//!
//! #[derive(Debug, Clone, Serialize, Deserialize, Document)]
//! pub struct Person {
//!     pub name: String,
//!     pub age: u32,
//! }
//!
//! let mut session = DocumentSession::new(executor);
//! let id = Uuid::new_v4();
//! session.store(id, Person { name: "Ernesto".into(), age: 31 })?;
//! session.save_changes().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as sqldoc_core;

pub mod codec;
pub mod document;
pub mod error;
pub mod executor;
pub mod operation;
pub mod params;
pub mod query;
pub mod session;
pub mod statement;
pub mod target;
pub mod unit_of_work;
