//! SQL Server executor for sqldoc.
//!
//! Serves both SQL Server layouts:
//!
//! - **XML column** - `(Id <key type> PRIMARY KEY, Data XML NOT NULL)`, payloads encoded as XML
//! - **Generic column** - `(Id <key type> PRIMARY KEY, Data NVARCHAR(MAX) NOT NULL)`, payloads
//!   encoded as JSON text
//!
//! The layout is chosen by the [`StoreTarget`](sqldoc_core::target::StoreTarget) the executor
//! is built with; the executor itself only moves statements and rows.
//!
//! # Quick Start
//!
//! ```ignore
//! use sqldoc::{prelude::*, mssql::MssqlExecutor};
//!
//! let target = StoreTarget::sql_server_xml(
//!     "server=tcp:localhost,1433;user=sa;password=...;TrustServerCertificate=true",
//! );
//! let executor = MssqlExecutor::builder(target).build().await?;
//! let mut session = DocumentSession::<i64, _>::new(executor);
//! ```

#[allow(unused_extern_crates)]
extern crate self as sqldoc_mssql;

pub mod store;

pub use store::{MssqlExecutor, MssqlExecutorBuilder};
