//! Convenient re-exports of commonly used types from sqldoc.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use sqldoc::prelude::*;
//! ```
//!
//! This provides access to:
//! - Document traits and the `Document` derive
//! - Store targets and dialects
//! - Sessions, parameters and executor traits
//! - Error types

pub use sqldoc_core::{
    document::{Document, DocumentKey},
    target::{StoreTarget, SqlServerMode, Backend, Dialect},
    session::{DocumentSession, DynDocumentSession, QuerySession},
    params::Parameters,
    executor::{Executor, ExecutorBuilder, CommitGuarantee},
    unit_of_work::CommitReport,
    error::{DocumentStoreError, DocumentStoreResult},
};

pub use sqldoc_macros::Document;
