//! Backend selection and SQL dialect routing.
//!
//! A [`StoreTarget`] tags a connection string with the backend family it points at. It is
//! immutable once built and fully determines the [`Dialect`] of every statement run against
//! it: the payload encoding, the placeholder syntax and the statement text.
//!
//! # Example
//!
//! ```ignore
//! use sqldoc::target::{StoreTarget, Dialect};
//!
//! let target = StoreTarget::postgres("postgres://localhost/docs");
//! assert_eq!(target.dialect(), Dialect::PostgresJson);
//!
//! // Free-form discriminators, e.g. from a configuration file
//! let target = StoreTarget::from_backend("mssql-generic", "server=tcp:localhost,1433")?;
//! assert_eq!(target.dialect(), Dialect::SqlServerGeneric);
//! ```

use serde::{Deserialize, Serialize};
use sqlparser::dialect::{MsSqlDialect, PostgreSqlDialect};
use std::{fmt, str::FromStr};

use crate::{
    codec::Encoding,
    error::{DocumentStoreError, DocumentStoreResult},
};

/// How documents are laid out in a SQL Server table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlServerMode {
    /// Payloads are XML fragments stored in an `XML` column.
    XmlColumn,
    /// Payloads are JSON text stored in an `NVARCHAR(MAX)` column.
    GenericColumn,
}

/// An immutable backend selector carrying exactly one connection string.
///
/// The connection string is never inspected here; validating it is the driver's job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum StoreTarget {
    /// A PostgreSQL database storing payloads in a JSON-capable column.
    Postgres {
        /// The driver connection string.
        connection_string: String,
    },
    /// A SQL Server database.
    SqlServer {
        /// Which column layout the tables use.
        mode: SqlServerMode,
        /// The driver connection string.
        connection_string: String,
    },
}

impl StoreTarget {
    /// Targets a PostgreSQL database using the JSON dialect.
    pub fn postgres(connection_string: impl Into<String>) -> Self {
        StoreTarget::Postgres { connection_string: connection_string.into() }
    }

    /// Targets a SQL Server database whose tables store XML payloads.
    pub fn sql_server_xml(connection_string: impl Into<String>) -> Self {
        StoreTarget::SqlServer {
            mode: SqlServerMode::XmlColumn,
            connection_string: connection_string.into(),
        }
    }

    /// Targets a SQL Server database whose tables store JSON text payloads.
    pub fn sql_server_generic(connection_string: impl Into<String>) -> Self {
        StoreTarget::SqlServer {
            mode: SqlServerMode::GenericColumn,
            connection_string: connection_string.into(),
        }
    }

    /// Builds a target from a free-form backend discriminator.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedBackend`] when `backend` names no known backend.
    pub fn from_backend(
        backend: &str,
        connection_string: impl Into<String>,
    ) -> DocumentStoreResult<Self> {
        Ok(Self::new(backend.parse()?, connection_string))
    }

    /// Builds a target for an already parsed [`Backend`].
    pub fn new(backend: Backend, connection_string: impl Into<String>) -> Self {
        match backend {
            Backend::Postgres => Self::postgres(connection_string),
            Backend::SqlServerXml => Self::sql_server_xml(connection_string),
            Backend::SqlServerGeneric => Self::sql_server_generic(connection_string),
        }
    }

    /// Returns the backend family of this target.
    pub fn backend(&self) -> Backend {
        match self {
            StoreTarget::Postgres { .. } => Backend::Postgres,
            StoreTarget::SqlServer { mode: SqlServerMode::XmlColumn, .. } => Backend::SqlServerXml,
            StoreTarget::SqlServer { mode: SqlServerMode::GenericColumn, .. } => {
                Backend::SqlServerGeneric
            }
        }
    }

    /// Returns the dialect every statement against this target is written in.
    pub fn dialect(&self) -> Dialect {
        match self.backend() {
            Backend::Postgres => Dialect::PostgresJson,
            Backend::SqlServerXml => Dialect::SqlServerXml,
            Backend::SqlServerGeneric => Dialect::SqlServerGeneric,
        }
    }

    /// Returns the connection string this target was built with.
    pub fn connection_string(&self) -> &str {
        match self {
            StoreTarget::Postgres { connection_string }
            | StoreTarget::SqlServer { connection_string, .. } => connection_string,
        }
    }
}

/// A free-form backend discriminator, parsed case-insensitively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Backend {
    Postgres,
    SqlServerXml,
    SqlServerGeneric,
}

impl FromStr for Backend {
    type Err = DocumentStoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Backend::Postgres),
            "sqlserver" | "mssql" | "sqlserver-xml" | "mssql-xml" => Ok(Backend::SqlServerXml),
            "sqlserver-generic" | "mssql-generic" => Ok(Backend::SqlServerGeneric),
            _ => Err(DocumentStoreError::UnsupportedBackend(s.to_string())),
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Backend::Postgres => "postgres",
            Backend::SqlServerXml => "sqlserver-xml",
            Backend::SqlServerGeneric => "sqlserver-generic",
        })
    }
}

/// The SQL syntax and payload encoding used against one backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dialect {
    /// PostgreSQL with a `jsonb` payload column.
    PostgresJson,
    /// SQL Server with an `XML` payload column.
    SqlServerXml,
    /// SQL Server with an `NVARCHAR(MAX)` column holding JSON text.
    SqlServerGeneric,
}

impl Dialect {
    /// Returns the payload encoding for this dialect.
    pub fn encoding(self) -> Encoding {
        match self {
            Dialect::PostgresJson => Encoding::Json,
            Dialect::SqlServerXml => Encoding::Xml,
            Dialect::SqlServerGeneric => Encoding::Json,
        }
    }

    /// Returns the positional placeholder for the 1-based parameter `index`.
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::PostgresJson => format!("${index}"),
            Dialect::SqlServerXml | Dialect::SqlServerGeneric => format!("@P{index}"),
        }
    }

    /// Returns the key column name as it appears in statement text.
    pub fn key_column(self) -> &'static str {
        match self {
            Dialect::PostgresJson => "id",
            Dialect::SqlServerXml | Dialect::SqlServerGeneric => "[Id]",
        }
    }

    /// Returns the payload column name as it appears in statement text.
    pub fn data_column(self) -> &'static str {
        match self {
            Dialect::PostgresJson => "data",
            Dialect::SqlServerXml | Dialect::SqlServerGeneric => "[Data]",
        }
    }

    /// Returns the `sqlparser` dialect used to read statement text written for this dialect.
    pub fn sql_dialect(self) -> &'static dyn sqlparser::dialect::Dialect {
        match self {
            Dialect::PostgresJson => &PostgreSqlDialect {},
            Dialect::SqlServerXml | Dialect::SqlServerGeneric => &MsSqlDialect {},
        }
    }

    /// Returns the placeholder for the payload parameter at `index`, with any cast it needs.
    pub(crate) fn payload_placeholder(self, index: usize) -> String {
        match self {
            Dialect::PostgresJson => format!("{}::jsonb", self.placeholder(index)),
            Dialect::SqlServerXml | Dialect::SqlServerGeneric => self.placeholder(index),
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dialect::PostgresJson => "postgres-json",
            Dialect::SqlServerXml => "sqlserver-xml",
            Dialect::SqlServerGeneric => "sqlserver-generic",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constructors_tag_dialect() {
        assert_eq!(StoreTarget::postgres("pg").dialect(), Dialect::PostgresJson);
        assert_eq!(StoreTarget::sql_server_xml("ss").dialect(), Dialect::SqlServerXml);
        assert_eq!(StoreTarget::sql_server_generic("ss").dialect(), Dialect::SqlServerGeneric);
        assert_eq!(StoreTarget::sql_server_xml("server=x").connection_string(), "server=x");
    }

    #[test]
    fn backend_parses_case_insensitively() {
        assert_eq!("PostgreSQL".parse::<Backend>().unwrap(), Backend::Postgres);
        assert_eq!(" mssql ".parse::<Backend>().unwrap(), Backend::SqlServerXml);
        assert_eq!("MSSQL-Generic".parse::<Backend>().unwrap(), Backend::SqlServerGeneric);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let err = StoreTarget::from_backend("oracle", "conn").unwrap_err();
        assert!(matches!(err, DocumentStoreError::UnsupportedBackend(name) if name == "oracle"));
    }

    #[test]
    fn target_deserializes_from_tagged_config() {
        let target: StoreTarget = serde_json::from_str(
            r#"{"backend": "sql_server", "mode": "generic_column", "connection_string": "server=db"}"#,
        )
        .unwrap();
        assert_eq!(target, StoreTarget::sql_server_generic("server=db"));

        let target: StoreTarget =
            serde_json::from_str(r#"{"backend": "postgres", "connection_string": "postgres://db"}"#)
                .unwrap();
        assert_eq!(target.backend(), Backend::Postgres);
    }

    #[test]
    fn placeholders_follow_dialect() {
        assert_eq!(Dialect::PostgresJson.placeholder(2), "$2");
        assert_eq!(Dialect::SqlServerXml.placeholder(2), "@P2");
        assert_eq!(Dialect::PostgresJson.payload_placeholder(1), "$1::jsonb");
        assert_eq!(Dialect::SqlServerGeneric.payload_placeholder(1), "@P1");
    }
}
