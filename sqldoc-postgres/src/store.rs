use std::time::Duration;
use async_trait::async_trait;
use futures::TryStreamExt;
use sqlx::{
    Column, Row as _, TypeInfo,
    postgres::{PgArguments, PgPool, PgPoolOptions, PgRow, Postgres},
    query::Query,
};
use tracing::{debug, warn};
use uuid::Uuid;

use sqldoc_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    executor::{CommitGuarantee, Executor, ExecutorBuilder, Row},
    statement::{SqlValue, Statement},
    target::{Backend, StoreTarget},
};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);


/// Executor running Postgres-JSON statements over a `sqlx` connection pool.
///
/// Each batch runs inside one transaction on one pooled connection; a failing statement
/// rolls the whole batch back. Queries borrow a pooled connection for their duration only.
#[derive(Debug, Clone)]
pub struct PostgresExecutor {
    target: StoreTarget,
    pool: PgPool,
}

impl PostgresExecutor {
    /// Wraps an existing pool.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedBackend`] if `target` is not a Postgres target.
    pub fn from_pool(target: StoreTarget, pool: PgPool) -> DocumentStoreResult<Self> {
        ensure_postgres(&target)?;
        Ok(Self { target, pool })
    }

    pub fn builder(target: StoreTarget) -> PostgresExecutorBuilder {
        PostgresExecutorBuilder::new(target)
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Executor for PostgresExecutor {
    fn target(&self) -> &StoreTarget {
        &self.target
    }

    fn guarantee(&self) -> CommitGuarantee {
        CommitGuarantee::Atomic
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        let mut affected = 0;

        // Dropping `tx` on an early return rolls the transaction back.
        for statement in &statements {
            let result = bind(sqlx::query(&statement.sql), &statement.params)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    warn!(sql = %statement.sql, error = %e, "statement failed, rolling back");
                    DocumentStoreError::Backend(e.to_string())
                })?;

            affected += result.rows_affected();
        }

        tx.commit()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        debug!(statements = statements.len(), affected, "postgres transaction committed");

        Ok(affected)
    }

    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        let rows: Vec<PgRow> = bind(sqlx::query(&statement.sql), &statement.params)
            .fetch(&self.pool)
            .try_collect()
            .await
            .map_err(|e| DocumentStoreError::Backend(e.to_string()))?;

        rows.iter().map(to_row).collect()
    }

    async fn shutdown(self) -> DocumentStoreResult<()> {
        self.pool.close().await;
        Ok(())
    }
}

fn ensure_postgres(target: &StoreTarget) -> DocumentStoreResult<()> {
    match target.backend() {
        Backend::Postgres => Ok(()),
        other => Err(DocumentStoreError::UnsupportedBackend(format!(
            "postgres executor cannot serve a {other} target"
        ))),
    }
}

fn bind<'q>(
    mut query: Query<'q, Postgres, PgArguments>,
    params: &'q [SqlValue],
) -> Query<'q, Postgres, PgArguments> {
    for value in params {
        query = match value {
            SqlValue::Null => query.bind(None::<String>),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(*v),
        };
    }

    query
}

/// Reads the payload from the `data` column (else the first one) and the key from `id`.
fn to_row(row: &PgRow) -> DocumentStoreResult<Row> {
    let columns = row.columns();

    if columns.is_empty() {
        return Err(DocumentStoreError::Backend("query returned no columns".to_string()));
    }

    let data = columns
        .iter()
        .position(|c| c.name().eq_ignore_ascii_case("data"))
        .unwrap_or(0);

    let key = match columns
        .iter()
        .position(|c| c.name().eq_ignore_ascii_case("id"))
        .filter(|&index| index != data)
    {
        Some(index) => read_key(row, index)?,
        None => None,
    };

    let payload = read_payload(row, data).map_err(|message| DocumentStoreError::Decode {
        key: key.as_ref().map(ToString::to_string),
        message,
    })?;

    Ok(Row::new(key, payload))
}

fn read_payload(row: &PgRow, index: usize) -> Result<Option<String>, String> {
    match row.column(index).type_info().name() {
        "JSON" | "JSONB" => row
            .try_get::<Option<serde_json::Value>, _>(index)
            .map(|value| value.map(|v| v.to_string()))
            .map_err(|e| e.to_string()),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map_err(|e| e.to_string()),
    }
}

/// Keys of types without a [`SqlValue`] counterpart are left out of the row.
fn read_key(row: &PgRow, index: usize) -> DocumentStoreResult<Option<SqlValue>> {
    let key = match row.column(index).type_info().name() {
        "UUID" => row.try_get::<Option<Uuid>, _>(index).map(|v| v.map(SqlValue::Uuid)),
        "INT8" => row.try_get::<Option<i64>, _>(index).map(|v| v.map(SqlValue::Int)),
        "INT4" => row.try_get::<Option<i32>, _>(index).map(|v| v.map(SqlValue::from)),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map(|v| v.map(|n| SqlValue::Int(i64::from(n)))),
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => {
            row.try_get::<Option<String>, _>(index).map(|v| v.map(SqlValue::Text))
        }
        _ => Ok(None),
    };

    key.map_err(|e| DocumentStoreError::Decode { key: None, message: e.to_string() })
}


/// Builder for constructing [`PostgresExecutor`] instances.
///
/// By default the pool connects lazily: building never touches the network and the first
/// statement opens the first connection. Call [`PostgresExecutorBuilder::eager`] to connect
/// (and fail) at build time.
#[derive(Debug, Clone)]
pub struct PostgresExecutorBuilder {
    target: StoreTarget,
    max_connections: u32,
    acquire_timeout: Duration,
    eager: bool,
}

impl PostgresExecutorBuilder {
    pub fn new(target: StoreTarget) -> Self {
        Self {
            target,
            max_connections: DEFAULT_MAX_CONNECTIONS,
            acquire_timeout: DEFAULT_ACQUIRE_TIMEOUT,
            eager: false,
        }
    }

    pub fn max_connections(mut self, max_connections: u32) -> Self {
        self.max_connections = max_connections;
        self
    }

    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }

    /// Opens a connection while building.
    pub fn eager(mut self) -> Self {
        self.eager = true;
        self
    }
}

#[async_trait]
impl ExecutorBuilder for PostgresExecutorBuilder {
    type Executor = PostgresExecutor;

    async fn build(self) -> DocumentStoreResult<Self::Executor> {
        ensure_postgres(&self.target)?;

        let options = PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout);

        let url = self.target.connection_string();
        let pool = if self.eager {
            options.connect(url).await
        } else {
            options.connect_lazy(url)
        }
        .map_err(|e| DocumentStoreError::Initialization(e.to_string()))?;

        debug!(max_connections = self.max_connections, eager = self.eager, "postgres pool ready");

        Ok(PostgresExecutor { target: self.target, pool })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn builder_rejects_sql_server_targets() {
        let err = PostgresExecutor::builder(StoreTarget::sql_server_xml("server=tcp:localhost"))
            .build()
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::UnsupportedBackend(_)));
    }

    #[tokio::test]
    async fn lazy_build_does_not_connect() {
        let executor = PostgresExecutor::builder(StoreTarget::postgres("postgres://nobody@127.0.0.1:1/none"))
            .max_connections(1)
            .build()
            .await
            .unwrap();

        assert_eq!(executor.guarantee(), CommitGuarantee::Atomic);
        assert_eq!(executor.pool().size(), 0);
    }
}
