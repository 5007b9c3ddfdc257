use std::fmt;
use async_trait::async_trait;
use tiberius::{Client, ColumnData, Config, Query};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};
use tracing::{debug, warn};

use sqldoc_core::{
    error::{DocumentStoreError, DocumentStoreResult},
    executor::{CommitGuarantee, Executor, ExecutorBuilder, Row},
    statement::{SqlValue, Statement},
    target::{Backend, StoreTarget},
};

type SqlClient = Client<Compat<TcpStream>>;

fn backend_error(e: impl fmt::Display) -> DocumentStoreError {
    DocumentStoreError::Backend(e.to_string())
}


/// Executor running SQL Server statements over `tiberius`.
///
/// Every call opens its own connection and closes it before returning, on success and
/// failure alike. Batches are wrapped in an explicit transaction and rolled back when a
/// statement fails.
#[derive(Clone)]
pub struct MssqlExecutor {
    target: StoreTarget,
    config: Config,
}

impl fmt::Debug for MssqlExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlExecutor")
            .field("dialect", &self.target.dialect())
            .finish_non_exhaustive()
    }
}

impl MssqlExecutor {
    pub fn builder(target: StoreTarget) -> MssqlExecutorBuilder {
        MssqlExecutorBuilder::new(target)
    }

    async fn connect(&self) -> DocumentStoreResult<SqlClient> {
        let tcp = TcpStream::connect(self.config.get_addr())
            .await
            .map_err(backend_error)?;
        tcp.set_nodelay(true).map_err(backend_error)?;

        Client::connect(self.config.clone(), tcp.compat_write())
            .await
            .map_err(backend_error)
    }
}

#[async_trait]
impl Executor for MssqlExecutor {
    fn target(&self) -> &StoreTarget {
        &self.target
    }

    fn guarantee(&self) -> CommitGuarantee {
        CommitGuarantee::Atomic
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        let mut client = self.connect().await?;

        simple(&mut client, "BEGIN TRANSACTION").await?;

        match run_statements(&mut client, &statements).await {
            Ok(affected) => {
                simple(&mut client, "COMMIT TRANSACTION").await?;
                debug!(statements = statements.len(), affected, "sql server transaction committed");
                Ok(affected)
            }
            Err(err) => {
                // The server also rolls back when the connection drops below.
                if let Err(rollback) =
                    simple(&mut client, "IF @@TRANCOUNT > 0 ROLLBACK TRANSACTION").await
                {
                    warn!(error = %rollback, "rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        let mut client = self.connect().await?;

        let rows = bind(Query::new(statement.sql.as_str()), &statement.params)
            .query(&mut client)
            .await
            .map_err(backend_error)?
            .into_first_result()
            .await
            .map_err(backend_error)?;

        rows.into_iter().map(to_row).collect()
    }
}

async fn simple(client: &mut SqlClient, sql: &str) -> DocumentStoreResult<()> {
    client
        .simple_query(sql)
        .await
        .map_err(backend_error)?
        .into_results()
        .await
        .map_err(backend_error)?;
    Ok(())
}

async fn run_statements(client: &mut SqlClient, statements: &[Statement]) -> DocumentStoreResult<u64> {
    let mut affected = 0;

    for statement in statements {
        let result = bind(Query::new(statement.sql.as_str()), &statement.params)
            .execute(&mut *client)
            .await
            .map_err(|e| {
                warn!(sql = %statement.sql, error = %e, "statement failed");
                backend_error(e)
            })?;

        affected += result.total();
    }

    Ok(affected)
}

fn bind<'a>(mut query: Query<'a>, params: &'a [SqlValue]) -> Query<'a> {
    for value in params {
        match value {
            SqlValue::Null => query.bind(Option::<&str>::None),
            SqlValue::Bool(v) => query.bind(*v),
            SqlValue::Int(v) => query.bind(*v),
            SqlValue::Float(v) => query.bind(*v),
            SqlValue::Text(v) => query.bind(v.as_str()),
            SqlValue::Uuid(v) => query.bind(*v),
            SqlValue::Timestamp(v) => query.bind(v.naive_utc()),
        }
    }

    query
}

/// Reads the payload from the `Data` column (else the first one) and the key from `Id`.
fn to_row(row: tiberius::Row) -> DocumentStoreResult<Row> {
    let names = row
        .columns()
        .iter()
        .map(|c| c.name().to_string())
        .collect::<Vec<_>>();

    if names.is_empty() {
        return Err(DocumentStoreError::Backend("query returned no columns".to_string()));
    }

    let data = names
        .iter()
        .position(|n| n.eq_ignore_ascii_case("data"))
        .unwrap_or(0);
    let id = names
        .iter()
        .position(|n| n.eq_ignore_ascii_case("id"))
        .filter(|&index| index != data);

    let mut key = None;
    let mut payload = None;

    for (index, value) in row.into_iter().enumerate() {
        if index == data {
            payload = Some(value);
        } else if Some(index) == id {
            key = key_value(value);
        }
    }

    let payload = match payload {
        Some(ColumnData::String(text)) => text.map(|t| t.into_owned()),
        Some(ColumnData::Xml(xml)) => xml.map(|x| x.into_owned().into_string()),
        Some(other) => {
            return Err(DocumentStoreError::Decode {
                key: key.as_ref().map(ToString::to_string),
                message: format!("payload column {} is not text or XML: {other:?}", names[data]),
            });
        }
        None => None,
    };

    Ok(Row::new(key, payload))
}

/// Keys of types without a [`SqlValue`] counterpart are left out of the row.
fn key_value(value: ColumnData<'static>) -> Option<SqlValue> {
    match value {
        ColumnData::Guid(v) => v.map(SqlValue::Uuid),
        ColumnData::I64(v) => v.map(SqlValue::Int),
        ColumnData::I32(v) => v.map(SqlValue::from),
        ColumnData::I16(v) => v.map(|n| SqlValue::Int(i64::from(n))),
        ColumnData::U8(v) => v.map(|n| SqlValue::Int(i64::from(n))),
        ColumnData::String(v) => v.map(|s| SqlValue::Text(s.into_owned())),
        _ => None,
    }
}

fn parse_config(connection_string: &str) -> DocumentStoreResult<Config> {
    let config = if connection_string.starts_with("jdbc:") {
        Config::from_jdbc_string(connection_string)
    } else {
        Config::from_ado_string(connection_string)
    };

    config.map_err(|e| DocumentStoreError::Initialization(e.to_string()))
}


/// Builder for constructing [`MssqlExecutor`] instances.
///
/// Accepts ADO.NET (`server=tcp:host,1433;user=...`) and JDBC (`jdbc:sqlserver://...`)
/// connection strings. Building parses the connection string but never connects.
#[derive(Debug, Clone)]
pub struct MssqlExecutorBuilder {
    target: StoreTarget,
    trust_cert: bool,
}

impl MssqlExecutorBuilder {
    pub fn new(target: StoreTarget) -> Self {
        Self { target, trust_cert: false }
    }

    /// Accepts the server's certificate without validation, for development servers.
    pub fn trust_cert(mut self) -> Self {
        self.trust_cert = true;
        self
    }
}

#[async_trait]
impl ExecutorBuilder for MssqlExecutorBuilder {
    type Executor = MssqlExecutor;

    async fn build(self) -> DocumentStoreResult<Self::Executor> {
        match self.target.backend() {
            Backend::SqlServerXml | Backend::SqlServerGeneric => {}
            Backend::Postgres => {
                return Err(DocumentStoreError::UnsupportedBackend(
                    "sql server executor cannot serve a postgres target".to_string(),
                ));
            }
        }

        let mut config = parse_config(self.target.connection_string())?;
        if self.trust_cert {
            config.trust_cert();
        }

        debug!(dialect = %self.target.dialect(), "sql server executor ready");

        Ok(MssqlExecutor { target: self.target, config })
    }
}
