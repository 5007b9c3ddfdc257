//! Parameterized queries decoded into typed values.
//!
//! The SQL text is supplied and trusted by the caller; the engine only binds the named
//! parameters into the dialect's placeholder syntax, runs the text as given and decodes the
//! payload column of every row with the dialect's codec. Rows come back in backend order.
//!
//! # Example
//!
//! ```ignore
//! use sqldoc::{query::QueryEngine, params::Parameters};
//!
//! let people: Vec<Person> = QueryEngine::new(&executor)
//!     .query(
//!         "select data from Person where data->>'name' = :name",
//!         Parameters::new().bind("name", "Ernesto"),
//!     )
//!     .await?;
//! ```

use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::{
    codec::{Codec, Encoding},
    error::{DocumentStoreError, DocumentStoreResult},
    executor::{Executor, Row},
    params::Parameters,
    statement::Statement,
};

/// Runs queries against one executor.
#[derive(Debug)]
pub struct QueryEngine<'a, E: Executor + ?Sized> {
    executor: &'a E,
}

impl<'a, E: Executor + ?Sized> QueryEngine<'a, E> {
    pub fn new(executor: &'a E) -> Self {
        Self { executor }
    }

    /// Runs caller SQL with named parameters and decodes each row into a `T`.
    ///
    /// An empty result set yields an empty vector.
    ///
    /// # Errors
    ///
    /// - [`DocumentStoreError::UnboundParameter`] if the text names a parameter with no value
    /// - [`DocumentStoreError::Backend`] with the driver's message if the query fails
    /// - [`DocumentStoreError::Decode`] if a row does not decode into `T`
    pub async fn query<T: DeserializeOwned>(
        &self,
        sql: &str,
        parameters: Parameters,
    ) -> DocumentStoreResult<Vec<T>> {
        let dialect = self.executor.target().dialect();
        let statement = parameters.to_statement(sql, dialect)?;

        self.fetch_decoded(statement).await
    }

    /// Runs an already bound statement and decodes each row into a `T`.
    pub async fn fetch_decoded<T: DeserializeOwned>(
        &self,
        statement: Statement,
    ) -> DocumentStoreResult<Vec<T>> {
        let dialect = self.executor.target().dialect();
        debug!(%dialect, sql = %statement.sql, params = statement.params.len(), "running query");

        let rows = self
            .executor
            .fetch(statement)
            .await
            .inspect_err(|err| warn!(%dialect, error = %err, "query failed"))?;

        debug!(%dialect, rows = rows.len(), "query returned");

        rows.into_iter()
            .map(|row| decode_row(dialect.encoding(), row))
            .collect()
    }
}

/// Decodes one row's payload, naming the row's key on failure when it has one.
pub fn decode_row<T: DeserializeOwned>(encoding: Encoding, row: Row) -> DocumentStoreResult<T> {
    let key = row.key.as_ref().map(ToString::to_string);

    let payload = row.payload.ok_or_else(|| DocumentStoreError::Decode {
        key: key.clone(),
        message: "payload column is NULL".to_string(),
    })?;

    encoding
        .decode(&payload)
        .map_err(|err| DocumentStoreError::Decode {
            key,
            message: match err {
                DocumentStoreError::Serialization(message) => message,
                other => other.to_string(),
            },
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        executor::CommitGuarantee,
        statement::{Command, SqlValue},
        target::StoreTarget,
    };
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::Mutex;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    #[derive(Debug)]
    struct Canned {
        target: StoreTarget,
        rows: Vec<Row>,
        seen: Mutex<Option<Statement>>,
    }

    #[async_trait]
    impl Executor for Canned {
        fn target(&self) -> &StoreTarget {
            &self.target
        }

        fn guarantee(&self) -> CommitGuarantee {
            CommitGuarantee::Atomic
        }

        async fn execute_batch(&self, _statements: Vec<Statement>) -> DocumentStoreResult<u64> {
            Ok(0)
        }

        async fn fetch(&self, statement: Statement) -> DocumentStoreResult<Vec<Row>> {
            *self.seen.lock().unwrap() = Some(statement);
            Ok(self.rows.clone())
        }
    }

    fn canned(rows: Vec<Row>) -> Canned {
        Canned { target: StoreTarget::postgres("postgres://test"), rows, seen: Mutex::new(None) }
    }

    #[tokio::test]
    async fn binds_parameters_and_decodes_rows_in_order() {
        let executor = canned(vec![
            Row::new(None, Some(r#"{"name":"Ernesto","age":31}"#.into())),
            Row::new(None, Some(r#"{"name":"Ada","age":36}"#.into())),
        ]);

        let people: Vec<Person> = QueryEngine::new(&executor)
            .query(
                "select data from Person where data->>'_id' = :id",
                Parameters::new().bind("id", "p1"),
            )
            .await
            .unwrap();

        assert_eq!(people.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(), ["Ernesto", "Ada"]);

        let seen = executor.seen.lock().unwrap().clone().unwrap();
        assert_eq!(seen.command, Command::Query);
        assert_eq!(seen.sql, "select data from Person where data->>'_id' = $1");
        assert_eq!(seen.params, vec![SqlValue::Text("p1".into())]);
    }

    #[tokio::test]
    async fn empty_result_is_not_an_error() {
        let executor = canned(vec![]);
        let people: Vec<Person> = QueryEngine::new(&executor)
            .query("select data from Person", Parameters::new())
            .await
            .unwrap();
        assert!(people.is_empty());
    }

    #[tokio::test]
    async fn undecodable_row_names_its_key() {
        let executor = canned(vec![Row::new(
            Some(SqlValue::Text("p9".into())),
            Some(r#"{"name":"Broken"}"#.into()),
        )]);

        let err = QueryEngine::new(&executor)
            .query::<Person>("select id, data from Person", Parameters::new())
            .await
            .unwrap_err();

        assert!(matches!(err, DocumentStoreError::Decode { key: Some(ref k), .. } if k == "p9"));
    }

    #[tokio::test]
    async fn null_payload_is_a_decode_error() {
        let executor = canned(vec![Row::new(None, None)]);
        let err = QueryEngine::new(&executor)
            .query::<Person>("select data from Person", Parameters::new())
            .await
            .unwrap_err();
        assert!(matches!(err, DocumentStoreError::Decode { key: None, .. }));
    }
}
