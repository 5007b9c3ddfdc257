//! Round trips against a live SQL Server.
//!
//! Run with `SQLDOC_MSSQL_URL="server=tcp:localhost,1433;user=sa;password=..." \
//! cargo test -p sqldoc-mssql -- --ignored`.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sqldoc_core::{
    document::Document,
    error::DocumentStoreError,
    executor::{Executor, ExecutorBuilder},
    params::Parameters,
    session::{DocumentSession, QuerySession},
    statement::Statement,
    target::StoreTarget,
};
use sqldoc_mssql::MssqlExecutor;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PersonCs {
    _id: Uuid,
    name: String,
    age: u32,
    favourite_things: Vec<String>,
}

impl Document for PersonCs {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct PersonJson {
    name: String,
    age: u32,
}

impl Document for PersonJson {}

fn ernesto(age: u32, favourite_things: &[&str]) -> PersonCs {
    PersonCs {
        _id: Uuid::nil(),
        name: "Ernesto".into(),
        age,
        favourite_things: favourite_things.iter().map(|t| t.to_string()).collect(),
    }
}

fn url() -> String {
    std::env::var("SQLDOC_MSSQL_URL").expect("SQLDOC_MSSQL_URL is not set")
}

fn fresh_key() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos() as i64
}

async fn session(target: StoreTarget, ddl: &str) -> DocumentSession<i64, MssqlExecutor> {
    let executor = MssqlExecutor::builder(target).trust_cert().build().await.unwrap();
    executor
        .execute_batch(vec![Statement::query(ddl.to_string(), vec![])])
        .await
        .unwrap();
    DocumentSession::new(executor)
}

#[tokio::test]
#[ignore = "needs SQLDOC_MSSQL_URL"]
async fn xml_column_round_trip() {
    let mut session = session(
        StoreTarget::sql_server_xml(url()),
        "IF OBJECT_ID('PersonCs') IS NULL CREATE TABLE PersonCs ([Id] BIGINT PRIMARY KEY, [Data] XML NOT NULL)",
    )
    .await;
    let id = fresh_key();

    session.store(id, ernesto(31, &[])).unwrap();
    session.save_changes().await.unwrap();

    let people: Vec<PersonCs> = session
        .query("select [Data] from PersonCs where [Id] = @id", Parameters::new().bind("id", id))
        .await
        .unwrap();
    assert_eq!(people, vec![ernesto(31, &[])]);

    session.update(id, ernesto(32, &["chess", "tapas"])).unwrap();
    session.save_changes().await.unwrap();
    let loaded: PersonCs = session.load(id).await.unwrap();
    assert_eq!(loaded, ernesto(32, &["chess", "tapas"]));

    session.delete(id, loaded).unwrap();
    session.save_changes().await.unwrap();
    assert!(matches!(
        session.load::<PersonCs>(id).await,
        Err(DocumentStoreError::NotFound { .. })
    ));
}

#[tokio::test]
#[ignore = "needs SQLDOC_MSSQL_URL"]
async fn generic_column_is_queryable_as_json() {
    let mut session = session(
        StoreTarget::sql_server_generic(url()),
        "IF OBJECT_ID('PersonJson') IS NULL CREATE TABLE PersonJson ([Id] BIGINT PRIMARY KEY, [Data] NVARCHAR(MAX) NOT NULL)",
    )
    .await;
    let id = fresh_key();
    let name = format!("Ernesto-{id}");

    session.store(id, PersonJson { name: name.clone(), age: 31 }).unwrap();
    session.save_changes().await.unwrap();

    let people: Vec<PersonJson> = session
        .query(
            "select [Id], [Data] from PersonJson where JSON_VALUE([Data], '$.name') = @name",
            Parameters::new().bind("name", name.as_str()),
        )
        .await
        .unwrap();
    assert_eq!(people.len(), 1);
    assert_eq!(people[0].age, 31);
}

#[tokio::test]
#[ignore = "needs SQLDOC_MSSQL_URL"]
async fn failed_commit_rolls_back_earlier_statements() {
    let mut session = session(
        StoreTarget::sql_server_xml(url()),
        "IF OBJECT_ID('PersonCs') IS NULL CREATE TABLE PersonCs ([Id] BIGINT PRIMARY KEY, [Data] XML NOT NULL)",
    )
    .await;
    let id = fresh_key();

    session.store(id, ernesto(31, &[])).unwrap();
    session.store(id, ernesto(31, &[])).unwrap();

    assert!(matches!(session.save_changes().await, Err(DocumentStoreError::Backend(_))));
    assert!(session.load::<PersonCs>(id).await.is_err());
}
