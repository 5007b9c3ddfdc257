use serde::{Deserialize, Serialize};
use sqldoc::{
    executor::Row,
    memory::InMemoryExecutor,
    prelude::*,
    statement::{SqlValue, Statement},
};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
struct Person {
    name: String,
    age: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(table = "people_archive")]
struct ArchivedPerson {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
struct Invoice {
    number: u64,
    total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Document)]
struct Nothing;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
#[document(table = "Person")]
struct KeyedPerson {
    _id: String,
    name: String,
    age: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Document)]
struct PersonCs {
    _id: Uuid,
    name: String,
    age: u32,
    nickname: Option<String>,
    favourite_things: Vec<String>,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn ernesto(age: u32) -> Person {
    Person { name: "Ernesto".into(), age }
}

async fn memory(target: StoreTarget) -> InMemoryExecutor {
    init_tracing();
    InMemoryExecutor::builder().target(target).build().await.unwrap()
}

async fn postgres_session() -> DocumentSession<Uuid, InMemoryExecutor> {
    DocumentSession::new(memory(StoreTarget::postgres("memory")).await)
}

#[tokio::test]
async fn stored_document_loads_back() {
    let mut session = postgres_session().await;
    let id = Uuid::new_v4();

    session.store(id, ernesto(31)).unwrap();
    let report = session.save_changes().await.unwrap();

    assert_eq!(report.statements, 1);
    assert_eq!(report.rows_affected, 1);
    assert_eq!(report.guarantee, CommitGuarantee::Atomic);

    let loaded: Person = session.load(id).await.unwrap();
    assert_eq!(loaded, ernesto(31));
}

#[tokio::test]
async fn update_in_a_later_commit_replaces_the_payload() {
    let mut session = postgres_session().await;
    let id = Uuid::new_v4();

    session.store(id, ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    session.update(id, ernesto(32)).unwrap();
    session.save_changes().await.unwrap();

    let loaded: Person = session.load(id).await.unwrap();
    assert_eq!(loaded.age, 32);
}

#[tokio::test]
async fn insert_update_delete_in_one_commit_run_in_order() {
    let mut session = postgres_session().await;
    let id = Uuid::new_v4();

    session.store(id, ernesto(31)).unwrap();
    session.update(id, ernesto(32)).unwrap();
    session.delete(id, ernesto(32)).unwrap();
    assert_eq!(session.pending(), 3);

    let report = session.save_changes().await.unwrap();

    assert_eq!(report.statements, 3);
    assert_eq!(session.pending(), 0);
    assert!(matches!(
        session.load::<Person>(id).await,
        Err(DocumentStoreError::NotFound { ref table, .. }) if table == "Person"
    ));
}

#[tokio::test]
async fn deleted_document_no_longer_matches_a_query() {
    let mut session = postgres_session().await;
    let id = Uuid::new_v4();

    session.store(id, ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    session.delete(id, ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    let people: Vec<Person> = session
        .query("select data from Person where id = :id", Parameters::new().bind("id", id))
        .await
        .unwrap();
    assert!(people.is_empty());
}

#[tokio::test]
async fn queries_filter_on_payload_fields_in_insertion_order() {
    let mut session = postgres_session().await;

    session.store(Uuid::new_v4(), ernesto(31)).unwrap();
    session.store(Uuid::new_v4(), Person { name: "Ada".into(), age: 36 }).unwrap();
    session.store(Uuid::new_v4(), ernesto(60)).unwrap();
    session.save_changes().await.unwrap();

    let named: Vec<Person> = session
        .query(
            "select data from Person where data->>'name' = :name",
            Parameters::new().bind("name", "Ernesto"),
        )
        .await
        .unwrap();
    assert_eq!(named, vec![ernesto(31), ernesto(60)]);

    let everyone: Vec<Person> = session
        .query("select data from Person", Parameters::default())
        .await
        .unwrap();
    assert_eq!(everyone.len(), 3);
}

#[tokio::test]
async fn query_over_an_empty_table_is_empty() {
    let session = postgres_session().await;

    let people: Vec<Person> = session
        .query("select data from Person", Parameters::new())
        .await
        .unwrap();

    assert!(people.is_empty());
}

#[tokio::test]
async fn empty_payload_is_rejected_before_queueing() {
    let mut session = postgres_session().await;

    let err = session.store(Uuid::new_v4(), Nothing).unwrap_err();

    assert!(matches!(err, DocumentStoreError::ContractViolation(_)));
    assert_eq!(session.pending(), 0);
}

#[tokio::test]
async fn failed_commit_applies_nothing_and_empties_the_queue() {
    let mut session = postgres_session().await;
    let first = Uuid::new_v4();
    let second = Uuid::new_v4();

    session.store(first, ernesto(31)).unwrap();
    session.store(second, ernesto(40)).unwrap();
    session.store(first, ernesto(50)).unwrap();

    let err = session.save_changes().await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::Backend(ref msg) if msg.contains("duplicate key")));
    assert_eq!(session.pending(), 0);
    assert!(session.load::<Person>(second).await.is_err());
}

#[tokio::test]
async fn xml_target_stores_xml_payloads() {
    let executor = memory(StoreTarget::sql_server_xml("memory")).await;
    let mut session = DocumentSession::new(executor.clone());

    session.store(7i64, ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    assert_eq!(
        executor.rows("Person").await,
        vec![(
            SqlValue::Int(7),
            r#"<document><name>Ernesto</name><age type="number">31</age></document>"#.to_string()
        )]
    );

    let loaded: Person = session.load(7).await.unwrap();
    assert_eq!(loaded, ernesto(31));

    let people: Vec<Person> = session
        .query("select [Data] from Person where [Id] = @id", Parameters::new().bind("@id", 7))
        .await
        .unwrap();
    assert_eq!(people, vec![ernesto(31)]);
}

#[tokio::test]
async fn string_keyed_document_is_found_by_its_own_id_field() {
    let mut session: DocumentSession<String, _> =
        DocumentSession::new(memory(StoreTarget::postgres("memory")).await);
    let person = KeyedPerson { _id: "p1".into(), name: "Ernesto".into(), age: 31 };

    session.store("p1".to_string(), person.clone()).unwrap();
    session.save_changes().await.unwrap();

    let people: Vec<KeyedPerson> = session
        .query(
            "select data from Person where data->>'_id' = :id",
            Parameters::new().bind("id", "p1"),
        )
        .await
        .unwrap();
    assert_eq!(people, vec![person]);
}

#[tokio::test]
async fn xml_target_round_trips_optional_and_collection_fields() {
    let executor = memory(StoreTarget::sql_server_xml("memory")).await;
    let mut session: DocumentSession<Uuid, _> = DocumentSession::new(executor.clone());
    let id = Uuid::new_v4();
    let mut person = PersonCs {
        _id: id,
        name: "Ernesto".into(),
        age: 31,
        nickname: None,
        favourite_things: Vec::new(),
    };

    session.store(id, person.clone()).unwrap();
    session.save_changes().await.unwrap();
    let loaded: PersonCs = session.load(id).await.unwrap();
    assert_eq!(loaded, person);

    person.age = 32;
    person.nickname = Some("Neto".into());
    person.favourite_things = vec!["chess".into(), "R&D <notes>".into()];
    session.update(id, person.clone()).unwrap();
    session.save_changes().await.unwrap();
    let loaded: PersonCs = session.load(id).await.unwrap();
    assert_eq!(loaded, person);

    person.nickname = None;
    person.favourite_things.clear();
    session.update(id, person.clone()).unwrap();
    session.save_changes().await.unwrap();
    let loaded: PersonCs = session.load(id).await.unwrap();
    assert_eq!(loaded, person);
    assert_eq!(executor.rows("PersonCs").await.len(), 1);
}

#[tokio::test]
async fn memory_xml_target_refuses_payload_field_filters() {
    let mut session = DocumentSession::new(memory(StoreTarget::sql_server_xml("memory")).await);
    session.store(7i64, ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    let err = session
        .query::<Person>(
            "select [Data] from Person where JSON_VALUE([Data], '$.name') = @name",
            Parameters::new().bind("name", "Ernesto"),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Backend(ref msg) if msg.contains("by key only")));
}

#[tokio::test]
async fn table_name_can_be_overridden() {
    let executor = memory(StoreTarget::sql_server_generic("memory")).await;
    let mut session = DocumentSession::new(executor.clone());

    session.store(1i64, ArchivedPerson { name: "Ada".into() }).unwrap();
    session.save_changes().await.unwrap();

    assert_eq!(executor.rows("people_archive").await.len(), 1);
    assert!(executor.rows("ArchivedPerson").await.is_empty());
}

#[tokio::test]
async fn undecodable_rows_surface_the_row_key() {
    let mut session = DocumentSession::new(memory(StoreTarget::postgres("memory")).await);
    session.store(42i64, ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    let err = session
        .query::<Invoice>("select id, data from Person", Parameters::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::Decode { key: Some(ref k), .. } if k == "42"));
}

#[tokio::test]
async fn unbound_parameters_never_reach_the_backend() {
    let session = postgres_session().await;

    let err = session
        .query::<Person>("select data from Person where id = :id", Parameters::new())
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::UnboundParameter(ref name) if name == "id"));
}

#[tokio::test]
async fn sessions_can_be_boxed_over_any_executor() {
    let executor: Box<dyn Executor> = Box::new(memory(StoreTarget::sql_server_generic("memory")).await);
    let mut session: DynDocumentSession<String> = DocumentSession::new(executor);

    session.store("ernesto".to_string(), ernesto(31)).unwrap();
    session.save_changes().await.unwrap();

    assert_eq!(session.target().dialect(), Dialect::SqlServerGeneric);
    let loaded: Person = session.load("ernesto".to_string()).await.unwrap();
    assert_eq!(loaded, ernesto(31));
}

#[tokio::test]
async fn target_from_configuration_text() {
    let target = StoreTarget::from_backend("MSSQL-Generic", "memory").unwrap();
    assert_eq!(target.dialect(), Dialect::SqlServerGeneric);

    let err = StoreTarget::from_backend("oracle", "memory").unwrap_err();
    assert!(matches!(err, DocumentStoreError::UnsupportedBackend(_)));
}

/// Answers every fetch with the same rows.
#[derive(Debug)]
struct Duplicated {
    target: StoreTarget,
}

#[sqldoc::async_trait]
impl Executor for Duplicated {
    fn target(&self) -> &StoreTarget {
        &self.target
    }

    fn guarantee(&self) -> CommitGuarantee {
        CommitGuarantee::PerStatement
    }

    async fn execute_batch(&self, statements: Vec<Statement>) -> DocumentStoreResult<u64> {
        Ok(statements.len() as u64)
    }

    async fn fetch(&self, _statement: Statement) -> DocumentStoreResult<Vec<Row>> {
        let row = Row::new(None, Some(r#"{"name":"Ernesto","age":31}"#.to_string()));
        Ok(vec![row.clone(), row])
    }
}

#[tokio::test]
async fn load_matching_several_rows_is_ambiguous() {
    init_tracing();
    let mut session = DocumentSession::new(Duplicated { target: StoreTarget::postgres("scripted") });

    session.store(1i64, ernesto(31)).unwrap();
    let report = session.save_changes().await.unwrap();
    assert_eq!(report.guarantee, CommitGuarantee::PerStatement);

    let err = session.load::<Person>(1).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::Ambiguous { count: 2, .. }));
}
