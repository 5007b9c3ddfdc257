//! Pending mutations queued in a unit of work.
//!
//! An [`Operation`] pairs a [`Verb`] with the caller's key and the document payload. Payloads
//! are checked when the operation is built so malformed intents never reach the queue.

use serde::Serialize;
use std::fmt;

use crate::{
    document::{AnyDocument, Document, DocumentKey},
    error::{DocumentStoreError, DocumentStoreResult},
};

/// The kind of mutation an operation applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Verb::Insert => "insert",
            Verb::Update => "update",
            Verb::Delete => "delete",
        })
    }
}

/// One pending mutation: a verb, the key it addresses and the document payload.
///
/// Delete operations carry a datum too: it names the table the row lives in.
pub struct Operation<K: DocumentKey> {
    key: K,
    verb: Verb,
    datum: Box<dyn AnyDocument>,
}

impl<K: DocumentKey> Operation<K> {
    /// Builds an operation, rejecting empty payloads.
    ///
    /// A payload is empty when it serializes to `null` or to an empty string.
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::ContractViolation`] for an empty payload.
    pub fn new<D: Document>(key: K, verb: Verb, datum: D) -> DocumentStoreResult<Self> {
        ensure_present(&key, verb, &datum)?;

        Ok(Self { key, verb, datum: Box::new(datum) })
    }

    /// Builds an insert operation.
    pub fn insert<D: Document>(key: K, datum: D) -> DocumentStoreResult<Self> {
        Self::new(key, Verb::Insert, datum)
    }

    /// Builds an update operation.
    pub fn update<D: Document>(key: K, datum: D) -> DocumentStoreResult<Self> {
        Self::new(key, Verb::Update, datum)
    }

    /// Builds a delete operation.
    pub fn delete<D: Document>(key: K, datum: D) -> DocumentStoreResult<Self> {
        Self::new(key, Verb::Delete, datum)
    }

    pub fn key(&self) -> &K {
        &self.key
    }

    pub fn verb(&self) -> Verb {
        self.verb
    }

    pub fn datum(&self) -> &(dyn AnyDocument + 'static) {
        &*self.datum
    }

    /// Returns the table the operation applies to.
    pub fn table(&self) -> &'static str {
        self.datum.document_table()
    }
}

impl<K: DocumentKey> fmt::Debug for Operation<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Operation")
            .field("key", &self.key)
            .field("verb", &self.verb)
            .field("table", &self.table())
            .finish()
    }
}

/// Rejects payloads that serialize to nothing: `null` or an empty string.
///
/// `{}` and `[]` are real documents. They encode to a non-empty payload on every dialect
/// and decode back to the same value, so they are accepted.
fn ensure_present<K: DocumentKey, D: Serialize>(
    key: &K,
    verb: Verb,
    datum: &D,
) -> DocumentStoreResult<()> {
    let empty = match serde_json::to_value(datum) {
        Ok(serde_json::Value::Null) => true,
        Ok(serde_json::Value::String(s)) => s.is_empty(),
        Ok(_) => false,
        // Not representable as a JSON tree (e.g. non-string map keys); the dialect codec
        // decides at commit time.
        Err(_) => false,
    };

    if empty {
        return Err(DocumentStoreError::ContractViolation(format!(
            "{verb} for key {key} has an empty payload"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Person {
        name: String,
        age: u32,
    }

    impl Document for Person {}

    #[derive(Debug, Serialize, Deserialize)]
    struct Nothing;

    impl Document for Nothing {}

    fn ada() -> Person {
        Person { name: "Ada".into(), age: 36 }
    }

    #[test]
    fn builders_set_verb_key_and_table() {
        let op = Operation::insert("p1", ada()).unwrap();
        assert_eq!(op.verb(), Verb::Insert);
        assert_eq!(*op.key(), "p1");
        assert_eq!(op.table(), "Person");

        assert_eq!(Operation::update(7i64, ada()).unwrap().verb(), Verb::Update);
        assert_eq!(Operation::delete(7i64, ada()).unwrap().verb(), Verb::Delete);
    }

    #[test]
    fn empty_payload_is_a_contract_violation_for_every_verb() {
        for verb in [Verb::Insert, Verb::Update, Verb::Delete] {
            let err = Operation::new("p1", verb, Nothing).unwrap_err();
            assert!(matches!(err, DocumentStoreError::ContractViolation(_)), "{verb}");
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Marker {}

    impl Document for Marker {}

    #[derive(Debug, Serialize, Deserialize)]
    #[serde(transparent)]
    struct Tags(Vec<String>);

    impl Document for Tags {}

    #[test]
    fn empty_objects_and_collections_are_documents() {
        for verb in [Verb::Insert, Verb::Update, Verb::Delete] {
            assert!(Operation::new(1i64, verb, Marker {}).is_ok(), "{verb}");
            assert!(Operation::new(1i64, verb, Tags(Vec::new())).is_ok(), "{verb}");
        }
    }

    #[test]
    fn datum_is_recoverable() {
        let op = Operation::update(1i32, ada()).unwrap();
        assert_eq!(op.datum().downcast_ref::<Person>().unwrap().age, 36);
    }
}
