//! Core traits for documents and the keys that address them.
//!
//! A document is any serde-serializable type persisted as one row of a table named after the
//! type. The key is supplied by the caller and stored in a dedicated key column next to the
//! encoded payload.

use serde::{Serialize, de::DeserializeOwned};
use std::{any::Any, fmt};
use uuid::Uuid;

use crate::{
    codec::{Codec, Encoding},
    error::DocumentStoreResult,
    statement::SqlValue,
};

/// Core trait that all documents stored through a session must implement.
///
/// The table a document lives in is derived from the type's simple name, unmodified. Use
/// `#[derive(Document)]` to generate the implementation, or override
/// [`Document::table_name`] by hand when the table is named differently.
///
/// # Example
///
/// ```ignore
/// use sqldoc::document::Document;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize, Document)]
/// pub struct Person {
///     pub name: String,
///     pub age: u32,
/// }
///
/// assert_eq!(Person::table_name(), "Person");
/// ```
pub trait Document: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Returns the name of the table this document type is stored in.
    ///
    /// Defaults to the simple type name with module path and generic arguments removed.
    fn table_name() -> &'static str {
        simple_type_name(std::any::type_name::<Self>())
    }
}

/// Strips the module path and generic arguments from a fully qualified type name.
pub fn simple_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base)
}

/// A caller-supplied document key.
///
/// Keys are bound into statements through [`DocumentKey::to_sql_value`] and rendered with
/// `Display` in error messages.
pub trait DocumentKey: Clone + Ord + fmt::Debug + fmt::Display + Send + Sync + 'static {
    /// Converts the key into a bindable statement parameter.
    fn to_sql_value(&self) -> SqlValue;
}

impl DocumentKey for Uuid {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Uuid(*self)
    }
}

impl DocumentKey for String {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.clone())
    }
}

impl DocumentKey for &'static str {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Text(self.to_string())
    }
}

impl DocumentKey for i64 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(*self)
    }
}

impl DocumentKey for i32 {
    fn to_sql_value(&self) -> SqlValue {
        SqlValue::Int(i64::from(*self))
    }
}

/// Type-erased document carried by a queued operation.
///
/// A unit of work holds documents of many types at once. Static typing lives on the
/// operation constructors; once queued, a document only needs to name its table and encode
/// itself for the session's dialect.
pub trait AnyDocument: Send + Sync {
    /// Returns the table the document belongs to.
    fn document_table(&self) -> &'static str;

    /// Encodes the document with the given representation.
    fn encode_with(&self, encoding: Encoding) -> DocumentStoreResult<String>;

    /// Returns a reference to the document as a generic `Any` type.
    fn as_any(&self) -> &dyn Any;
}

impl dyn AnyDocument {
    /// Attempts to downcast to a specific document type.
    pub fn downcast_ref<D: Document>(&self) -> Option<&D> {
        self.as_any().downcast_ref::<D>()
    }
}

impl<D: Document> AnyDocument for D {
    fn document_table(&self) -> &'static str {
        D::table_name()
    }

    fn encode_with(&self, encoding: Encoding) -> DocumentStoreResult<String> {
        encoding.encode(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for dyn AnyDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyDocument")
            .field("table", &self.document_table())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize)]
    struct Person {
        name: String,
    }

    impl Document for Person {}

    #[derive(Debug, Serialize, Deserialize)]
    struct Invoice;

    impl Document for Invoice {
        fn table_name() -> &'static str {
            "Invoices"
        }
    }

    #[test]
    fn table_name_defaults_to_simple_type_name() {
        assert_eq!(Person::table_name(), "Person");
        assert_eq!(Invoice::table_name(), "Invoices");
        assert_eq!(simple_type_name("app::model::Wrapper<app::model::Inner>"), "Wrapper");
    }

    #[test]
    fn erased_document_keeps_table_and_type() {
        let doc: Box<dyn AnyDocument> = Box::new(Person { name: "Ada".into() });
        assert_eq!(doc.document_table(), "Person");
        assert_eq!(doc.downcast_ref::<Person>().map(|p| p.name.as_str()), Some("Ada"));
        assert_eq!(doc.encode_with(Encoding::Json).unwrap(), r#"{"name":"Ada"}"#);
    }
}
