//! Core traits for models mapped to documents.
//!
//! A model is an ordinary serde type with a derived [`Schema`]. The `#[model]` attribute macro
//! implements [`Model`] for a struct; [`ModelExt`] then provides the conversions to and from raw
//! documents for every model.
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//! use serde::{Deserialize, Serialize};
//!
//! #[model]
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! pub struct UserModel {
//!     pub name: String,
//!     #[field(key_name = "email_address")]
//!     pub email: String,
//! }
//!
//! let user = UserModel { name: "Ada".into(), email: "ada@example.com".into(), id: ObjectId::new() };
//! let raw = user.to_doc()?;
//! assert_eq!(raw.get_str("email_address")?, "ada@example.com");
//! assert_eq!(UserModel::parse_doc(&raw)?, user);
//! ```

use bson::{Bson, Document, de::deserialize_from_document, ser::serialize_to_document};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::{Value, from_value, to_value};

use crate::{
    decl::ModelDecl,
    error::{CodecError, CodecResult},
    registry::TypeRegistry,
    schema::Schema,
};

/// A type whose instances are stored as documents.
///
/// Implementations are normally generated by the `#[model]` attribute macro, which derives the
/// schema once and caches it for the lifetime of the process.
pub trait Model: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// The model's declared body.
    fn declaration() -> ModelDecl;

    /// The model's derived schema.
    fn schema() -> &'static Schema;
}

/// Derives the schema of a model declaration with the global [`TypeRegistry`].
///
/// Used by generated [`Model::schema`] implementations.
///
/// # Panics
///
/// Panics when the declaration is invalid. An invalid model cannot be used at all, so the error
/// is raised the first time the model's schema is needed.
#[doc(hidden)]
pub fn register(decl: ModelDecl) -> Schema {
    match Schema::derive(decl, TypeRegistry::global()) {
        Ok(schema) => schema,
        Err(err) => panic!("invalid model definition: {err}"),
    }
}

/// Document conversions available on every [`Model`].
pub trait ModelExt: Model {
    /// Creates an instance from a raw document.
    ///
    /// # Errors
    ///
    /// Returns an error if a key is missing, a reference is malformed, or a value does not
    /// validate against its field's type.
    fn parse_doc(raw: &Document) -> CodecResult<Self>;

    /// Converts this instance into the raw document written to the store.
    ///
    /// # Errors
    ///
    /// Returns an error if materialization or a storage conversion fails.
    fn to_doc(&self) -> CodecResult<Document>;

    /// Returns the stored value of this instance's primary key.
    ///
    /// # Errors
    ///
    /// Returns an error if the instance cannot be converted into a document.
    fn primary_key_value(&self) -> CodecResult<Bson>;

    /// Returns the name of the collection this model is stored in.
    fn container_name() -> &'static str;

    /// Converts this instance to a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn to_json(&self) -> CodecResult<Value>;

    /// Creates an instance from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns an error if deserialization fails or the structure is invalid.
    fn from_json(value: Value) -> CodecResult<Self>;
}

impl<M: Model> ModelExt for M {
    fn parse_doc(raw: &Document) -> CodecResult<Self> {
        let fields = Self::schema().decode(raw)?;
        deserialize_from_document(fields).map_err(CodecError::validation)
    }

    fn to_doc(&self) -> CodecResult<Document> {
        Self::schema().encode(serialize_to_document(self)?)
    }

    fn primary_key_value(&self) -> CodecResult<Bson> {
        let schema = Self::schema();
        let key = schema.primary_field().key_name();
        self.to_doc()?.remove(key).ok_or_else(|| {
            CodecError::Serialization(format!("{} has no primary key `{key}`", schema.model()))
        })
    }

    fn container_name() -> &'static str {
        Self::schema().container_name()
    }

    fn to_json(&self) -> CodecResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> CodecResult<Self> {
        Ok(from_value(value)?)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::decl::{FieldDecl, FieldSpec, TypeInfo};
    use bson::{doc, oid::ObjectId};
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use std::sync::OnceLock;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    pub(crate) struct Author {
        pub name: String,
        pub id: ObjectId,
    }

    impl Model for Author {
        fn declaration() -> ModelDecl {
            ModelDecl::new("Author").field(FieldDecl::new(
                "name",
                TypeInfo::of::<String>(),
                FieldSpec::Unconfigured,
            ))
        }

        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| register(Self::declaration()))
        }
    }

    #[test]
    fn round_trips_through_documents() {
        let author = Author {
            name: "Ada".into(),
            id: ObjectId::new(),
        };

        let raw = author.to_doc().unwrap();

        assert_eq!(raw, doc! { "name": "Ada", "_id": author.id });
        assert_eq!(Author::parse_doc(&raw).unwrap(), author);
    }

    #[test]
    fn exposes_primary_key_and_container() {
        let author = Author {
            name: "Ada".into(),
            id: ObjectId::new(),
        };

        assert_eq!(author.primary_key_value().unwrap(), Bson::ObjectId(author.id));
        assert_eq!(Author::container_name(), "author");
    }

    #[test]
    fn parse_doc_reports_type_mismatches_as_validation_errors() {
        let err = Author::parse_doc(&doc! { "name": 5, "_id": ObjectId::new() }).unwrap_err();

        assert!(matches!(err, CodecError::Validation(_)));
    }

    #[test]
    fn json_view_uses_field_names() {
        let author = Author {
            name: "Ada".into(),
            id: ObjectId::new(),
        };

        let json = author.to_json().unwrap();

        assert_eq!(json["name"], "Ada");
        assert_eq!(Author::from_json(json).unwrap(), author);
    }

    #[test]
    #[should_panic(expected = "invalid model definition")]
    fn register_panics_on_invalid_declarations() {
        register(ModelDecl::new("Broken").field(FieldDecl::new(
            "id",
            TypeInfo::of::<String>(),
            FieldSpec::Unconfigured,
        )));
    }
}
