//! Error types and result types for schema derivation and document conversion.
//!
//! Two families of errors exist:
//!
//! - [`SchemaError`] is raised while a model's schema is derived. These are definition-time
//!   errors: a model whose declaration fails to derive is unusable.
//! - [`CodecError`] is raised while converting between model instances and raw documents.
//!
//! Use [`SchemaResult<T>`] and [`CodecResult<T>`] as the return types for fallible operations.

use bson::error::Error as BsonError;
use serde_json::Error as SerdeJsonError;
use thiserror::Error;

/// Represents every way a model declaration can fail to produce a schema.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// More than one field was declared with `primary_field` set.
    #[error("cannot define multiple primary keys on model {model} (`{first}` and `{second}`)")]
    DuplicatePrimaryKey {
        model: String,
        first: String,
        second: String,
    },
    /// A reference was declared on a type that is not a model.
    #[error("cannot define a reference `{field}` (in {model}) on `{target}`, which is not a model")]
    InvalidReferenceTarget {
        model: String,
        field: String,
        target: String,
    },
    /// A field was configured through the underlying serialization engine instead of
    /// this crate's field configuration.
    #[error("field `{field}` (in {model}) uses `{detail}`; configure it with `#[field(..)]` instead")]
    ForeignFieldConfiguration {
        model: String,
        field: String,
        detail: String,
    },
    /// The field declaration has a shape the deriver does not understand.
    #[error("unhandled field definition {model}::{field}: {detail}")]
    UnrecognizedFieldDeclaration {
        model: String,
        field: String,
        detail: String,
    },
    /// Two fields would be written under the same document key.
    #[error("duplicate key_name `{key}` in {model}")]
    DuplicateDocumentKey { model: String, key: String },
    /// A field uses a name reserved for the synthesized primary key.
    #[error("field `{field}` (in {model}) is reserved for the generated primary key")]
    ReservedField { model: String, field: String },
}

/// A specialized `Result` type for schema derivation.
pub type SchemaResult<T> = Result<T, SchemaError>;

/// Represents all possible errors that can occur when converting documents.
#[derive(Error, Debug)]
pub enum CodecError {
    /// The raw document lacks a key the schema expects.
    /// The first argument is the document key, the second is the model name.
    #[error("Missing document key `{0}` for model {1}")]
    MissingDocumentKey(String, String),
    /// A value did not satisfy the type of the field it was assigned to.
    #[error("Validation error: {0}")]
    Validation(String),
    /// Materializing an instance into a document failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A custom storage conversion rejected a value.
    /// The first argument is the field name, the second the reason.
    #[error("Storage conversion failed for field `{0}`: {1}")]
    Storage(String, String),
}

/// A specialized `Result` type for document conversion.
pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    pub(crate) fn validation(err: impl ToString) -> Self {
        CodecError::Validation(err.to_string())
    }
}

impl From<BsonError> for CodecError {
    fn from(err: BsonError) -> Self {
        CodecError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for CodecError {
    fn from(err: SerdeJsonError) -> Self {
        CodecError::Serialization(err.to_string())
    }
}
