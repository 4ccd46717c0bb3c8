//! Convenient re-exports of commonly used types from docmap.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmap::prelude::*;
//! ```

pub use docmap_core::{
    decl::{FieldDecl, FieldInfo, FieldSpec, ModelDecl, ReferenceInfo, TypeInfo},
    error::{CodecError, CodecResult, SchemaError, SchemaResult},
    field::{FieldDefault, FieldDescriptor},
    model::{Model, ModelExt},
    registry::{StorageEncoded, TypeRegistry},
    schema::Schema,
};
pub use docmap_macros::model;

pub use bson::{Bson, Document, doc, oid::ObjectId};
