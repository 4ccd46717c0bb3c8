//! Main docmap crate: schema-typed models mapped to and from BSON documents.
//!
//! This crate is the primary entry point for users of the docmap framework.
//! It re-exports the core types from `docmap-core` and the `#[model]` attribute from
//! `docmap-macros`.
//!
//! # Features
//!
//! - **Declarative models** - Plain serde structs become models with a single attribute
//! - **Derived schemas** - Document keys, primary keys and references are derived once per model
//! - **Document codec** - `to_doc`/`parse_doc` convert between instances and raw documents
//! - **Custom storage types** - UUIDs and timestamps are stored as native BSON values
//!
//! # Quick Start
//!
//! ```ignore
//! use docmap::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[model]
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! pub struct UserModel {
//!     pub name: String,
//!     #[field(key_name = "email_address")]
//!     pub email: String,
//! }
//!
//! fn main() -> Result<(), CodecError> {
//!     let user = UserModel {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!         id: ObjectId::new(),
//!     };
//!
//!     // Stored under the `user` collection, with the email under `email_address`
//!     // and the generated primary key under `_id`.
//!     let raw = user.to_doc()?;
//!     assert_eq!(UserModel::container_name(), "user");
//!
//!     // Decoding the raw document gives the instance back.
//!     assert_eq!(UserModel::parse_doc(&raw)?, user);
//!     Ok(())
//! }
//! ```
//!
//! # References
//!
//! A field marked `#[reference]` holds another model. It is written as the referenced
//! instance's primary key, and read back from an embedded sub-document:
//!
//! ```ignore
//! #[model]
//! #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
//! pub struct Post {
//!     pub title: String,
//!     #[reference]
//!     pub author: UserModel,
//! }
//!
//! let raw = post.to_doc()?;
//! assert_eq!(raw.get("author"), Some(&Bson::ObjectId(post.author.id)));
//! ```
//!
//! # Custom storage types
//!
//! Types implementing [`StorageEncoded`](registry::StorageEncoded) can be registered in a
//! [`TypeRegistry`](registry::TypeRegistry), which must be installed before the first model
//! schema is derived:
//!
//! ```ignore
//! TypeRegistry::install(TypeRegistry::builder().with_defaults().encoded::<Money>().build())
//!     .expect("type registry already initialised");
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap;

pub mod prelude;

pub use docmap_core::{codec, decl, error, field, model, registry, schema};
pub use docmap_macros::model;

// Re-export BSON types for convenience
pub use bson;
