//! A mapping layer between schema-typed Rust models and BSON documents.
//!
//! This crate is the core of the docmap project and provides:
//!
//! - **Declarations** ([`decl`]) - The declared body of a model: fields, types and configuration
//! - **Schema derivation** ([`schema`]) - Turning a declaration into an immutable document mapping
//! - **Field descriptors** ([`field`]) - How each field maps to a document key
//! - **Type registry** ([`registry`]) - Type substitutions and custom storage encodings
//! - **Instance codec** ([`codec`]) - Converting between materialized instances and raw documents
//! - **Model traits** ([`model`]) - The `Model` trait and its document conversions
//! - **Error handling** ([`error`]) - Definition-time and conversion errors
//!
//! # Example
//!
//! ```ignore
//! use docmap::prelude::*;
//! use serde::{Serialize, Deserialize};
//!
//! #[model]
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     pub name: String,
//! }
//!
//! #[model]
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct Post {
//!     pub title: String,
//!     #[reference]
//!     pub author: User,
//! }
//!
//! let raw = post.to_doc()?;
//! assert_eq!(raw.get("author"), Some(&Bson::ObjectId(post.author.id)));
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmap_core;

pub mod codec;
pub mod decl;
pub mod error;
pub mod field;
pub mod model;
pub mod registry;
pub mod schema;
