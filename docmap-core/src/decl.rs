//! Model declarations: the input of schema derivation.
//!
//! A [`ModelDecl`] describes a model's body the way it was written: its name, an optional
//! explicit collection, and every member with its declared type and configuration. The
//! `#[model]` attribute macro generates one per struct; it can also be assembled by hand.
//!
//! ```ignore
//! use docmap::decl::{FieldDecl, FieldInfo, FieldSpec, ModelDecl, TypeInfo};
//!
//! let decl = ModelDecl::new("UserModel")
//!     .field(FieldDecl::new("name", TypeInfo::of::<String>(), FieldSpec::Unconfigured))
//!     .field(FieldDecl::new(
//!         "email",
//!         TypeInfo::of::<String>(),
//!         FieldSpec::Plain(FieldInfo::new().key_name("email_address")),
//!     ));
//! ```

use std::{any::TypeId, fmt};

use crate::{model::Model, schema::Schema};

/// Lazily resolves the schema of a referenced model.
///
/// Holding a function instead of the schema itself lets a model reference its own type, or a
/// model whose schema has not been derived yet, without re-entering schema initialisation.
#[derive(Clone, Copy)]
pub struct ModelRef {
    name: &'static str,
    schema: fn() -> &'static Schema,
}

impl ModelRef {
    pub fn of<M: Model>() -> Self {
        Self {
            name: std::any::type_name::<M>(),
            schema: M::schema,
        }
    }

    /// Type name of the referenced model.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The referenced model's schema.
    pub fn schema(&self) -> &'static Schema {
        (self.schema)()
    }
}

impl fmt::Debug for ModelRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ModelRef").field(&self.name).finish()
    }
}

impl PartialEq for ModelRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl serde::Serialize for ModelRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name)
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, Copy)]
pub struct TypeInfo {
    id: TypeId,
    name: &'static str,
    model: Option<ModelRef>,
}

impl TypeInfo {
    /// Describes an arbitrary value type.
    pub fn of<T: 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            model: None,
        }
    }

    /// Describes a model type, which may be the target of a reference.
    pub fn model<M: Model>() -> Self {
        Self {
            model: Some(ModelRef::of::<M>()),
            ..Self::of::<M>()
        }
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the model this type refers to, if it is a model.
    pub fn as_model(&self) -> Option<ModelRef> {
        self.model
    }
}

/// Configuration of a plain field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldInfo {
    /// Marks the field as the document's primary key.
    pub primary_field: bool,
    /// Document key; defaults to the field name, or `_id` for the primary key.
    pub key_name: Option<String>,
    /// True when the serialization engine supplies a default for a missing value.
    pub has_default: bool,
}

impl FieldInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn primary(mut self) -> Self {
        self.primary_field = true;
        self
    }

    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }

    pub fn with_default(mut self) -> Self {
        self.has_default = true;
        self
    }
}

/// Configuration of a reference field.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReferenceInfo {
    pub key_name: Option<String>,
}

impl ReferenceInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn key_name(mut self, key_name: impl Into<String>) -> Self {
        self.key_name = Some(key_name.into());
        self
    }
}

/// How a member was declared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSpec {
    /// Configured with this crate's field configuration.
    Plain(FieldInfo),
    /// Configured as a reference to another model.
    Reference(ReferenceInfo),
    /// Declared without any configuration.
    Unconfigured,
    /// Configured directly through the serialization engine. Always rejected.
    Foreign(String),
    /// A configuration the deriver does not understand. Always rejected.
    Unrecognized(String),
    /// Not a persisted field.
    Skipped,
}

/// One member of a model declaration.
#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub(crate) name: String,
    pub(crate) ty: Option<TypeInfo>,
    pub(crate) spec: FieldSpec,
}

impl FieldDecl {
    /// A field with a declared type.
    pub fn new(name: impl Into<String>, ty: TypeInfo, spec: FieldSpec) -> Self {
        Self {
            name: name.into(),
            ty: Some(ty),
            spec,
        }
    }

    /// A member that only has a value, without a declared type. It is always stored as a
    /// plain field under its own name.
    pub fn assigned(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: None,
            spec: FieldSpec::Unconfigured,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &FieldSpec {
        &self.spec
    }
}

/// The declared body of a model.
#[derive(Debug, Clone)]
pub struct ModelDecl {
    pub(crate) name: String,
    pub(crate) collection: Option<String>,
    pub(crate) fields: Vec<FieldDecl>,
    pub(crate) foreign: Option<String>,
}

impl ModelDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            fields: Vec::new(),
            foreign: None,
        }
    }

    /// Sets the collection explicitly instead of deriving it from the model name.
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Records a serialization-engine option on the model itself that changes which keys its
    /// fields are written under, such as `serde(rename_all)`.
    pub fn foreign(mut self, detail: impl Into<String>) -> Self {
        self.foreign = Some(detail.into());
        self
    }

    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn fields(&self) -> &[FieldDecl] {
        &self.fields
    }
}
