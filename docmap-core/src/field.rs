//! Per-field mapping descriptors.

use bson::Bson;
use serde::Serialize;
use std::fmt;

use crate::decl::ModelRef;

/// How a missing value is filled in when a document is decoded.
#[derive(Clone, Copy)]
pub enum FieldDefault {
    /// The key must be present.
    Required,
    /// The serialization engine provides the default.
    Declared,
    /// The value is generated by the given factory.
    Generated(fn() -> Bson),
}

impl FieldDefault {
    fn label(&self) -> &'static str {
        match self {
            FieldDefault::Required => "required",
            FieldDefault::Declared => "declared",
            FieldDefault::Generated(_) => "generated",
        }
    }
}

impl PartialEq for FieldDefault {
    fn eq(&self, other: &Self) -> bool {
        self.label() == other.label()
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Serialize for FieldDefault {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// Maps one model field to its document key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldDescriptor {
    /// A value stored as-is (or through its storage codec).
    Plain {
        key_name: String,
        is_primary: bool,
        default: FieldDefault,
    },
    /// A nested model stored as its primary key value.
    Reference { key_name: String, target: ModelRef },
}

impl FieldDescriptor {
    pub(crate) fn plain(key_name: impl Into<String>, is_primary: bool, default: FieldDefault) -> Self {
        FieldDescriptor::Plain {
            key_name: key_name.into(),
            is_primary,
            default,
        }
    }

    /// The key this field is written under in a raw document.
    pub fn key_name(&self) -> &str {
        match self {
            FieldDescriptor::Plain { key_name, .. } | FieldDescriptor::Reference { key_name, .. } => {
                key_name
            }
        }
    }

    pub fn is_primary(&self) -> bool {
        matches!(self, FieldDescriptor::Plain { is_primary: true, .. })
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldDescriptor::Reference { .. })
    }

    /// The referenced model, for reference fields.
    pub fn target(&self) -> Option<ModelRef> {
        match self {
            FieldDescriptor::Reference { target, .. } => Some(*target),
            FieldDescriptor::Plain { .. } => None,
        }
    }

    pub fn default(&self) -> FieldDefault {
        match self {
            FieldDescriptor::Plain { default, .. } => *default,
            FieldDescriptor::Reference { .. } => FieldDefault::Required,
        }
    }

    /// Produces a fresh default value when the field's default is generated.
    pub fn generate_default(&self) -> Option<Bson> {
        match self.default() {
            FieldDefault::Generated(factory) => Some(factory()),
            FieldDefault::Required | FieldDefault::Declared => None,
        }
    }
}
