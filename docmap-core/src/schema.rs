//! Schema derivation.
//!
//! [`Schema::derive`] turns a [`ModelDecl`] into the immutable mapping used by the codec:
//! which document key every field is written under, which field is the primary key, which
//! fields reference other models and which fields have a custom storage encoding. It runs
//! once per model; the `#[model]` macro caches the result in a `static`.
//!
//! Derivation follows these rules:
//!
//! - Members whose name starts or ends with `__` are reserved and never mapped.
//! - Declared types are substituted through the [`TypeRegistry`] first; a field is custom
//!   serialized when the resulting type has a registered codec.
//! - A plain field is stored under its `key_name`, or its own name. A primary field without an
//!   explicit `key_name` is stored under [`IDENTITY_KEY`].
//! - A reference must point at a model.
//! - Members that only carry a value are mapped after all typed fields, under their own name.
//! - Without a declared primary key an `id` field stored under [`IDENTITY_KEY`] is synthesized,
//!   with a freshly generated [`ObjectId`](bson::oid::ObjectId) as its default.
//! - No two fields may share a document key.
//! - The collection defaults to the model name, without a trailing `Model`, in snake case.

use bson::Bson;
use heck::ToSnakeCase;
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashSet;

use crate::{
    decl::{FieldDecl, FieldSpec, ModelDecl},
    error::{SchemaError, SchemaResult},
    field::{FieldDefault, FieldDescriptor},
    registry::{StorageCodec, TypeRegistry, object_id},
};

/// Name of the synthesized primary key field.
pub const PRIMARY_KEY_FIELD: &str = "id";

/// Document key of the store's identity field.
pub const IDENTITY_KEY: &str = "_id";

/// Suffix stripped from model names when deriving the collection name.
pub const MODEL_SUFFIX: &str = "Model";

/// The derived document mapping of one model.
#[derive(Debug, Clone, Serialize)]
pub struct Schema {
    model: String,
    collection: String,
    primary_key: String,
    fields: IndexMap<String, FieldDescriptor>,
    references: Vec<String>,
    custom_serialized: IndexMap<String, StorageCodec>,
}

impl Schema {
    /// Derives the schema of `decl`, resolving field types through `registry`.
    ///
    /// # Errors
    ///
    /// Returns a [`SchemaError`] when the declaration is invalid: more than one primary key, a
    /// reference to a non-model type, a field configured through the serialization engine, an
    /// unrecognized field configuration, a reserved field name, or colliding document keys.
    pub fn derive(decl: ModelDecl, registry: &TypeRegistry) -> SchemaResult<Schema> {
        let ModelDecl {
            name: model,
            collection,
            fields: decls,
            foreign,
        } = decl;

        if let Some(detail) = foreign {
            let field = decls
                .iter()
                .map(FieldDecl::name)
                .find(|name| is_valid_field_name(name))
                .unwrap_or(PRIMARY_KEY_FIELD)
                .to_string();
            return Err(SchemaError::ForeignFieldConfiguration { model, field, detail });
        }

        let mut primary_key: Option<String> = None;
        let mut fields = IndexMap::new();
        let mut references = Vec::new();
        let mut custom_serialized = IndexMap::new();
        let mut assigned = Vec::new();

        for FieldDecl { name, ty, spec } in decls {
            if !is_valid_field_name(&name) {
                continue;
            }
            let Some(ty) = ty else {
                assigned.push(name);
                continue;
            };
            let ty = registry.substitute(ty);

            let descriptor = match spec {
                FieldSpec::Skipped => continue,
                FieldSpec::Plain(info) => {
                    if info.primary_field {
                        if let Some(first) = &primary_key {
                            return Err(SchemaError::DuplicatePrimaryKey {
                                model,
                                first: first.clone(),
                                second: name,
                            });
                        }
                        primary_key = Some(name.clone());
                    }
                    let key_name = match info.key_name {
                        Some(key_name) => key_name,
                        None if info.primary_field => IDENTITY_KEY.to_string(),
                        None => name.clone(),
                    };
                    let default = if info.has_default {
                        FieldDefault::Declared
                    } else {
                        FieldDefault::Required
                    };
                    FieldDescriptor::plain(key_name, info.primary_field, default)
                }
                FieldSpec::Reference(info) => {
                    let Some(target) = ty.as_model() else {
                        return Err(SchemaError::InvalidReferenceTarget {
                            model,
                            field: name,
                            target: ty.name().to_string(),
                        });
                    };
                    references.push(name.clone());
                    FieldDescriptor::Reference {
                        key_name: info.key_name.unwrap_or_else(|| name.clone()),
                        target,
                    }
                }
                FieldSpec::Unconfigured => {
                    FieldDescriptor::plain(name.clone(), false, FieldDefault::Required)
                }
                FieldSpec::Foreign(detail) => {
                    return Err(SchemaError::ForeignFieldConfiguration {
                        model,
                        field: name,
                        detail,
                    });
                }
                FieldSpec::Unrecognized(detail) => {
                    return Err(SchemaError::UnrecognizedFieldDeclaration {
                        model,
                        field: name,
                        detail,
                    });
                }
            };

            if let Some(codec) = registry.codec(&ty) {
                custom_serialized.insert(name.clone(), codec);
            }
            fields.insert(name, descriptor);
        }

        for name in assigned {
            if !fields.contains_key(&name) {
                let descriptor = FieldDescriptor::plain(name.clone(), false, FieldDefault::Required);
                fields.insert(name, descriptor);
            }
        }

        let primary_key = match primary_key {
            Some(primary_key) => primary_key,
            None => {
                if fields.contains_key(PRIMARY_KEY_FIELD) {
                    return Err(SchemaError::ReservedField {
                        model,
                        field: PRIMARY_KEY_FIELD.to_string(),
                    });
                }
                tracing::debug!(model = %model, "synthesizing primary key `{PRIMARY_KEY_FIELD}`");
                fields.insert(
                    PRIMARY_KEY_FIELD.to_string(),
                    FieldDescriptor::plain(IDENTITY_KEY, true, FieldDefault::Generated(new_identity)),
                );
                PRIMARY_KEY_FIELD.to_string()
            }
        };

        if let Some(key) = find_duplicate_key(fields.values()) {
            return Err(SchemaError::DuplicateDocumentKey { model, key });
        }

        let collection = collection.unwrap_or_else(|| container_name(&model));

        tracing::debug!(
            model = %model,
            collection = %collection,
            primary_key = %primary_key,
            fields = fields.len(),
            references = references.len(),
            "derived schema"
        );

        Ok(Schema {
            model,
            collection,
            primary_key,
            fields,
            references,
            custom_serialized,
        })
    }

    /// Name of the model this schema was derived from.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Name of the collection documents of this model are stored in.
    pub fn container_name(&self) -> &str {
        &self.collection
    }

    /// Name of the primary key field.
    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    /// Descriptor of the primary key field.
    pub fn primary_field(&self) -> &FieldDescriptor {
        &self.fields[self.primary_key.as_str()]
    }

    /// All mapped fields, in declaration order.
    pub fn fields(&self) -> &IndexMap<String, FieldDescriptor> {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.get(name)
    }

    /// Names of the fields referencing other models.
    pub fn references(&self) -> &[String] {
        &self.references
    }

    /// Names of the fields with a custom storage encoding.
    pub fn custom_serialized_fields(&self) -> impl Iterator<Item = &str> {
        self.custom_serialized.keys().map(String::as_str)
    }

    pub fn is_custom_serialized(&self, field: &str) -> bool {
        self.custom_serialized.contains_key(field)
    }

    pub(crate) fn codec(&self, field: &str) -> Option<&StorageCodec> {
        self.custom_serialized.get(field)
    }
}

fn new_identity() -> Bson {
    Bson::ObjectId(object_id())
}

/// Returns false for names reserved for internal bookkeeping (`__name`, `name__`).
pub fn is_valid_field_name(name: &str) -> bool {
    !name.starts_with("__") && !name.ends_with("__")
}

/// Derives the default collection name of a model.
///
/// ```ignore
/// assert_eq!(container_name("UserModel"), "user");
/// assert_eq!(container_name("UserProfile"), "user_profile");
/// ```
pub fn container_name(model: &str) -> String {
    model
        .strip_suffix(MODEL_SUFFIX)
        .filter(|base| !base.is_empty())
        .unwrap_or(model)
        .to_snake_case()
}

fn find_duplicate_key<'a>(fields: impl Iterator<Item = &'a FieldDescriptor>) -> Option<String> {
    let mut seen = HashSet::new();
    fields
        .map(FieldDescriptor::key_name)
        .find(|key| !seen.insert(*key))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decl::{FieldInfo, ReferenceInfo, TypeInfo},
        model::tests::Author,
    };
    use pretty_assertions::assert_eq;

    fn derive(decl: ModelDecl) -> SchemaResult<Schema> {
        Schema::derive(decl, &TypeRegistry::default())
    }

    fn string_field(name: &str, spec: FieldSpec) -> FieldDecl {
        FieldDecl::new(name, TypeInfo::of::<String>(), spec)
    }

    #[test]
    fn synthesizes_primary_key_when_none_declared() {
        let schema = derive(
            ModelDecl::new("UserModel")
                .field(string_field("name", FieldSpec::Unconfigured))
                .field(string_field(
                    "email",
                    FieldSpec::Plain(FieldInfo::new().key_name("email_address")),
                )),
        )
        .unwrap();

        assert_eq!(schema.primary_key(), "id");
        assert!(schema.fields()["id"].is_primary());
        assert_eq!(schema.fields()["id"].key_name(), "_id");
        assert!(matches!(
            schema.fields()["id"].generate_default(),
            Some(Bson::ObjectId(_))
        ));
        assert_eq!(schema.fields()["email"].key_name(), "email_address");
        assert_eq!(schema.container_name(), "user");
        assert_eq!(
            schema.fields().keys().collect::<Vec<_>>(),
            ["name", "email", "id"]
        );
    }

    #[test]
    fn exactly_one_field_is_primary() {
        let schema = derive(
            ModelDecl::new("Account")
                .field(string_field("handle", FieldSpec::Plain(FieldInfo::new().primary())))
                .field(string_field("bio", FieldSpec::Unconfigured)),
        )
        .unwrap();

        assert_eq!(schema.primary_key(), "handle");
        assert_eq!(schema.primary_field().key_name(), "_id");
        assert_eq!(schema.fields().values().filter(|f| f.is_primary()).count(), 1);
        assert!(schema.field("id").is_none());
    }

    #[test]
    fn explicit_primary_key_name_is_kept() {
        let schema = derive(ModelDecl::new("Account").field(string_field(
            "handle",
            FieldSpec::Plain(FieldInfo::new().primary().key_name("login")),
        )))
        .unwrap();

        assert_eq!(schema.primary_field().key_name(), "login");
    }

    #[test]
    fn rejects_multiple_primary_keys() {
        let err = derive(
            ModelDecl::new("Account")
                .field(string_field("a", FieldSpec::Plain(FieldInfo::new().primary())))
                .field(string_field("b", FieldSpec::Plain(FieldInfo::new().primary()))),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::DuplicatePrimaryKey {
                model: "Account".into(),
                first: "a".into(),
                second: "b".into(),
            }
        );
    }

    #[test]
    fn rejects_duplicate_document_keys() {
        let err = derive(
            ModelDecl::new("Account")
                .field(string_field("a", FieldSpec::Plain(FieldInfo::new().key_name("x"))))
                .field(string_field("b", FieldSpec::Plain(FieldInfo::new().key_name("x")))),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::DuplicateDocumentKey {
                model: "Account".into(),
                key: "x".into(),
            }
        );
    }

    #[test]
    fn rejects_key_colliding_with_identity_key() {
        let err = derive(ModelDecl::new("Account").field(string_field(
            "legacy",
            FieldSpec::Plain(FieldInfo::new().key_name("_id")),
        )))
        .unwrap_err();

        assert!(matches!(err, SchemaError::DuplicateDocumentKey { key, .. } if key == "_id"));
    }

    #[test]
    fn rejects_reference_to_non_model() {
        let err = derive(ModelDecl::new("Post").field(string_field(
            "author",
            FieldSpec::Reference(ReferenceInfo::new()),
        )))
        .unwrap_err();

        assert!(matches!(err, SchemaError::InvalidReferenceTarget { field, .. } if field == "author"));
    }

    #[test]
    fn rejects_model_level_foreign_configuration() {
        let err = derive(
            ModelDecl::new("Person")
                .foreign("serde(rename_all)")
                .field(string_field("__internal__", FieldSpec::Unconfigured))
                .field(string_field("first_name", FieldSpec::Unconfigured)),
        )
        .unwrap_err();

        assert_eq!(
            err,
            SchemaError::ForeignFieldConfiguration {
                model: "Person".into(),
                field: "first_name".into(),
                detail: "serde(rename_all)".into(),
            }
        );

        let empty = derive(ModelDecl::new("Empty").foreign("serde(tag)")).unwrap_err();
        assert!(matches!(empty, SchemaError::ForeignFieldConfiguration { field, .. } if field == "id"));
    }

    #[test]
    fn rejects_foreign_and_unrecognized_configuration() {
        let foreign = derive(ModelDecl::new("Post").field(string_field(
            "title",
            FieldSpec::Foreign("serde(rename)".into()),
        )))
        .unwrap_err();
        assert!(matches!(foreign, SchemaError::ForeignFieldConfiguration { .. }));

        let unrecognized = derive(ModelDecl::new("Post").field(string_field(
            "title",
            FieldSpec::Unrecognized("both field and reference".into()),
        )))
        .unwrap_err();
        assert!(matches!(unrecognized, SchemaError::UnrecognizedFieldDeclaration { .. }));
    }

    #[test]
    fn rejects_user_field_named_id_without_primary_key() {
        let err = derive(ModelDecl::new("Post").field(string_field("id", FieldSpec::Unconfigured)))
            .unwrap_err();

        assert_eq!(
            err,
            SchemaError::ReservedField {
                model: "Post".into(),
                field: "id".into(),
            }
        );
    }

    #[test]
    fn registers_references() {
        let schema = derive(
            ModelDecl::new("Post")
                .field(string_field("title", FieldSpec::Unconfigured))
                .field(FieldDecl::new(
                    "author",
                    TypeInfo::model::<Author>(),
                    FieldSpec::Reference(ReferenceInfo::new().key_name("author_id")),
                )),
        )
        .unwrap();

        assert_eq!(schema.references(), ["author"]);
        let author = &schema.fields()["author"];
        assert!(author.is_reference());
        assert_eq!(author.key_name(), "author_id");
        assert_eq!(author.target().unwrap().schema().model(), "Author");
    }

    #[test]
    fn skips_reserved_and_skipped_members() {
        let schema = derive(
            ModelDecl::new("Post")
                .field(string_field("__internal__", FieldSpec::Unconfigured))
                .field(string_field("__meta", FieldSpec::Unconfigured))
                .field(string_field("cache", FieldSpec::Skipped))
                .field(string_field("title", FieldSpec::Unconfigured)),
        )
        .unwrap();

        assert_eq!(schema.fields().keys().collect::<Vec<_>>(), ["title", "id"]);
    }

    #[test]
    fn assigned_members_map_to_their_own_name_after_typed_fields() {
        let schema = derive(
            ModelDecl::new("Post")
                .field(FieldDecl::assigned("views"))
                .field(string_field("title", FieldSpec::Unconfigured))
                .field(FieldDecl::assigned("title")),
        )
        .unwrap();

        assert_eq!(
            schema.fields().keys().collect::<Vec<_>>(),
            ["title", "views", "id"]
        );
        assert_eq!(schema.fields()["views"].key_name(), "views");
        assert!(!schema.fields()["views"].is_primary());
    }

    #[test]
    fn substituted_types_are_custom_serialized() {
        let schema = derive(
            ModelDecl::new("Session")
                .field(FieldDecl::new("token", TypeInfo::of::<uuid::Uuid>(), FieldSpec::Unconfigured))
                .field(string_field("label", FieldSpec::Unconfigured)),
        )
        .unwrap();

        assert_eq!(schema.custom_serialized_fields().collect::<Vec<_>>(), ["token"]);
        assert!(!schema.is_custom_serialized("label"));
    }

    #[test]
    fn declared_default_is_recorded() {
        let schema = derive(ModelDecl::new("Post").field(FieldDecl::new(
            "views",
            TypeInfo::of::<i64>(),
            FieldSpec::Plain(FieldInfo::new().with_default()),
        )))
        .unwrap();

        assert_eq!(schema.fields()["views"].default(), FieldDefault::Declared);
    }

    #[test]
    fn explicit_collection_is_never_overridden() {
        let schema = derive(ModelDecl::new("UserModel").collection("people")).unwrap();

        assert_eq!(schema.container_name(), "people");
    }

    #[test]
    fn container_names_follow_model_names() {
        assert_eq!(container_name("UserModel"), "user");
        assert_eq!(container_name("UserProfile"), "user_profile");
        assert_eq!(container_name("HTTPRequestLog"), "http_request_log");
        assert_eq!(container_name("Model"), "model");
    }

    #[test]
    fn schema_serializes_to_a_stable_description() {
        let schema = derive(ModelDecl::new("Tag").collection("tags").field(string_field(
            "label",
            FieldSpec::Plain(FieldInfo::new().primary().key_name("label")),
        )))
        .unwrap();

        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            serde_json::json!({
                "model": "Tag",
                "collection": "tags",
                "primary_key": "label",
                "fields": {
                    "label": {
                        "kind": "plain",
                        "key_name": "label",
                        "is_primary": true,
                        "default": "required",
                    },
                },
                "references": [],
                "custom_serialized": {},
            })
        );
    }
}
