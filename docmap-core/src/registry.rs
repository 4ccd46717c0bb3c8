//! Type substitution and custom storage encodings.
//!
//! A [`TypeRegistry`] is consulted once per field while a schema is derived. It answers two
//! questions about a declared field type:
//!
//! - **Substitution**: should the declared (semantic) type be stored as another type? For
//!   example a [`uuid::Uuid`] is stored as a BSON binary UUID ([`bson::Uuid`]).
//! - **Encoding**: does the (possibly substituted) type declare its own storage
//!   representation through [`StorageEncoded`]? Fields of such types are flagged as custom
//!   serialized and converted during encoding.
//!
//! The registry is populated at process start and read-only afterwards. Most code uses
//! [`TypeRegistry::global`]; a custom registry can be installed with
//! [`TypeRegistry::install`] before the first schema is derived.
//!
//! # Example
//!
//! ```ignore
//! use docmap::registry::TypeRegistry;
//!
//! let registry = TypeRegistry::builder()
//!     .with_defaults()
//!     .encoded::<Money>()
//!     .build();
//!
//! TypeRegistry::install(registry).expect("registry installed twice");
//! ```

use bson::{Binary, Bson, oid::ObjectId, spec::BinarySubtype};
use chrono::{DateTime, Utc};
use std::{any::TypeId, collections::HashMap, fmt, sync::OnceLock};

use crate::{
    decl::TypeInfo,
    error::{CodecError, CodecResult},
};

static GLOBAL: OnceLock<TypeRegistry> = OnceLock::new();

/// Generates the default value of a synthesized primary key.
pub fn object_id() -> ObjectId {
    ObjectId::new()
}

/// A value type with its own storage representation.
///
/// Both conversions operate on materialized values: `to_storage` receives the value as the
/// type serialized itself and returns what is written to the document, `from_storage` is
/// its inverse and must return something the type can deserialize from.
pub trait StorageEncoded: 'static {
    /// Converts a materialized value into its stored form.
    fn to_storage(value: Bson) -> CodecResult<Bson>;

    /// Converts a stored value back into the form the type deserializes from.
    fn from_storage(value: Bson) -> CodecResult<Bson>;
}

/// Function pointer form of one [`StorageEncoded`] conversion.
pub type StorageFn = fn(Bson) -> CodecResult<Bson>;

/// The pair of conversions registered for an encoded type.
#[derive(Clone, Copy)]
pub struct StorageCodec {
    type_name: &'static str,
    encode: StorageFn,
    decode: StorageFn,
}

impl StorageCodec {
    /// Creates the codec for a [`StorageEncoded`] type.
    pub fn of<T: StorageEncoded>() -> Self {
        Self {
            type_name: std::any::type_name::<T>(),
            encode: T::to_storage,
            decode: T::from_storage,
        }
    }

    /// Name of the type that declared this codec.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn encode(&self, value: Bson) -> CodecResult<Bson> {
        (self.encode)(value)
    }

    pub fn decode(&self, value: Bson) -> CodecResult<Bson> {
        (self.decode)(value)
    }
}

impl fmt::Debug for StorageCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StorageCodec").field(&self.type_name).finish()
    }
}

impl serde::Serialize for StorageCodec {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.type_name)
    }
}

/// Maps semantic types to storage types and storage types to their codecs.
#[derive(Debug, Clone)]
pub struct TypeRegistry {
    substitutions: HashMap<TypeId, TypeInfo>,
    codecs: HashMap<TypeId, StorageCodec>,
}

impl TypeRegistry {
    /// Creates a builder for a registry. The builder starts empty.
    pub fn builder() -> TypeRegistryBuilder {
        TypeRegistryBuilder::default()
    }

    /// Returns the process-wide registry, initialising it with the default types on first use.
    pub fn global() -> &'static TypeRegistry {
        GLOBAL.get_or_init(TypeRegistry::default)
    }

    /// Installs `registry` as the process-wide registry.
    ///
    /// # Errors
    ///
    /// Returns the registry back if the global registry was already initialised, either by a
    /// previous install or because a schema has already been derived.
    pub fn install(registry: TypeRegistry) -> Result<(), TypeRegistry> {
        GLOBAL.set(registry)
    }

    /// Returns the storage type for `ty`, or `ty` itself when no substitution is registered.
    pub fn substitute(&self, ty: TypeInfo) -> TypeInfo {
        match self.substitutions.get(&ty.id()) {
            Some(storage) => {
                tracing::debug!(from = ty.name(), to = storage.name(), "substituting field type");
                *storage
            }
            None => ty,
        }
    }

    /// Returns the codec declared by `ty`, if any.
    pub fn codec(&self, ty: &TypeInfo) -> Option<StorageCodec> {
        self.codecs.get(&ty.id()).copied()
    }
}

impl Default for TypeRegistry {
    /// The standard registry: UUIDs and UTC timestamps are stored as their native BSON types.
    fn default() -> Self {
        TypeRegistry::builder().with_defaults().build()
    }
}

/// Builder for a [`TypeRegistry`].
#[derive(Debug, Default)]
pub struct TypeRegistryBuilder {
    substitutions: HashMap<TypeId, TypeInfo>,
    codecs: HashMap<TypeId, StorageCodec>,
}

impl TypeRegistryBuilder {
    /// Adds the standard substitutions and codecs.
    pub fn with_defaults(self) -> Self {
        self.substitute::<uuid::Uuid, bson::Uuid>()
            .encoded::<bson::Uuid>()
            .substitute::<DateTime<Utc>, bson::DateTime>()
            .encoded::<bson::DateTime>()
    }

    /// Stores fields declared as `S` as the storage type `T`.
    pub fn substitute<S: 'static, T: 'static>(mut self) -> Self {
        self.substitutions
            .insert(TypeId::of::<S>(), TypeInfo::of::<T>());
        self
    }

    /// Registers `T` as a type with a custom storage representation.
    pub fn encoded<T: StorageEncoded>(mut self) -> Self {
        self.codecs.insert(TypeId::of::<T>(), StorageCodec::of::<T>());
        self
    }

    pub fn build(self) -> TypeRegistry {
        TypeRegistry {
            substitutions: self.substitutions,
            codecs: self.codecs,
        }
    }
}

impl StorageEncoded for bson::Uuid {
    fn to_storage(value: Bson) -> CodecResult<Bson> {
        match value {
            Bson::String(s) => bson::Uuid::parse_str(&s)
                .map(Bson::from)
                .map_err(CodecError::validation),
            Bson::Binary(binary) => Ok(Bson::from(uuid_from_bytes(&binary.bytes)?)),
            other => Err(CodecError::Validation(format!("expected a UUID, found {other}"))),
        }
    }

    // Generic binary deserializes into `uuid::Uuid` whether or not the deserializer
    // is human readable.
    fn from_storage(value: Bson) -> CodecResult<Bson> {
        match value {
            Bson::Binary(binary) => Ok(Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: uuid_from_bytes(&binary.bytes)?.bytes().to_vec(),
            })),
            Bson::String(s) => Ok(Bson::String(s)),
            other => Err(CodecError::Validation(format!("expected a UUID, found {other}"))),
        }
    }
}

fn uuid_from_bytes(bytes: &[u8]) -> CodecResult<bson::Uuid> {
    let bytes: [u8; 16] = bytes.try_into().map_err(|_| {
        CodecError::Validation(format!("expected 16 bytes for a UUID, found {}", bytes.len()))
    })?;
    Ok(bson::Uuid::from_bytes(bytes))
}

impl StorageEncoded for bson::DateTime {
    fn to_storage(value: Bson) -> CodecResult<Bson> {
        match value {
            Bson::String(s) => DateTime::parse_from_rfc3339(&s)
                .map(|dt| Bson::DateTime(bson::DateTime::from_chrono(dt.with_timezone(&Utc))))
                .map_err(CodecError::validation),
            Bson::DateTime(dt) => Ok(Bson::DateTime(dt)),
            other => Err(CodecError::Validation(format!(
                "expected an RFC 3339 timestamp, found {other}"
            ))),
        }
    }

    fn from_storage(value: Bson) -> CodecResult<Bson> {
        match value {
            Bson::DateTime(dt) => Ok(Bson::String(dt.to_chrono().to_rfc3339())),
            Bson::String(s) => Ok(Bson::String(s)),
            other => Err(CodecError::Validation(format!("expected a datetime, found {other}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_registry_substitutes_uuid_for_bson_uuid() {
        let registry = TypeRegistry::default();
        let ty = registry.substitute(TypeInfo::of::<uuid::Uuid>());

        assert_eq!(ty.id(), TypeId::of::<bson::Uuid>());
        assert!(registry.codec(&ty).is_some());
    }

    #[test]
    fn unregistered_types_pass_through() {
        let registry = TypeRegistry::default();
        let ty = registry.substitute(TypeInfo::of::<String>());

        assert_eq!(ty.id(), TypeId::of::<String>());
        assert!(registry.codec(&ty).is_none());
    }

    #[test]
    fn empty_builder_has_no_substitutions() {
        let registry = TypeRegistry::builder().build();
        let ty = registry.substitute(TypeInfo::of::<uuid::Uuid>());

        assert_eq!(ty.id(), TypeId::of::<uuid::Uuid>());
    }

    #[test]
    fn uuid_codec_stores_binary_and_restores_generic_bytes() {
        let id = uuid::Uuid::new_v4();
        let codec = StorageCodec::of::<bson::Uuid>();

        let stored = codec.encode(Bson::String(id.to_string())).unwrap();
        let Bson::Binary(binary) = &stored else {
            panic!("expected binary, got {stored:?}");
        };
        assert_eq!(binary.subtype, BinarySubtype::Uuid);
        assert_eq!(binary.bytes, id.as_bytes().to_vec());

        let restored = codec.decode(stored).unwrap();
        assert_eq!(
            restored,
            Bson::Binary(Binary {
                subtype: BinarySubtype::Generic,
                bytes: id.as_bytes().to_vec(),
            })
        );
    }

    #[test]
    fn uuid_codec_rejects_malformed_values() {
        let codec = StorageCodec::of::<bson::Uuid>();

        assert!(codec.encode(Bson::String("not-a-uuid".into())).is_err());
        assert!(codec.encode(Bson::Int32(7)).is_err());
    }

    #[test]
    fn datetime_codec_round_trips_rfc3339() {
        let codec = StorageCodec::of::<bson::DateTime>();
        let stored = codec
            .encode(Bson::String("2024-05-01T12:30:00Z".into()))
            .unwrap();

        assert_eq!(
            stored,
            Bson::DateTime(bson::DateTime::from_millis(1_714_566_600_000))
        );
        let Bson::String(restored) = codec.decode(stored).unwrap() else {
            panic!("expected a string");
        };
        assert_eq!(
            DateTime::parse_from_rfc3339(&restored).unwrap(),
            DateTime::parse_from_rfc3339("2024-05-01T12:30:00Z").unwrap()
        );
    }
}
