//! Conversion between materialized instances and raw documents.
//!
//! Both directions work on BSON documents so they can recurse into referenced models without
//! knowing their Rust types:
//!
//! - [`Schema::decode`] rewrites a raw document (keyed by document keys) into a document keyed
//!   by field names, ready for deserialization into the model.
//! - [`Schema::encode`] rewrites a materialized instance (keyed by field names) into the raw
//!   document written to the store.
//!
//! [`ModelExt`](crate::model::ModelExt) wraps both with the (de)serialization step.

use bson::{Bson, Document};

use crate::{
    error::{CodecError, CodecResult},
    field::{FieldDefault, FieldDescriptor},
    schema::Schema,
};

impl Schema {
    /// Rewrites a raw document into field-name keyed values.
    ///
    /// Referenced models are decoded recursively from the sub-document stored under their key.
    /// Fields with a storage codec are converted back from their stored form.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::MissingDocumentKey`] when a key is absent and the field has no
    /// default, [`CodecError::Validation`] when a reference is not stored as a sub-document, and
    /// [`CodecError::Storage`] when a codec rejects a stored value.
    pub fn decode(&self, raw: &Document) -> CodecResult<Document> {
        let mut doc = Document::new();

        for (name, field) in self.fields() {
            let Some(value) = raw.get(field.key_name()) else {
                match field.default() {
                    FieldDefault::Required => {
                        return Err(CodecError::MissingDocumentKey(
                            field.key_name().to_string(),
                            self.model().to_string(),
                        ));
                    }
                    FieldDefault::Declared => {}
                    FieldDefault::Generated(generate) => {
                        doc.insert(name.clone(), generate());
                    }
                }
                continue;
            };

            let value = match field {
                FieldDescriptor::Reference { target, .. } => match value {
                    Bson::Document(nested) => Bson::Document(target.schema().decode(nested)?),
                    other => {
                        return Err(CodecError::Validation(format!(
                            "reference `{name}` of {} expects an embedded {} document, found {other}",
                            self.model(),
                            target.schema().model(),
                        )));
                    }
                },
                FieldDescriptor::Plain { .. } => self.decode_value(name, value.clone())?,
            };
            doc.insert(name.clone(), value);
        }

        tracing::trace!(model = %self.model(), fields = doc.len(), "decoded document");
        Ok(doc)
    }

    /// Rewrites a materialized instance into its raw document.
    ///
    /// References are replaced by the primary key value of the referenced instance. The output
    /// holds exactly one entry per mapped field, keyed by its document key.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::Serialization`] when a mapped field was not materialized or a
    /// reference did not materialize as a document with a primary key, and
    /// [`CodecError::Storage`] when a codec rejects a value.
    pub fn encode(&self, mut materialized: Document) -> CodecResult<Document> {
        let mut doc = Document::new();

        for (name, field) in self.fields() {
            let value = materialized.remove(name).ok_or_else(|| {
                CodecError::Serialization(format!(
                    "{} did not materialize field `{name}`",
                    self.model()
                ))
            })?;

            let value = match field {
                FieldDescriptor::Reference { target, .. } => {
                    let target = target.schema();
                    let Bson::Document(mut nested) = value else {
                        return Err(CodecError::Serialization(format!(
                            "reference `{name}` of {} did not materialize as a document",
                            self.model()
                        )));
                    };
                    let id = nested.remove(target.primary_key()).ok_or_else(|| {
                        CodecError::Serialization(format!(
                            "reference `{name}` of {} has no primary key `{}`",
                            self.model(),
                            target.primary_key()
                        ))
                    })?;
                    target.encode_value(target.primary_key(), id)?
                }
                FieldDescriptor::Plain { .. } => self.encode_value(name, value)?,
            };
            doc.insert(field.key_name(), value);
        }

        tracing::trace!(model = %self.model(), fields = doc.len(), "encoded document");
        Ok(doc)
    }

    fn encode_value(&self, field: &str, value: Bson) -> CodecResult<Bson> {
        match self.codec(field) {
            Some(codec) => codec
                .encode(value)
                .map_err(|err| CodecError::Storage(field.to_string(), err.to_string())),
            None => Ok(value),
        }
    }

    fn decode_value(&self, field: &str, value: Bson) -> CodecResult<Bson> {
        match self.codec(field) {
            Some(codec) => codec
                .decode(value)
                .map_err(|err| CodecError::Storage(field.to_string(), err.to_string())),
            None => Ok(value),
        }
    }
}
