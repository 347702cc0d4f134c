//! The marshaler: drives attribute population and relationship establishment
//! for one proto record at a time.

use crate::attribute::{
    AttributePopulator, DefaultAttributePopulator, DefaultValueSetter, ValueSetter,
};
use crate::coerce::coerce;
use crate::config::MarshalConfig;
use crate::date::{DateFormatStrategy, DateFormats};
use crate::primary_key;
use crate::proto::ProtoRecord;
use crate::raw::RawDictionary;
use crate::relationship::{DefaultRelationshipEstablisher, RelationshipEstablisher};
use crate::transform::TransformRegistry;
use crate::MarshalError;
use recordkit_schema::{AttributeDescription, AttributeValue, RelationshipDescription, Schema};
use recordkit_store::{RecordId, RecordStore};
use serde_json::Value;
use std::sync::Arc;

// ============================================================================
// Marshaler
// ============================================================================

/// Populates records from proto records.
///
/// A marshaler holds only its strategies and is immutable once built, so one
/// instance can serve any number of threads. Every operation takes the schema
/// and the record store explicitly.
#[derive(Clone)]
pub struct Marshaler {
    attributes: Arc<dyn AttributePopulator>,
    values: Arc<dyn ValueSetter>,
    relationships: Arc<dyn RelationshipEstablisher>,
    date_formats: DateFormats,
    transforms: TransformRegistry,
}

impl Default for Marshaler {
    fn default() -> Self {
        Self {
            attributes: Arc::new(DefaultAttributePopulator),
            values: Arc::new(DefaultValueSetter),
            relationships: Arc::new(DefaultRelationshipEstablisher),
            date_formats: DateFormats::default(),
            transforms: TransformRegistry::with_builtins(),
        }
    }
}

impl std::fmt::Debug for Marshaler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Marshaler")
            .field("date_formats", &self.date_formats)
            .field("transforms", &self.transforms)
            .finish_non_exhaustive()
    }
}

impl Marshaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MarshalConfig) -> Self {
        Self::new().with_date_formats(config.date_formats())
    }

    pub fn with_attribute_populator(mut self, populator: impl AttributePopulator + 'static) -> Self {
        self.attributes = Arc::new(populator);
        self
    }

    pub fn with_value_setter(mut self, setter: impl ValueSetter + 'static) -> Self {
        self.values = Arc::new(setter);
        self
    }

    pub fn with_relationship_establisher(
        mut self,
        establisher: impl RelationshipEstablisher + 'static,
    ) -> Self {
        self.relationships = Arc::new(establisher);
        self
    }

    pub fn with_date_formats(mut self, date_formats: DateFormats) -> Self {
        self.date_formats = date_formats;
        self
    }

    pub fn with_transforms(mut self, transforms: TransformRegistry) -> Self {
        self.transforms = transforms;
        self
    }

    pub fn date_formats(&self) -> &DateFormats {
        &self.date_formats
    }

    pub fn transforms(&self) -> &TransformRegistry {
        &self.transforms
    }

    pub fn context<'a>(&'a self, schema: &'a Schema, store: &'a dyn RecordStore) -> MarshalContext<'a> {
        MarshalContext {
            marshaler: self,
            schema,
            store,
        }
    }

    /// Attribute phase: populate every attribute the proto's entity declares,
    /// in schema order.
    pub fn populate_proto_record(
        &self,
        schema: &Schema,
        store: &dyn RecordStore,
        proto: &ProtoRecord,
    ) -> Result<(), MarshalError> {
        let cx = self.context(schema, store);
        let entity = proto.entity();
        tracing::debug!(
            entity = %entity.name,
            record = %proto.record(),
            attributes = entity.attributes.len(),
            "populating attributes"
        );
        for attribute in &entity.attributes {
            cx.populate_attribute(proto, attribute, proto.dictionary())?;
        }
        Ok(())
    }

    /// Relationship phase: the primary-key relationship first, then every other
    /// declared relationship that has related proto records.
    pub fn establish_relationships_on_proto_record(
        &self,
        schema: &Schema,
        store: &dyn RecordStore,
        proto: &ProtoRecord,
    ) -> Result<(), MarshalError> {
        let cx = self.context(schema, store);
        let entity = proto.entity();

        if let Some(relationship) = entity.primary_key_relationship() {
            let parent =
                proto
                    .primary_key_parent()
                    .ok_or_else(|| MarshalError::MissingPrimaryKeyParent {
                        entity: entity.name.clone(),
                        relationship: relationship.name.clone(),
                        record: proto.record(),
                    })?;
            primary_key::establish_primary_key_relationship(&cx, proto, &parent)?;
        }

        for relationship in entity.relationships.iter().filter(|r| !r.primary_key) {
            let related = proto.related(&relationship.name);
            if related.is_empty() {
                tracing::trace!(
                    entity = %entity.name,
                    relationship = %relationship.name,
                    "no related proto records, skipping"
                );
                continue;
            }
            for target in related {
                cx.establish_relationship(relationship, proto.record(), target.record())?;
            }
        }
        Ok(())
    }

    /// Link `child` to the parent its identity derives from.
    pub fn establish_primary_key_relationship(
        &self,
        schema: &Schema,
        store: &dyn RecordStore,
        child: &ProtoRecord,
        parent: &ProtoRecord,
    ) -> Result<(), MarshalError> {
        let cx = self.context(schema, store);
        primary_key::establish_primary_key_relationship(&cx, child, parent)
    }
}

// ============================================================================
// Context handed to seams
// ============================================================================

/// Everything a seam may use during one operation: the schema, the record
/// store, and the marshaler's other seams and strategies.
#[derive(Clone, Copy)]
pub struct MarshalContext<'a> {
    marshaler: &'a Marshaler,
    schema: &'a Schema,
    store: &'a dyn RecordStore,
}

impl<'a> MarshalContext<'a> {
    pub fn marshaler(&self) -> &'a Marshaler {
        self.marshaler
    }

    pub fn schema(&self) -> &'a Schema {
        self.schema
    }

    pub fn store(&self) -> &'a dyn RecordStore {
        self.store
    }

    pub fn date_format_for(&self, attribute: &AttributeDescription) -> &'a dyn DateFormatStrategy {
        self.marshaler.date_formats.for_attribute(attribute)
    }

    pub fn coerce(
        &self,
        raw: &Value,
        attribute: &AttributeDescription,
        date_format: &dyn DateFormatStrategy,
    ) -> Option<AttributeValue> {
        coerce(raw, attribute, date_format, &self.marshaler.transforms)
    }

    /// The declared inverse of `relationship`, if it exists in the schema.
    pub fn inverse_of(&self, relationship: &RelationshipDescription) -> Option<&'a RelationshipDescription> {
        let inverse = self.schema.inverse_of(relationship);
        if inverse.is_none() && relationship.inverse.is_some() {
            tracing::warn!(
                relationship = %relationship.name,
                destination = %relationship.destination,
                inverse = ?relationship.inverse,
                "declared inverse not found, linking one side only"
            );
        }
        inverse
    }

    /// Run the configured [`AttributePopulator`].
    pub fn populate_attribute(
        &self,
        proto: &ProtoRecord,
        attribute: &AttributeDescription,
        dictionary: &RawDictionary,
    ) -> Result<(), MarshalError> {
        self.marshaler
            .attributes
            .populate_attribute(self, proto, attribute, dictionary)
    }

    /// Run the configured [`ValueSetter`].
    pub fn set_value(
        &self,
        raw: &Value,
        record: RecordId,
        attribute: &AttributeDescription,
        date_format: &dyn DateFormatStrategy,
    ) -> Result<(), MarshalError> {
        self.marshaler
            .values
            .set_value(self, raw, record, attribute, date_format)
    }

    /// Run the configured [`RelationshipEstablisher`].
    pub fn establish_relationship(
        &self,
        relationship: &RelationshipDescription,
        from: RecordId,
        to: RecordId,
    ) -> Result<(), MarshalError> {
        self.marshaler
            .relationships
            .establish_relationship(self, relationship, from, to)
    }
}
