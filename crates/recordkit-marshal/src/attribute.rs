//! Attribute population seams.
//!
//! [`AttributePopulator`] owns key selection for one attribute and
//! [`ValueSetter`] owns coercion and assignment. Either can be replaced on the
//! [`Marshaler`](crate::Marshaler) while the other keeps its default behavior.

use crate::date::DateFormatStrategy;
use crate::marshaler::MarshalContext;
use crate::proto::ProtoRecord;
use crate::raw::{select_value, RawDictionary};
use crate::MarshalError;
use recordkit_schema::AttributeDescription;
use recordkit_store::RecordId;
use serde_json::Value;

/// Populates one attribute of a proto record from a dictionary.
pub trait AttributePopulator: Send + Sync {
    fn populate_attribute(
        &self,
        cx: &MarshalContext<'_>,
        proto: &ProtoRecord,
        attribute: &AttributeDescription,
        dictionary: &RawDictionary,
    ) -> Result<(), MarshalError>;
}

/// Coerces a selected raw value and assigns it to a record.
pub trait ValueSetter: Send + Sync {
    fn set_value(
        &self,
        cx: &MarshalContext<'_>,
        raw: &Value,
        record: RecordId,
        attribute: &AttributeDescription,
        date_format: &dyn DateFormatStrategy,
    ) -> Result<(), MarshalError>;
}

/// Picks the first present candidate key path and hands its value to the
/// context's [`ValueSetter`]. An attribute with no present candidate is left alone.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAttributePopulator;

impl AttributePopulator for DefaultAttributePopulator {
    fn populate_attribute(
        &self,
        cx: &MarshalContext<'_>,
        proto: &ProtoRecord,
        attribute: &AttributeDescription,
        dictionary: &RawDictionary,
    ) -> Result<(), MarshalError> {
        let Some(raw) = select_value(dictionary, &attribute.candidate_key_paths()) else {
            tracing::trace!(
                entity = %proto.entity().name,
                attribute = %attribute.name,
                "no candidate key path present"
            );
            return Ok(());
        };

        let date_format = cx.date_format_for(attribute);
        cx.set_value(raw, proto.record(), attribute, date_format)
    }
}

/// `null` clears the attribute; anything else is coerced and assigned, or
/// dropped when it cannot be coerced.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultValueSetter;

impl ValueSetter for DefaultValueSetter {
    fn set_value(
        &self,
        cx: &MarshalContext<'_>,
        raw: &Value,
        record: RecordId,
        attribute: &AttributeDescription,
        date_format: &dyn DateFormatStrategy,
    ) -> Result<(), MarshalError> {
        if raw.is_null() {
            cx.store().set_attribute(record, &attribute.name, None)?;
            return Ok(());
        }

        match cx.coerce(raw, attribute, date_format) {
            Some(value) => cx.store().set_attribute(record, &attribute.name, Some(value))?,
            None => tracing::debug!(
                record = %record,
                attribute = %attribute.name,
                expected = %attribute.attribute_type,
                raw = %raw,
                "dropping value that does not coerce"
            ),
        }
        Ok(())
    }
}
