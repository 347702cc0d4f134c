//! recordkit marshaler
//!
//! Populates records in a [`RecordStore`](recordkit_store::RecordStore) from
//! raw JSON dictionaries, following a [`Schema`](recordkit_schema::Schema).
//!
//! ```text
//! ┌──────────────┐   resolve   ┌──────────────┐   attribute phase   ┌─────────────┐
//! │  raw JSON    │────────────►│ ProtoRecords │────────────────────►│ RecordStore │
//! │  (batch)     │             │ (Arc graph)  │   relationship      │             │
//! └──────────────┘             └──────────────┘   phase, by depth   └─────────────┘
//! ```
//!
//! The [`Marshaler`] has three replaceable seams:
//!
//! - [`AttributePopulator`]: selects the raw value for one attribute
//! - [`ValueSetter`]: coerces and assigns it
//! - [`RelationshipEstablisher`]: links two records along one relationship
//!
//! Each seam receives a [`MarshalContext`], so an override can delegate to the
//! others (or to the defaults) instead of reimplementing them.
//!
//! Malformed values are absorbed: an attribute whose value cannot be coerced is
//! left untouched, a relationship with no related proto records is skipped.
//! Only integrity failures (a primary-key relationship with no parent) and
//! collaborator errors surface as [`MarshalError`].

pub mod attribute;
pub mod coerce;
pub mod config;
pub mod date;
mod error;
pub mod marshaler;
mod primary_key;
pub mod proto;
pub mod raw;
pub mod relationship;
pub mod resolver;
pub mod transform;

pub use attribute::{AttributePopulator, DefaultAttributePopulator, DefaultValueSetter, ValueSetter};
pub use config::MarshalConfig;
pub use date::{DateFormatStrategy, DateFormats, PatternDateFormat, Rfc3339DateFormat};
pub use error::MarshalError;
pub use marshaler::{MarshalContext, Marshaler};
pub use proto::ProtoRecord;
pub use raw::{RawDictionary, RawValue};
pub use relationship::{DefaultRelationshipEstablisher, RelationshipEstablisher};
pub use resolver::{MarshalReport, ProtoBatch, RecordFailure, Resolver};
pub use transform::{JsonStringTransformer, TransformRegistry, ValueTransformer};
