//! recordkit record store
//!
//! The record store owns every record the marshaler populates. The marshaler
//! never creates records; it only sets attributes and links records that the
//! resolver obtained from the store.
//!
//! Stores take `&self` everywhere and synchronize internally, so independent
//! proto records can be populated from several threads against one store.

pub mod memory;

pub use memory::{MemoryStore, RecordView};

use recordkit_schema::AttributeValue;
use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Record handles
// ============================================================================

/// Handle to a record owned by a [`RecordStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct RecordId(u32);

impl RecordId {
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u32 {
        self.0
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("unknown record {0}")]
    UnknownRecord(RecordId),

    #[error("record id space exhausted")]
    IdSpaceExhausted,
}

// ============================================================================
// Store interface
// ============================================================================

/// Storage for records and the links between them.
///
/// Relationship names are only meaningful per record: a store keeps to-one and
/// to-many links in separate namespaces and does not consult the schema.
pub trait RecordStore: Send + Sync {
    /// Create an empty record of the given entity.
    fn insert(&self, entity: &str) -> Result<RecordId, StoreError>;

    /// Entity name of a live record.
    fn entity_of(&self, record: RecordId) -> Result<String, StoreError>;

    /// All live records of an entity, in insertion order.
    fn records_of(&self, entity: &str) -> Vec<RecordId>;

    fn attribute(&self, record: RecordId, name: &str) -> Result<Option<AttributeValue>, StoreError>;

    /// Set (`Some`) or clear (`None`) an attribute.
    fn set_attribute(
        &self,
        record: RecordId,
        name: &str,
        value: Option<AttributeValue>,
    ) -> Result<(), StoreError>;

    fn to_one(&self, record: RecordId, relationship: &str) -> Result<Option<RecordId>, StoreError>;

    fn set_to_one(
        &self,
        record: RecordId,
        relationship: &str,
        target: Option<RecordId>,
    ) -> Result<(), StoreError>;

    fn to_many(&self, record: RecordId, relationship: &str) -> Result<Vec<RecordId>, StoreError>;

    /// Add `target` to a to-many collection. Returns `false` if it was already a member.
    fn add_to_many(
        &self,
        record: RecordId,
        relationship: &str,
        target: RecordId,
    ) -> Result<bool, StoreError>;

    /// Remove `target` from a to-many collection. Returns `false` if it was not a member.
    fn remove_from_many(
        &self,
        record: RecordId,
        relationship: &str,
        target: RecordId,
    ) -> Result<bool, StoreError>;

    /// Delete a record and detach every link pointing at it.
    fn delete(&self, record: RecordId) -> Result<(), StoreError>;

    fn contains(&self, record: RecordId) -> bool {
        self.entity_of(record).is_ok()
    }
}
