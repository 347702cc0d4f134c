//! Proto records: one raw input item on its way into a record.

use crate::raw::RawDictionary;
use recordkit_schema::EntityDescription;
use recordkit_store::RecordId;
use std::sync::{Arc, Weak};

/// Transient carrier of one raw dictionary, the record it populates, and the
/// proto records of any related raw data resolved alongside it.
///
/// Proto records are built by a resolver, consumed once by the marshaler and
/// then dropped. The primary-key parent is held weakly: the resolver's batch
/// owns every proto, and a parent that no longer exists is an integrity failure.
#[derive(Debug)]
pub struct ProtoRecord {
    entity: Arc<EntityDescription>,
    dictionary: RawDictionary,
    record: RecordId,
    related: Vec<(String, Vec<Arc<ProtoRecord>>)>,
    primary_key_parent: Option<Weak<ProtoRecord>>,
}

impl ProtoRecord {
    pub fn new(entity: Arc<EntityDescription>, dictionary: RawDictionary, record: RecordId) -> Self {
        Self {
            entity,
            dictionary,
            record,
            related: Vec::new(),
            primary_key_parent: None,
        }
    }

    /// Attach a related proto record under `relationship`.
    pub fn with_related(mut self, relationship: impl Into<String>, proto: Arc<ProtoRecord>) -> Self {
        let relationship = relationship.into();
        match self.related.iter_mut().find(|(name, _)| *name == relationship) {
            Some((_, protos)) => protos.push(proto),
            None => self.related.push((relationship, vec![proto])),
        }
        self
    }

    pub fn with_primary_key_parent(self, parent: &Arc<ProtoRecord>) -> Self {
        self.with_primary_key_parent_weak(Arc::downgrade(parent))
    }

    pub(crate) fn with_primary_key_parent_weak(mut self, parent: Weak<ProtoRecord>) -> Self {
        self.primary_key_parent = Some(parent);
        self
    }

    pub fn entity(&self) -> &Arc<EntityDescription> {
        &self.entity
    }

    pub fn dictionary(&self) -> &RawDictionary {
        &self.dictionary
    }

    pub fn record(&self) -> RecordId {
        self.record
    }

    /// Related proto records resolved for `relationship`; empty when none.
    pub fn related(&self, relationship: &str) -> &[Arc<ProtoRecord>] {
        self.related
            .iter()
            .find(|(name, _)| name == relationship)
            .map(|(_, protos)| protos.as_slice())
            .unwrap_or(&[])
    }

    /// The primary-key parent, if one was linked and is still alive.
    pub fn primary_key_parent(&self) -> Option<Arc<ProtoRecord>> {
        self.primary_key_parent.as_ref()?.upgrade()
    }
}
