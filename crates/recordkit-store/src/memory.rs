//! In-memory record store.
//!
//! Records live in a dense vector indexed by [`RecordId`]; deleted slots are
//! kept as tombstones so ids are never reused. An entity index of roaring
//! bitmaps answers `records_of` without scanning.

use crate::{RecordId, RecordStore, StoreError};
use parking_lot::RwLock;
use recordkit_schema::AttributeValue;
use serde::Serialize;
use roaring::RoaringBitmap;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone, Default)]
struct RecordData {
    entity: String,
    attributes: BTreeMap<String, AttributeValue>,
    to_one: BTreeMap<String, RecordId>,
    /// Ordered collections, no duplicate members.
    to_many: BTreeMap<String, Vec<RecordId>>,
}

#[derive(Debug, Default)]
struct StoreInner {
    records: Vec<Option<RecordData>>,
    entity_index: HashMap<String, RoaringBitmap>,
}

impl StoreInner {
    fn get(&self, record: RecordId) -> Result<&RecordData, StoreError> {
        self.records
            .get(record.raw() as usize)
            .and_then(Option::as_ref)
            .ok_or(StoreError::UnknownRecord(record))
    }

    fn get_mut(&mut self, record: RecordId) -> Result<&mut RecordData, StoreError> {
        self.records
            .get_mut(record.raw() as usize)
            .and_then(Option::as_mut)
            .ok_or(StoreError::UnknownRecord(record))
    }
}

/// Id for the slot at `len`; ids are never reused, so running out is an error.
fn next_record_id(len: usize) -> Result<RecordId, StoreError> {
    u32::try_from(len)
        .map(RecordId::new)
        .map_err(|_| StoreError::IdSpaceExhausted)
}

/// Snapshot of one record with every link resolved to ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordView {
    pub id: RecordId,
    pub entity: String,
    pub attributes: BTreeMap<String, AttributeValue>,
    pub to_one: BTreeMap<String, RecordId>,
    pub to_many: BTreeMap<String, Vec<RecordId>>,
}

/// Thread-safe in-memory [`RecordStore`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.inner.read().records.iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn view(&self, record: RecordId) -> Option<RecordView> {
        let inner = self.inner.read();
        let data = inner.get(record).ok()?;
        Some(RecordView {
            id: record,
            entity: data.entity.clone(),
            attributes: data.attributes.clone(),
            to_one: data.to_one.clone(),
            to_many: data.to_many.clone(),
        })
    }

    /// Snapshots of every live record, in id order.
    pub fn views(&self) -> Vec<RecordView> {
        let ids: Vec<RecordId> = {
            let inner = self.inner.read();
            inner
                .records
                .iter()
                .enumerate()
                .filter(|(_, slot)| slot.is_some())
                .filter_map(|(i, _)| next_record_id(i).ok())
                .collect()
        };
        ids.into_iter().filter_map(|id| self.view(id)).collect()
    }
}

impl RecordStore for MemoryStore {
    fn insert(&self, entity: &str) -> Result<RecordId, StoreError> {
        let mut inner = self.inner.write();
        let id = next_record_id(inner.records.len())?;
        inner.records.push(Some(RecordData {
            entity: entity.to_string(),
            ..RecordData::default()
        }));
        inner
            .entity_index
            .entry(entity.to_string())
            .or_insert_with(RoaringBitmap::new)
            .insert(id.raw());
        tracing::trace!(record = %id, entity, "inserted record");
        Ok(id)
    }

    fn entity_of(&self, record: RecordId) -> Result<String, StoreError> {
        Ok(self.inner.read().get(record)?.entity.clone())
    }

    fn records_of(&self, entity: &str) -> Vec<RecordId> {
        self.inner
            .read()
            .entity_index
            .get(entity)
            .map(|ids| ids.iter().map(RecordId::new).collect())
            .unwrap_or_default()
    }

    fn attribute(&self, record: RecordId, name: &str) -> Result<Option<AttributeValue>, StoreError> {
        Ok(self.inner.read().get(record)?.attributes.get(name).cloned())
    }

    fn set_attribute(
        &self,
        record: RecordId,
        name: &str,
        value: Option<AttributeValue>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let data = inner.get_mut(record)?;
        match value {
            Some(value) => {
                data.attributes.insert(name.to_string(), value);
            }
            None => {
                data.attributes.remove(name);
            }
        }
        Ok(())
    }

    fn to_one(&self, record: RecordId, relationship: &str) -> Result<Option<RecordId>, StoreError> {
        Ok(self.inner.read().get(record)?.to_one.get(relationship).copied())
    }

    fn set_to_one(
        &self,
        record: RecordId,
        relationship: &str,
        target: Option<RecordId>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        if let Some(target) = target {
            inner.get(target)?;
        }
        let data = inner.get_mut(record)?;
        match target {
            Some(target) => {
                data.to_one.insert(relationship.to_string(), target);
            }
            None => {
                data.to_one.remove(relationship);
            }
        }
        Ok(())
    }

    fn to_many(&self, record: RecordId, relationship: &str) -> Result<Vec<RecordId>, StoreError> {
        Ok(self
            .inner
            .read()
            .get(record)?
            .to_many
            .get(relationship)
            .cloned()
            .unwrap_or_default())
    }

    fn add_to_many(
        &self,
        record: RecordId,
        relationship: &str,
        target: RecordId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        inner.get(target)?;
        let members = inner
            .get_mut(record)?
            .to_many
            .entry(relationship.to_string())
            .or_default();
        if members.contains(&target) {
            return Ok(false);
        }
        members.push(target);
        Ok(true)
    }

    fn remove_from_many(
        &self,
        record: RecordId,
        relationship: &str,
        target: RecordId,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write();
        let Some(members) = inner.get_mut(record)?.to_many.get_mut(relationship) else {
            return Ok(false);
        };
        let before = members.len();
        members.retain(|m| *m != target);
        Ok(members.len() != before)
    }

    fn delete(&self, record: RecordId) -> Result<(), StoreError> {
        let mut inner = self.inner.write();
        let data = inner
            .records
            .get_mut(record.raw() as usize)
            .and_then(Option::take)
            .ok_or(StoreError::UnknownRecord(record))?;

        if let Some(ids) = inner.entity_index.get_mut(&data.entity) {
            ids.remove(record.raw());
        }

        for other in inner.records.iter_mut().flatten() {
            other.to_one.retain(|_, target| *target != record);
            for members in other.to_many.values_mut() {
                members.retain(|m| *m != record);
            }
        }

        tracing::debug!(record = %record, entity = %data.entity, "deleted record");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_assigns_sequential_ids_per_store() {
        let store = MemoryStore::new();
        let a = store.insert("Post").unwrap();
        let b = store.insert("Comment").unwrap();
        let c = store.insert("Post").unwrap();
        assert_eq!((a.raw(), b.raw(), c.raw()), (0, 1, 2));
        assert_eq!(store.records_of("Post"), vec![a, c]);
        assert_eq!(store.records_of("Comment"), vec![b]);
        assert!(store.records_of("Tag").is_empty());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn attributes_set_and_clear() {
        let store = MemoryStore::new();
        let post = store.insert("Post").unwrap();
        store
            .set_attribute(post, "title", Some("Hello".into()))
            .unwrap();
        assert_eq!(
            store.attribute(post, "title").unwrap(),
            Some(AttributeValue::String("Hello".into()))
        );
        store.set_attribute(post, "title", None).unwrap();
        assert_eq!(store.attribute(post, "title").unwrap(), None);
    }

    #[test]
    fn to_many_has_set_semantics() {
        let store = MemoryStore::new();
        let post = store.insert("Post").unwrap();
        let comment = store.insert("Comment").unwrap();
        assert!(store.add_to_many(post, "comments", comment).unwrap());
        assert!(!store.add_to_many(post, "comments", comment).unwrap());
        assert_eq!(store.to_many(post, "comments").unwrap(), vec![comment]);
        assert!(store.remove_from_many(post, "comments", comment).unwrap());
        assert!(!store.remove_from_many(post, "comments", comment).unwrap());
    }

    #[test]
    fn delete_detaches_incoming_links() {
        let store = MemoryStore::new();
        let post = store.insert("Post").unwrap();
        let author = store.insert("Author").unwrap();
        let comment = store.insert("Comment").unwrap();
        store.set_to_one(post, "author", Some(author)).unwrap();
        store.add_to_many(post, "comments", comment).unwrap();
        store.set_to_one(comment, "post", Some(post)).unwrap();

        store.delete(comment).unwrap();
        assert!(!store.contains(comment));
        assert!(store.to_many(post, "comments").unwrap().is_empty());
        assert!(store.records_of("Comment").is_empty());

        store.delete(author).unwrap();
        assert_eq!(store.to_one(post, "author").unwrap(), None);
        assert_eq!(
            store.delete(author),
            Err(StoreError::UnknownRecord(author))
        );
    }

    #[test]
    fn links_to_unknown_records_are_rejected() {
        let store = MemoryStore::new();
        let post = store.insert("Post").unwrap();
        let ghost = RecordId::new(42);
        assert_eq!(
            store.set_to_one(post, "author", Some(ghost)),
            Err(StoreError::UnknownRecord(ghost))
        );
        assert_eq!(
            store.add_to_many(post, "comments", ghost),
            Err(StoreError::UnknownRecord(ghost))
        );
        assert_eq!(store.attribute(ghost, "x"), Err(StoreError::UnknownRecord(ghost)));
    }

    #[test]
    fn exhausted_id_space_is_an_error() {
        assert_eq!(next_record_id(7), Ok(RecordId::new(7)));
        assert_eq!(next_record_id(u32::MAX as usize), Ok(RecordId::new(u32::MAX)));
        assert_eq!(
            next_record_id(u32::MAX as usize + 1),
            Err(StoreError::IdSpaceExhausted)
        );
    }
}
