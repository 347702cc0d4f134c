//! Reference resolver: turns raw JSON into proto records and schedules their
//! population against a record store.
//!
//! ```text
//!  raw JSON ──► resolve ──► ProtoBatch ──► attribute phase (all protos)
//!                 │                         │
//!                 │ find-or-insert records   ▼
//!                 ▼                        relationship waves, by depth
//!            RecordStore                    │
//!                                           ▼
//!                                       MarshalReport
//! ```
//!
//! Identity: a record is matched by its entity's primary-key attribute (after
//! coercion), among records already in the store and records created earlier
//! in the same batch. Entities identified through a primary-key relationship are
//! additionally matched on their parent record.
//!
//! Protos that resolve to the same record are populated in input order by a
//! single task, so the last duplicate wins in both phases.

use crate::coerce::coerce;
use crate::proto::ProtoRecord;
use crate::raw::{select_value, RawDictionary};
use crate::{MarshalError, Marshaler};
use rayon::prelude::*;
use chrono::{DateTime, Utc};
use recordkit_schema::{AttributeValue, Cardinality, EntityDescription, RelationshipDescription, Schema};
use recordkit_store::{RecordId, RecordStore};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};

// ============================================================================
// Batches and reports
// ============================================================================

/// Every proto record resolved from one input batch.
#[derive(Debug, Default)]
pub struct ProtoBatch {
    roots: Vec<Arc<ProtoRecord>>,
    /// (nesting depth, proto), children before parents.
    protos: Vec<(usize, Arc<ProtoRecord>)>,
}

impl ProtoBatch {
    /// Proto records for the top-level input items.
    pub fn roots(&self) -> &[Arc<ProtoRecord>] {
        &self.roots
    }

    pub fn len(&self) -> usize {
        self.protos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.protos.is_empty()
    }

    pub fn protos(&self) -> impl Iterator<Item = &Arc<ProtoRecord>> {
        self.protos.iter().map(|(_, proto)| proto)
    }

    /// Proto records grouped by nesting depth, shallowest first.
    pub fn waves(&self) -> Vec<Vec<Arc<ProtoRecord>>> {
        let Some(deepest) = self.protos.iter().map(|(depth, _)| *depth).max() else {
            return Vec::new();
        };
        let mut waves = vec![Vec::new(); deepest + 1];
        for (depth, proto) in &self.protos {
            waves[*depth].push(proto.clone());
        }
        waves
    }
}

#[derive(Debug)]
pub struct RecordFailure {
    pub record: RecordId,
    pub entity: String,
    pub error: MarshalError,
}

/// Outcome of marshaling one batch.
#[derive(Debug, Default)]
pub struct MarshalReport {
    /// Records for the top-level input items, in input order.
    pub roots: Vec<RecordId>,
    /// Every record touched, in first-seen order.
    pub records: Vec<RecordId>,
    /// Per-record failures; the remaining records were populated regardless.
    pub failures: Vec<RecordFailure>,
}

impl MarshalReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

// ============================================================================
// Resolver
// ============================================================================

pub struct Resolver<'a> {
    schema: &'a Schema,
    store: &'a dyn RecordStore,
    marshaler: &'a Marshaler,
    parallel: bool,
}

/// The proto a child is nested under.
#[derive(Clone)]
struct Nesting<'e> {
    proto: Weak<ProtoRecord>,
    record: RecordId,
    entity: &'e str,
}

/// Hashable form of a coerced primary-key value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum IdentityKey {
    String(String),
    Integer(i64),
    Float(u64),
    Boolean(bool),
    Date(DateTime<Utc>),
    Binary(Vec<u8>),
    Opaque(String),
}

impl From<&AttributeValue> for IdentityKey {
    fn from(value: &AttributeValue) -> Self {
        match value {
            AttributeValue::String(s) => Self::String(s.clone()),
            AttributeValue::Integer(i) => Self::Integer(*i),
            // 0.0 and -0.0 are the same key
            AttributeValue::Float(f) if *f == 0.0 => Self::Float(0),
            AttributeValue::Float(f) => Self::Float(f.to_bits()),
            AttributeValue::Boolean(b) => Self::Boolean(*b),
            AttributeValue::Date(d) => Self::Date(*d),
            AttributeValue::Binary(bytes) => Self::Binary(bytes.clone()),
            AttributeValue::Opaque(raw) => Self::Opaque(raw.to_string()),
        }
    }
}

/// Key and parent record of one identity.
type Identity = (Option<IdentityKey>, Option<RecordId>);

#[derive(Default)]
struct ResolveState {
    /// Per entity, built from the store on first lookup and extended with
    /// every record inserted while resolving.
    identities: HashMap<String, HashMap<Identity, RecordId>>,
    protos: Vec<(usize, Arc<ProtoRecord>)>,
    error: Option<MarshalError>,
}

impl<'a> Resolver<'a> {
    pub fn new(schema: &'a Schema, store: &'a dyn RecordStore, marshaler: &'a Marshaler) -> Self {
        Self {
            schema,
            store,
            marshaler,
            parallel: true,
        }
    }

    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Resolve and populate a batch of raw items of `entity`.
    pub fn marshal(&self, entity: &str, items: &[Value]) -> Result<MarshalReport, MarshalError> {
        let batch = self.resolve(entity, items)?;
        Ok(self.marshal_batch(&batch))
    }

    /// Build proto records for `items`, finding or inserting their records.
    ///
    /// Items that are not JSON objects are skipped.
    pub fn resolve(&self, entity: &str, items: &[Value]) -> Result<ProtoBatch, MarshalError> {
        let entity = self.schema.entity(entity)?.clone();
        for (owner, attribute, format) in self.marshaler.date_formats().missing_formats(self.schema) {
            tracing::warn!(entity = owner, attribute, format, "unknown date format, using default");
        }
        let mut state = ResolveState::default();
        let mut roots = Vec::with_capacity(items.len());

        for (index, item) in items.iter().enumerate() {
            let Some(dictionary) = item.as_object() else {
                tracing::warn!(entity = %entity.name, index, "skipping non-object input item");
                continue;
            };
            roots.push(self.build(&entity, dictionary.clone(), None, 0, &mut state)?);
        }

        tracing::debug!(
            entity = %entity.name,
            roots = roots.len(),
            protos = state.protos.len(),
            "resolved batch"
        );
        Ok(ProtoBatch {
            roots,
            protos: state.protos,
        })
    }

    /// Attribute phase for every proto, then relationship phase wave by wave.
    pub fn marshal_batch(&self, batch: &ProtoBatch) -> MarshalReport {
        let mut failures = self.run(group_by_record(batch.protos().cloned()), |proto| {
            self.marshaler
                .populate_proto_record(self.schema, self.store, proto)
        });

        for wave in batch.waves() {
            failures.extend(self.run(group_by_record(wave), |proto| {
                self.marshaler
                    .establish_relationships_on_proto_record(self.schema, self.store, proto)
            }));
        }

        let mut seen = HashSet::new();
        let records = batch
            .protos()
            .map(|proto| proto.record())
            .filter(|record| seen.insert(*record))
            .collect();

        for failure in &failures {
            tracing::warn!(
                record = %failure.record,
                entity = %failure.entity,
                error = %failure.error,
                "record failed to marshal"
            );
        }

        MarshalReport {
            roots: batch.roots().iter().map(|proto| proto.record()).collect(),
            records,
            failures,
        }
    }

    /// Runs `op` over every proto; groups run concurrently, each group in order.
    fn run<F>(&self, groups: Vec<Vec<Arc<ProtoRecord>>>, op: F) -> Vec<RecordFailure>
    where
        F: Fn(&ProtoRecord) -> Result<(), MarshalError> + Sync,
    {
        let failure = |proto: &Arc<ProtoRecord>| {
            op(proto.as_ref()).err().map(|error| RecordFailure {
                record: proto.record(),
                entity: proto.entity().name.clone(),
                error,
            })
        };
        if self.parallel {
            groups
                .par_iter()
                .flat_map_iter(|group| group.iter().filter_map(failure))
                .collect()
        } else {
            groups.iter().flatten().filter_map(failure).collect()
        }
    }

    // ------------------------------------------------------------------------
    // Proto construction
    // ------------------------------------------------------------------------

    fn build(
        &self,
        entity: &Arc<EntityDescription>,
        dictionary: RawDictionary,
        nesting: Option<Nesting<'_>>,
        depth: usize,
        state: &mut ResolveState,
    ) -> Result<Arc<ProtoRecord>, MarshalError> {
        let pk_relationship = entity.primary_key_relationship();

        // The parent an identity derives from: the proto we are nested under,
        // or the proto built from the primary-key relationship's own value.
        let mut pk_related = None;
        let parent: Option<(Weak<ProtoRecord>, RecordId)> = match (pk_relationship, &nesting) {
            (Some(pk), Some(nesting)) if nesting.entity == pk.destination => {
                Some((nesting.proto.clone(), nesting.record))
            }
            (Some(pk), _) => {
                let built = self.build_related(pk, &dictionary, None, depth + 1, state)?;
                let first = built.into_iter().next();
                let parent = first
                    .as_ref()
                    .map(|proto| (Arc::downgrade(proto), proto.record()));
                pk_related = first;
                parent
            }
            (None, _) => None,
        };

        let record = self.identify(entity, &dictionary, parent.as_ref().map(|(_, r)| *r), state)?;

        let proto = Arc::new_cyclic(|weak: &Weak<ProtoRecord>| {
            let mut children = Vec::new();
            for relationship in entity.relationships.iter().filter(|r| !r.primary_key) {
                let nesting = Nesting {
                    proto: weak.clone(),
                    record,
                    entity: &entity.name,
                };
                match self.build_related(relationship, &dictionary, Some(nesting), depth + 1, state) {
                    Ok(built) => children.extend(built.into_iter().map(|p| (relationship.name.clone(), p))),
                    Err(err) => {
                        state.error.get_or_insert(err);
                    }
                }
            }

            let mut proto = ProtoRecord::new(entity.clone(), dictionary, record);
            if let Some((parent, _)) = parent {
                proto = proto.with_primary_key_parent_weak(parent);
            }
            if let (Some(pk), Some(related)) = (pk_relationship, pk_related) {
                proto = proto.with_related(pk.name.clone(), related);
            }
            for (name, child) in children {
                proto = proto.with_related(name, child);
            }
            proto
        });

        if let Some(err) = state.error.take() {
            return Err(err);
        }
        state.protos.push((depth, proto.clone()));
        Ok(proto)
    }

    /// Proto records for the raw value of `relationship`, if present.
    fn build_related(
        &self,
        relationship: &RelationshipDescription,
        dictionary: &RawDictionary,
        nesting: Option<Nesting<'_>>,
        depth: usize,
        state: &mut ResolveState,
    ) -> Result<Vec<Arc<ProtoRecord>>, MarshalError> {
        let Some(raw) = select_value(dictionary, &relationship.candidate_key_paths()) else {
            return Ok(Vec::new());
        };
        let destination = self.schema.entity(&relationship.destination)?.clone();

        let items: Vec<&Value> = match raw {
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };

        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let dictionary = match item {
                Value::Null => continue,
                Value::Object(map) => map.clone(),
                Value::Array(_) => {
                    tracing::warn!(relationship = %relationship.name, "skipping nested array");
                    continue;
                }
                scalar => match reference_dictionary(&destination, scalar) {
                    Some(dictionary) => dictionary,
                    None => {
                        tracing::warn!(
                            relationship = %relationship.name,
                            destination = %destination.name,
                            "scalar reference to an entity without a primary key, skipping"
                        );
                        continue;
                    }
                },
            };
            out.push(self.build(&destination, dictionary, nesting.clone(), depth, state)?);
        }
        Ok(out)
    }

    // ------------------------------------------------------------------------
    // Identity
    // ------------------------------------------------------------------------

    fn identify(
        &self,
        entity: &EntityDescription,
        dictionary: &RawDictionary,
        parent: Option<RecordId>,
        state: &mut ResolveState,
    ) -> Result<RecordId, MarshalError> {
        let key = entity.primary_key_attribute().and_then(|attribute| {
            let raw = select_value(dictionary, &attribute.candidate_key_paths())?;
            let date_format = self.marshaler.date_formats().for_attribute(attribute);
            coerce(raw, attribute, date_format, self.marshaler.transforms())
        });

        let identified_by_parent = key.is_none()
            && entity.primary_key.is_none()
            && parent.is_some()
            && entity.primary_key_relationship().is_some_and(|pk| {
                self.schema
                    .inverse_of(pk)
                    .map_or(true, |inverse| inverse.cardinality == Cardinality::ToOne)
            });

        // Without its parent, a parent-scoped key identifies nothing.
        let parent_missing = parent.is_none() && entity.primary_key_relationship().is_some();
        let matchable = (key.is_some() || identified_by_parent) && !parent_missing;
        let identity: Identity = (key.as_ref().map(IdentityKey::from), parent);

        if matchable {
            let index = state
                .identities
                .entry(entity.name.clone())
                .or_insert_with(|| self.index_existing(entity));
            if let Some(existing) = index.get(&identity) {
                tracing::trace!(entity = %entity.name, record = %existing, "matched record");
                return Ok(*existing);
            }
        }

        let record = self.store.insert(&entity.name)?;
        if matchable {
            state
                .identities
                .entry(entity.name.clone())
                .or_default()
                .insert(identity, record);
        }
        Ok(record)
    }

    /// Identities of the records of `entity` already in the store. When two
    /// records share an identity the lower id wins.
    fn index_existing(&self, entity: &EntityDescription) -> HashMap<Identity, RecordId> {
        let mut index = HashMap::new();
        for record in self.store.records_of(&entity.name) {
            let key = match entity.primary_key.as_deref() {
                Some(attribute) => match self.store.attribute(record, attribute).ok().flatten() {
                    Some(value) => Some(IdentityKey::from(&value)),
                    None => continue,
                },
                None => None,
            };
            let parents: Vec<Option<RecordId>> = match entity.primary_key_relationship() {
                Some(pk) => match pk.cardinality {
                    Cardinality::ToOne => self
                        .store
                        .to_one(record, &pk.name)
                        .ok()
                        .flatten()
                        .map(Some)
                        .into_iter()
                        .collect(),
                    Cardinality::ToMany => self
                        .store
                        .to_many(record, &pk.name)
                        .unwrap_or_default()
                        .into_iter()
                        .map(Some)
                        .collect(),
                },
                None => vec![None],
            };
            for parent in parents {
                index.entry((key.clone(), parent)).or_insert(record);
            }
        }
        tracing::trace!(entity = %entity.name, identities = index.len(), "indexed existing records");
        index
    }
}

/// Protos grouped by their record, groups in first-seen order and each group
/// in input order.
fn group_by_record(protos: impl IntoIterator<Item = Arc<ProtoRecord>>) -> Vec<Vec<Arc<ProtoRecord>>> {
    let mut slots: HashMap<RecordId, usize> = HashMap::new();
    let mut groups: Vec<Vec<Arc<ProtoRecord>>> = Vec::new();
    for proto in protos {
        let slot = *slots.entry(proto.record()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(proto);
    }
    groups
}

/// `{primary_key: scalar}` for a relationship value given as a bare key.
fn reference_dictionary(destination: &EntityDescription, scalar: &Value) -> Option<RawDictionary> {
    let attribute = destination.primary_key_attribute()?;
    let key_path = attribute.candidate_key_paths().first()?.to_string();
    let mut dictionary = RawDictionary::new();
    dictionary.insert(key_path, scalar.clone());
    Some(dictionary)
}
