//! Relationship establishment seam.

use crate::marshaler::MarshalContext;
use crate::MarshalError;
use recordkit_schema::{Cardinality, DeleteRule, RelationshipDescription};
use recordkit_store::{RecordId, RecordStore};

/// Links `from` to `to` along one relationship.
///
/// Custom establishers can skip links, prune collections, or post-process and
/// still delegate to [`DefaultRelationshipEstablisher`].
pub trait RelationshipEstablisher: Send + Sync {
    fn establish_relationship(
        &self,
        cx: &MarshalContext<'_>,
        relationship: &RelationshipDescription,
        from: RecordId,
        to: RecordId,
    ) -> Result<(), MarshalError>;
}

/// Default linking rules:
///
/// - to-one replaces the previous target, which is detached from its inverse
///   or, under [`DeleteRule::Cascade`], handed to the store for deletion;
/// - to-many adds `to` once, re-adding is a no-op;
/// - a declared inverse is kept in step, and a stale holder of a to-one
///   inverse is detached before the inverse is re-pointed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRelationshipEstablisher;

impl RelationshipEstablisher for DefaultRelationshipEstablisher {
    fn establish_relationship(
        &self,
        cx: &MarshalContext<'_>,
        relationship: &RelationshipDescription,
        from: RecordId,
        to: RecordId,
    ) -> Result<(), MarshalError> {
        let store = cx.store();
        let inverse = cx.inverse_of(relationship);

        match relationship.cardinality {
            Cardinality::ToOne => {
                let previous = store.to_one(from, &relationship.name)?;
                if previous != Some(to) {
                    store.set_to_one(from, &relationship.name, Some(to))?;
                    if let Some(previous) = previous {
                        release_previous(store, relationship, inverse, from, previous)?;
                    }
                }
            }
            Cardinality::ToMany => {
                if !store.add_to_many(from, &relationship.name, to)? {
                    tracing::trace!(
                        relationship = %relationship.name,
                        from = %from,
                        to = %to,
                        "already a member"
                    );
                }
            }
        }

        if let Some(inverse) = inverse {
            link_inverse(store, relationship, inverse, from, to)?;
        }
        Ok(())
    }
}

fn release_previous(
    store: &dyn RecordStore,
    relationship: &RelationshipDescription,
    inverse: Option<&RelationshipDescription>,
    from: RecordId,
    previous: RecordId,
) -> Result<(), MarshalError> {
    match relationship.delete_rule {
        DeleteRule::Cascade => {
            tracing::debug!(
                relationship = %relationship.name,
                record = %previous,
                "cascading delete of replaced record"
            );
            store.delete(previous)?;
        }
        DeleteRule::Nullify => {
            if let Some(inverse) = inverse {
                detach(store, inverse, previous, from)?;
            }
        }
    }
    Ok(())
}

/// Point `to`'s inverse side back at `from`.
fn link_inverse(
    store: &dyn RecordStore,
    relationship: &RelationshipDescription,
    inverse: &RelationshipDescription,
    from: RecordId,
    to: RecordId,
) -> Result<(), MarshalError> {
    match inverse.cardinality {
        Cardinality::ToOne => {
            let current = store.to_one(to, &inverse.name)?;
            if current == Some(from) {
                return Ok(());
            }
            if let Some(stale) = current {
                detach(store, relationship, stale, to)?;
            }
            store.set_to_one(to, &inverse.name, Some(from))?;
        }
        Cardinality::ToMany => {
            store.add_to_many(to, &inverse.name, from)?;
        }
    }
    Ok(())
}

/// Remove `target` from `holder`'s side of `relationship`.
fn detach(
    store: &dyn RecordStore,
    relationship: &RelationshipDescription,
    holder: RecordId,
    target: RecordId,
) -> Result<(), MarshalError> {
    match relationship.cardinality {
        Cardinality::ToOne => {
            if store.to_one(holder, &relationship.name)? == Some(target) {
                store.set_to_one(holder, &relationship.name, None)?;
            }
        }
        Cardinality::ToMany => {
            store.remove_from_many(holder, &relationship.name, target)?;
        }
    }
    Ok(())
}
