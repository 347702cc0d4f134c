//! Primary-key relationships.
//!
//! Some entities are identified by their parent rather than by a literal key
//! (a comment identified by its post and position, a profile by its user).
//! The link to that parent is established before any other relationship of the
//! record, through the regular establishment seam.

use crate::marshaler::MarshalContext;
use crate::proto::ProtoRecord;
use crate::MarshalError;

pub(crate) fn establish_primary_key_relationship(
    cx: &MarshalContext<'_>,
    child: &ProtoRecord,
    parent: &ProtoRecord,
) -> Result<(), MarshalError> {
    let entity = child.entity();
    let relationship = entity
        .primary_key_relationship()
        .ok_or_else(|| MarshalError::NoPrimaryKeyRelationship {
            entity: entity.name.clone(),
        })?;

    if parent.entity().name != relationship.destination {
        return Err(MarshalError::ParentEntityMismatch {
            relationship: relationship.name.clone(),
            expected: relationship.destination.clone(),
            found: parent.entity().name.clone(),
        });
    }

    tracing::debug!(
        entity = %entity.name,
        relationship = %relationship.name,
        child = %child.record(),
        parent = %parent.record(),
        "establishing primary-key relationship"
    );
    cx.establish_relationship(relationship, child.record(), parent.record())
}
