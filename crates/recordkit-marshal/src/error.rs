use recordkit_schema::SchemaError;
use recordkit_store::{RecordId, StoreError};

/// Failures that escape a marshaling operation.
///
/// Malformed field values never show up here: they are absorbed per attribute
/// or per relationship. What remains are integrity failures for one proto
/// record and errors from the collaborators.
#[derive(Debug, thiserror::Error)]
pub enum MarshalError {
    #[error(
        "record {record} of `{entity}` is identified by `{relationship}` but no parent proto record was resolved"
    )]
    MissingPrimaryKeyParent {
        entity: String,
        relationship: String,
        record: RecordId,
    },

    #[error("entity `{entity}` has no primary-key relationship")]
    NoPrimaryKeyRelationship { entity: String },

    #[error("primary-key relationship `{relationship}` expects a `{expected}` parent, got `{found}`")]
    ParentEntityMismatch {
        relationship: String,
        expected: String,
        found: String,
    },

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("record store error: {0}")]
    Store(#[from] StoreError),
}

impl MarshalError {
    /// Integrity failures concern a single proto record and leave the rest of a
    /// batch intact.
    pub fn is_integrity_failure(&self) -> bool {
        matches!(
            self,
            Self::MissingPrimaryKeyParent { .. }
                | Self::NoPrimaryKeyRelationship { .. }
                | Self::ParentEntityMismatch { .. }
        )
    }
}
