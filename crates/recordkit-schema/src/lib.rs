//! recordkit schema descriptions
//!
//! A schema is an ordered set of entity descriptions. Each entity declares its
//! attributes (typed scalar or opaque fields, each with candidate key paths into
//! the raw data) and its relationships (typed edges to other entities, with
//! cardinality, delete rule, inverse pairing, and an optional primary-key flag).
//!
//! Schemas are immutable once built and are passed explicitly to every
//! marshaling operation. There is no global registry.
//!
//! ```text
//! Schema
//!  └── EntityDescription (Post)
//!       ├── AttributeDescription  id: integer      key_paths [id]
//!       ├── AttributeDescription  title: string    key_paths [title, name]
//!       └── RelationshipDescription comments: to_many -> Comment (inverse post)
//! ```

pub mod attribute;
pub mod entity;
pub mod relationship;
pub mod value;

pub use attribute::{AttributeDescription, AttributeType};
pub use entity::EntityDescription;
pub use relationship::{Cardinality, DeleteRule, RelationshipDescription};
pub use value::AttributeValue;

use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid schema document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unknown entity `{0}`")]
    UnknownEntity(String),

    #[error("duplicate entity `{0}`")]
    DuplicateEntity(String),

    #[error("entity `{entity}` declares more than one primary-key relationship")]
    MultiplePrimaryKeyRelationships { entity: String },
}

// ============================================================================
// Schema
// ============================================================================

/// On-disk shape of a schema document.
#[derive(Debug, Deserialize)]
struct SchemaDocument {
    entities: Vec<EntityDescription>,
}

/// Ordered collection of entity descriptions.
#[derive(Debug, Clone, Default)]
pub struct Schema {
    entities: Vec<Arc<EntityDescription>>,
}

impl Schema {
    pub fn new(entities: Vec<EntityDescription>) -> Result<Self, SchemaError> {
        let mut out: Vec<Arc<EntityDescription>> = Vec::with_capacity(entities.len());
        for entity in entities {
            if out.iter().any(|e| e.name == entity.name) {
                return Err(SchemaError::DuplicateEntity(entity.name));
            }
            if entity
                .relationships
                .iter()
                .filter(|r| r.primary_key)
                .count()
                > 1
            {
                return Err(SchemaError::MultiplePrimaryKeyRelationships {
                    entity: entity.name,
                });
            }
            out.push(Arc::new(entity));
        }
        Ok(Self { entities: out })
    }

    /// Parse a JSON schema document of the form `{"entities": [...]}`.
    pub fn from_json_str(text: &str) -> Result<Self, SchemaError> {
        let doc: SchemaDocument = serde_json::from_str(text)?;
        Self::new(doc.entities)
    }

    pub fn entities(&self) -> impl Iterator<Item = &Arc<EntityDescription>> {
        self.entities.iter()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Look up an entity by name.
    pub fn entity(&self, name: &str) -> Result<&Arc<EntityDescription>, SchemaError> {
        self.entities
            .iter()
            .find(|e| e.name == name)
            .ok_or_else(|| SchemaError::UnknownEntity(name.to_string()))
    }

    /// The relationship on the destination entity that `relationship` names as
    /// its inverse, if both the entity and the relationship exist.
    pub fn inverse_of(
        &self,
        relationship: &RelationshipDescription,
    ) -> Option<&RelationshipDescription> {
        let inverse = relationship.inverse.as_deref()?;
        self.entity(&relationship.destination)
            .ok()?
            .relationship(inverse)
    }
}
