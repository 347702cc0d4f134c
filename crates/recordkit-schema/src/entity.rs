//! Entity descriptions.

use crate::{AttributeDescription, RelationshipDescription};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescription {
    pub name: String,
    /// Attribute holding the record's literal identity, if any.
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeDescription>,
    #[serde(default)]
    pub relationships: Vec<RelationshipDescription>,
}

impl EntityDescription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: None,
            attributes: Vec::new(),
            relationships: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, attribute: impl Into<String>) -> Self {
        self.primary_key = Some(attribute.into());
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeDescription) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn with_relationship(mut self, relationship: RelationshipDescription) -> Self {
        self.relationships.push(relationship);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeDescription> {
        self.attributes.iter().find(|a| a.name == name)
    }

    pub fn relationship(&self, name: &str) -> Option<&RelationshipDescription> {
        self.relationships.iter().find(|r| r.name == name)
    }

    pub fn primary_key_attribute(&self) -> Option<&AttributeDescription> {
        self.attribute(self.primary_key.as_deref()?)
    }

    /// The relationship this entity's identity is derived from.
    pub fn primary_key_relationship(&self) -> Option<&RelationshipDescription> {
        self.relationships.iter().find(|r| r.primary_key)
    }
}
