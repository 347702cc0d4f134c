//! Relationship descriptions.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    ToOne,
    ToMany,
}

/// What happens to the previously related record when a to-one link is replaced.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteRule {
    /// Detach the previous record, keep it in the store.
    #[default]
    Nullify,
    /// Ask the record store to delete the previous record.
    Cascade,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDescription {
    pub name: String,
    /// Name of the destination entity.
    pub destination: String,
    pub cardinality: Cardinality,
    #[serde(default)]
    pub delete_rule: DeleteRule,
    /// Name of the paired relationship on the destination entity.
    #[serde(default)]
    pub inverse: Option<String>,
    /// The source record's identity is derived from the destination record.
    #[serde(default)]
    pub primary_key: bool,
    /// Candidate key paths for the related raw data, in priority order.
    #[serde(default)]
    pub key_paths: Vec<String>,
}

impl RelationshipDescription {
    pub fn new(
        name: impl Into<String>,
        destination: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            destination: destination.into(),
            cardinality,
            delete_rule: DeleteRule::default(),
            inverse: None,
            primary_key: false,
            key_paths: Vec::new(),
        }
    }

    pub fn to_one(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(name, destination, Cardinality::ToOne)
    }

    pub fn to_many(name: impl Into<String>, destination: impl Into<String>) -> Self {
        Self::new(name, destination, Cardinality::ToMany)
    }

    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    pub fn with_delete_rule(mut self, rule: DeleteRule) -> Self {
        self.delete_rule = rule;
        self
    }

    pub fn with_key_paths<I, S>(mut self, key_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_paths = key_paths.into_iter().map(Into::into).collect();
        self
    }

    /// Flag this relationship as the source entity's primary-key relationship.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    pub fn candidate_key_paths(&self) -> Vec<&str> {
        if self.key_paths.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.key_paths.iter().map(String::as_str).collect()
        }
    }
}
