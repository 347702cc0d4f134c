//! Attribute descriptions.

use serde::{Deserialize, Serialize};

/// Declared semantic type of an attribute.
///
/// Type names the coercer does not know deserialize as [`AttributeType::Undefined`]
/// so a schema written for a richer model still loads; such attributes receive
/// their raw value unconverted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeType {
    String,
    Integer,
    Float,
    Boolean,
    Date,
    Binary,
    Transformable,
    #[serde(other)]
    Undefined,
}

impl AttributeType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Transformable => "transformable",
            Self::Undefined => "undefined",
        }
    }
}

impl std::fmt::Display for AttributeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeDescription {
    pub name: String,
    #[serde(rename = "type")]
    pub attribute_type: AttributeType,
    /// Candidate key paths into the raw dictionary, in priority order.
    #[serde(default)]
    pub key_paths: Vec<String>,
    /// Name of the date-format strategy used for date attributes.
    #[serde(default)]
    pub date_format: Option<String>,
    /// Name of the transform used for transformable attributes.
    #[serde(default)]
    pub transformer: Option<String>,
}

impl AttributeDescription {
    pub fn new(name: impl Into<String>, attribute_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attribute_type,
            key_paths: Vec::new(),
            date_format: None,
            transformer: None,
        }
    }

    pub fn with_key_paths<I, S>(mut self, key_paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.key_paths = key_paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_date_format(mut self, name: impl Into<String>) -> Self {
        self.date_format = Some(name.into());
        self
    }

    pub fn with_transformer(mut self, name: impl Into<String>) -> Self {
        self.transformer = Some(name.into());
        self
    }

    /// Key paths to try, in order. Falls back to the attribute name.
    pub fn candidate_key_paths(&self) -> Vec<&str> {
        if self.key_paths.is_empty() {
            vec![self.name.as_str()]
        } else {
            self.key_paths.iter().map(String::as_str).collect()
        }
    }
}
