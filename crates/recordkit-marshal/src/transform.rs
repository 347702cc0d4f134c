//! Named value transforms for transformable attributes.

use recordkit_schema::AttributeValue;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Converts a raw value into the stored form of a transformable attribute.
///
/// This is the reverse of whatever the producer of the raw data applied.
/// Returning `None` drops the value.
pub trait ValueTransformer: Send + Sync {
    fn reverse_transform(&self, raw: &Value) -> Option<AttributeValue>;
}

impl<F> ValueTransformer for F
where
    F: Fn(&Value) -> Option<AttributeValue> + Send + Sync,
{
    fn reverse_transform(&self, raw: &Value) -> Option<AttributeValue> {
        self(raw)
    }
}

/// Decodes a string holding embedded JSON (`"{\"a\":1}"`) into an opaque value.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonStringTransformer;

impl ValueTransformer for JsonStringTransformer {
    fn reverse_transform(&self, raw: &Value) -> Option<AttributeValue> {
        match raw {
            Value::String(text) => serde_json::from_str(text).ok().map(AttributeValue::Opaque),
            other => Some(AttributeValue::Opaque(other.clone())),
        }
    }
}

#[derive(Clone, Default)]
pub struct TransformRegistry {
    transformers: HashMap<String, Arc<dyn ValueTransformer>>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.transformers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("TransformRegistry")
            .field("transformers", &names)
            .finish()
    }
}

impl TransformRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in `json_string` transform.
    pub fn with_builtins() -> Self {
        Self::new().with_transformer("json_string", JsonStringTransformer)
    }

    pub fn with_transformer(
        mut self,
        name: impl Into<String>,
        transformer: impl ValueTransformer + 'static,
    ) -> Self {
        self.transformers.insert(name.into(), Arc::new(transformer));
        self
    }

    pub fn get(&self, name: &str) -> Option<&dyn ValueTransformer> {
        self.transformers.get(name).map(|t| t.as_ref())
    }

    /// Apply the transform registered under `name`.
    ///
    /// An unregistered name passes the raw value through unconverted.
    pub fn transform(&self, name: &str, raw: &Value) -> Option<AttributeValue> {
        match self.get(name) {
            Some(transformer) => transformer.reverse_transform(raw),
            None => {
                tracing::debug!(transformer = name, "no transform registered, passing value through");
                Some(AttributeValue::Opaque(raw.clone()))
            }
        }
    }
}
