//! Marshaling configuration.

use crate::date::{DateFormats, PatternDateFormat, Rfc3339DateFormat};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a [`Marshaler`](crate::Marshaler) and the resolver that
/// schedules it.
///
/// ```json
/// {
///   "date_format": "yyyy-MM-dd'T'HH:mm:ssZ",
///   "date_formats": { "day": "yyyy-MM-dd" },
///   "parallel": true
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarshalConfig {
    /// Unicode pattern for the default date format. RFC 3339 when unset.
    pub date_format: Option<String>,
    /// Additional date formats (Unicode patterns) that attributes select by name.
    pub date_formats: BTreeMap<String, String>,
    /// Populate independent proto records in parallel.
    pub parallel: bool,
}

impl Default for MarshalConfig {
    fn default() -> Self {
        Self {
            date_format: None,
            date_formats: BTreeMap::new(),
            parallel: true,
        }
    }
}

impl MarshalConfig {
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn date_formats(&self) -> DateFormats {
        let formats = match &self.date_format {
            Some(pattern) => DateFormats::new(PatternDateFormat::unicode(pattern)),
            None => DateFormats::new(Rfc3339DateFormat),
        };
        self.date_formats
            .iter()
            .fold(formats, |formats, (name, pattern)| {
                formats.with_format(name.clone(), PatternDateFormat::unicode(pattern))
            })
    }
}
