//! Date-format strategies.
//!
//! A date attribute is parsed by the strategy its description names
//! (`date_format`), or by the registry's default strategy. Several formats can
//! therefore coexist in one document.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use recordkit_schema::{AttributeDescription, Schema};
use std::collections::HashMap;
use std::sync::Arc;

/// Parses a date string. Returns `None` for text it does not understand.
pub trait DateFormatStrategy: Send + Sync {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>>;
}

impl<F> DateFormatStrategy for F
where
    F: Fn(&str) -> Option<DateTime<Utc>> + Send + Sync,
{
    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        self(text)
    }
}

/// RFC 3339 / ISO 8601 timestamps with an offset (`2013-07-04T10:00:00Z`).
#[derive(Debug, Clone, Copy, Default)]
pub struct Rfc3339DateFormat;

impl DateFormatStrategy for Rfc3339DateFormat {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(text.trim())
            .ok()
            .map(|d| d.with_timezone(&Utc))
    }
}

/// A fixed pattern in chrono's strftime syntax.
///
/// Text without an offset is read as UTC; a pattern without time fields yields
/// midnight UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDateFormat {
    pattern: String,
}

impl PatternDateFormat {
    pub fn strftime(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
        }
    }

    /// Build from a Unicode date pattern such as `yyyy-MM-dd'T'HH:mm:ssZ`.
    pub fn unicode(pattern: &str) -> Self {
        Self::strftime(unicode_to_strftime(pattern))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl DateFormatStrategy for PatternDateFormat {
    fn parse(&self, text: &str) -> Option<DateTime<Utc>> {
        let text = text.trim();
        if let Ok(d) = DateTime::<FixedOffset>::parse_from_str(text, &self.pattern) {
            return Some(d.with_timezone(&Utc));
        }
        if let Ok(d) = NaiveDateTime::parse_from_str(text, &self.pattern) {
            return Some(Utc.from_utc_datetime(&d));
        }
        let day = NaiveDate::parse_from_str(text, &self.pattern).ok()?;
        Some(Utc.from_utc_datetime(&day.and_hms_opt(0, 0, 0)?))
    }
}

/// Translate a Unicode (LDML) date pattern into chrono's strftime syntax.
///
/// Supports the common fields (`y M d E H h m s S a Z X x`) and quoted literals.
/// Unsupported pattern letters are copied through literally.
pub fn unicode_to_strftime(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            // '' is an escaped quote; otherwise copy until the closing quote.
            if chars.get(i + 1) == Some(&'\'') {
                out.push('\'');
                i += 2;
                continue;
            }
            i += 1;
            while i < chars.len() {
                if chars[i] == '\'' {
                    if chars.get(i + 1) == Some(&'\'') {
                        out.push('\'');
                        i += 2;
                        continue;
                    }
                    break;
                }
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        if !c.is_ascii_alphabetic() {
            push_literal(&mut out, c);
            i += 1;
            continue;
        }

        let mut run = 1;
        while chars.get(i + run) == Some(&c) {
            run += 1;
        }
        i += run;

        let field = match (c, run) {
            ('y', 2) => "%y",
            ('y', _) => "%Y",
            ('M', 1 | 2) => "%m",
            ('M', 3) => "%b",
            ('M', _) => "%B",
            ('d', _) => "%d",
            ('E', 1..=3) => "%a",
            ('E', _) => "%A",
            ('H', _) => "%H",
            ('h', _) => "%I",
            ('m', _) => "%M",
            ('s', _) => "%S",
            ('S', 1..=3) => "%3f",
            ('S', 4..=6) => "%6f",
            ('S', _) => "%9f",
            ('a', _) => "%p",
            ('Z', 5) | ('X' | 'x', 3 | 5) => "%:z",
            ('Z' | 'X' | 'x', _) => "%z",
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
                continue;
            }
        };
        out.push_str(field);
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Date-format strategies by name, plus a default.
#[derive(Clone)]
pub struct DateFormats {
    default: Arc<dyn DateFormatStrategy>,
    named: HashMap<String, Arc<dyn DateFormatStrategy>>,
}

impl Default for DateFormats {
    fn default() -> Self {
        Self::new(Rfc3339DateFormat)
    }
}

impl std::fmt::Debug for DateFormats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.named.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("DateFormats").field("named", &names).finish()
    }
}

impl DateFormats {
    pub fn new(default: impl DateFormatStrategy + 'static) -> Self {
        Self {
            default: Arc::new(default),
            named: HashMap::new(),
        }
    }

    pub fn with_format(
        mut self,
        name: impl Into<String>,
        strategy: impl DateFormatStrategy + 'static,
    ) -> Self {
        self.named.insert(name.into(), Arc::new(strategy));
        self
    }

    pub fn default_format(&self) -> &dyn DateFormatStrategy {
        self.default.as_ref()
    }

    pub fn get(&self, name: &str) -> Option<&dyn DateFormatStrategy> {
        self.named.get(name).map(|s| s.as_ref())
    }

    /// The strategy for an attribute: its named format, else the default.
    ///
    /// Unknown names fall back silently; see [`DateFormats::missing_formats`].
    pub fn for_attribute(&self, attribute: &AttributeDescription) -> &dyn DateFormatStrategy {
        attribute
            .date_format
            .as_deref()
            .and_then(|name| self.get(name))
            .unwrap_or_else(|| self.default_format())
    }

    /// `(entity, attribute, format)` for every date format `schema` names
    /// that is not registered.
    pub fn missing_formats<'s>(&self, schema: &'s Schema) -> Vec<(&'s str, &'s str, &'s str)> {
        schema
            .entities()
            .flat_map(|entity| {
                entity.attributes.iter().filter_map(move |attribute| {
                    let name = attribute.date_format.as_deref()?;
                    (!self.named.contains_key(name))
                        .then_some((entity.name.as_str(), attribute.name.as_str(), name))
                })
            })
            .collect()
    }
}
