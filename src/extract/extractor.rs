//! Label-based field extraction from free-form text.
//!
//! Two strategies share one schema:
//! - **Positional**: find every known label in the text and take the slice
//!   between one label and the next. Works when the whole form arrives on a
//!   single line.
//! - **Pattern**: match `Label: value` per line. Values end at the line break,
//!   so trailing notes after the form are not swallowed into the last field.

use std::collections::BTreeMap;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use super::schema::{normalize, FieldSchema};

/// Which extraction strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Positional,
    Pattern,
}

/// Why a field could not be extracted.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FieldError {
    #[error("{label} is missing")]
    Missing { key: &'static str, label: &'static str },

    #[error("{label} is invalid: {reason}")]
    Invalid {
        key: &'static str,
        label: &'static str,
        reason: String,
    },
}

impl FieldError {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Missing { label, .. } | Self::Invalid { label, .. } => label,
        }
    }
}

/// Outcome of running an extractor over a text.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    /// Normalized values by field key.
    pub values: BTreeMap<&'static str, String>,
    pub errors: Vec<FieldError>,
}

impl Extraction {
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Labels of required fields that were not found.
    pub fn missing_labels(&self) -> Vec<&'static str> {
        self.errors
            .iter()
            .filter_map(|e| match e {
                FieldError::Missing { label, .. } => Some(*label),
                FieldError::Invalid { .. } => None,
            })
            .collect()
    }

    /// Use `value` for `key` when the text did not provide it.
    pub fn fill_default(&mut self, key: &'static str, value: &str) {
        let value = value.trim();
        if self.values.contains_key(key) || value.is_empty() {
            return;
        }
        self.values.insert(key, value.to_string());
        self.errors
            .retain(|e| !matches!(e, FieldError::Missing { key: k, .. } if *k == key));
    }

    pub fn into_json(self) -> Map<String, Value> {
        self.values
            .into_iter()
            .map(|(k, v)| (k.to_string(), Value::String(v)))
            .collect()
    }
}

struct CompiledField {
    schema: FieldSchema,
    /// `Label:` anywhere in the text.
    label: Regex,
    /// `Label: value` up to the end of the line.
    line: Regex,
}

/// Extracts the fields of a schema from pasted form text.
pub struct FieldExtractor {
    fields: Vec<CompiledField>,
}

impl FieldExtractor {
    pub fn new(schema: &[FieldSchema]) -> Result<Self, regex::Error> {
        let fields = schema
            .iter()
            .map(|field| {
                let alternatives = field
                    .labels
                    .iter()
                    .map(|l| label_pattern(l))
                    .collect::<Vec<_>>()
                    .join("|");
                Ok(CompiledField {
                    schema: *field,
                    label: Regex::new(&format!(r"(?i)\b(?:{alternatives})\s*:"))?,
                    line: Regex::new(&format!(r"(?im)\b(?:{alternatives})\s*:[ \t]*(.*)$"))?,
                })
            })
            .collect::<Result<Vec<_>, regex::Error>>()?;
        Ok(Self { fields })
    }

    /// Extract with the strategy that fits the text's layout.
    pub fn extract(&self, text: &str) -> Extraction {
        let strategy = if text.trim().contains('\n') {
            Strategy::Pattern
        } else {
            Strategy::Positional
        };
        self.extract_with(text, strategy)
    }

    pub fn extract_with(&self, text: &str, strategy: Strategy) -> Extraction {
        let raw = match strategy {
            Strategy::Positional => self.positional(text),
            Strategy::Pattern => self.pattern(text),
        };

        let mut extraction = Extraction::default();
        for field in &self.fields {
            let schema = field.schema;
            let value = raw.get(schema.key).map(|v| v.trim()).filter(|v| !v.is_empty());
            match value {
                Some(value) => match normalize(schema.shape, value) {
                    Ok(normalized) => {
                        extraction.values.insert(schema.key, normalized);
                    }
                    Err(reason) => extraction.errors.push(FieldError::Invalid {
                        key: schema.key,
                        label: schema.label(),
                        reason,
                    }),
                },
                None if schema.required => extraction.errors.push(FieldError::Missing {
                    key: schema.key,
                    label: schema.label(),
                }),
                None => {}
            }
        }
        debug!(
            ?strategy,
            found = extraction.values.len(),
            errors = extraction.errors.len(),
            "Extracted form fields"
        );
        extraction
    }

    fn positional<'t>(&self, text: &'t str) -> BTreeMap<&'static str, &'t str> {
        struct Hit {
            start: usize,
            end: usize,
            key: &'static str,
        }

        let mut hits: Vec<Hit> = self
            .fields
            .iter()
            .flat_map(|field| {
                field.label.find_iter(text).map(|m| Hit {
                    start: m.start(),
                    end: m.end(),
                    key: field.schema.key,
                })
            })
            .collect();
        // Longest match first at equal starts, then drop hits nested inside
        // another label ("Perfil:" inside "Tipo de Perfil:").
        hits.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
        let mut kept: Vec<Hit> = Vec::with_capacity(hits.len());
        for hit in hits {
            if kept.last().is_none_or(|last| hit.start >= last.end) {
                kept.push(hit);
            }
        }

        let mut values = BTreeMap::new();
        for (i, hit) in kept.iter().enumerate() {
            let until = kept.get(i + 1).map_or(text.len(), |next| next.start);
            let value = text[hit.end..until].trim();
            if !value.is_empty() {
                values.entry(hit.key).or_insert(value);
            }
        }
        values
    }

    fn pattern<'t>(&self, text: &'t str) -> BTreeMap<&'static str, &'t str> {
        let mut values = BTreeMap::new();
        for field in &self.fields {
            let found = field
                .line
                .captures_iter(text)
                .filter_map(|c| c.get(1))
                .map(|m| m.as_str().trim())
                .find(|v| !v.is_empty());
            if let Some(value) = found {
                values.insert(field.schema.key, value);
            }
        }
        values
    }
}

/// Regex for a label, tolerant of repeated whitespace between words.
fn label_pattern(label: &str) -> String {
    label
        .split_whitespace()
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(r"\s+")
}

/// Normalize loosely-typed fields (e.g. from an AI reply) against `schema`.
///
/// Known keys are trimmed and normalized to their shape; a value that does not
/// fit its shape is kept as written. Nulls, empty strings and the literal
/// `"null"` are dropped. Unknown keys are dropped.
pub fn normalize_fields(schema: &[FieldSchema], fields: &Map<String, Value>) -> Map<String, Value> {
    let mut out = Map::new();
    for field in schema {
        let raw = match fields.get(field.key) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str())
                .collect::<Vec<_>>()
                .join(", "),
            _ => continue,
        };
        if raw.is_empty() || raw.eq_ignore_ascii_case("null") {
            continue;
        }
        let value = normalize(field.shape, &raw).unwrap_or(raw);
        out.insert(field.key.to_string(), Value::String(value));
    }
    out
}
