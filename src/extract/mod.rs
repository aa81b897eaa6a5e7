//! Field extraction from pasted forms and loosely-typed AI output.

pub mod extractor;
pub mod schema;

pub use extractor::{normalize_fields, Extraction, FieldError, FieldExtractor, Strategy};
pub use schema::{normalize, FieldSchema, ValueShape, SOLICITUD_FIELDS};
