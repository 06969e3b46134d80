//! The static field registry: types, vocabularies, document-type routing,
//! and feature-group JSON Schema generation for the LLM extractor.

pub mod fields;
pub mod json_schema;
pub mod routing;
pub mod vocab;

pub use fields::{get_field, AllowedValues, FieldDefinition, FieldType, TemporalCategory};
pub use json_schema::{get_all_json_schemas, get_json_schema};
pub use routing::{get_extractable_fields, DocumentType, FEATURE_GROUPS};
