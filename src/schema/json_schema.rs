//! JSON Schema generation for the Ollama structured-decoding `format` field.
//!
//! Grounded on `schema.py`'s `_json_type_for_field` / `_build_group_schema`
//! / `get_json_schema`, and the shape fixed by spec.md §6.

use serde_json::{json, Value};

use crate::error::SchemaError;
use crate::schema::fields::{get_field, AllowedValues, FieldType};
use crate::schema::routing::FEATURE_GROUPS;

fn json_type_for_field(name: &str) -> Result<Value, SchemaError> {
    let field = get_field(name)?;

    let mut base = match &field.allowed_values {
        Some(AllowedValues::Strings(values)) => {
            let mut sorted: Vec<&str> = values.to_vec();
            sorted.sort_unstable();
            let mut enum_values: Vec<Value> = sorted.into_iter().map(Value::from).collect();
            enum_values.push(Value::Null);
            json!({ "enum": enum_values })
        }
        Some(AllowedValues::Integers(values)) => {
            let mut sorted: Vec<i64> = values.to_vec();
            sorted.sort_unstable();
            let mut enum_values: Vec<Value> = sorted.into_iter().map(Value::from).collect();
            enum_values.push(Value::Null);
            json!({ "enum": enum_values })
        }
        None => match field.field_type {
            FieldType::Integer => json!({ "type": ["integer", "null"] }),
            FieldType::Float => json!({ "type": ["number", "null"] }),
            _ => json!({ "type": ["string", "null"] }),
        },
    };

    base["description"] = Value::from(field.display_name);
    Ok(base)
}

/// Build the JSON Schema `object` for a group of fields: a `values`
/// sub-object (one typed/nullable property per field, all required) and
/// a parallel `_source` sub-object for citation spans.
fn build_group_schema(field_names: &[&str]) -> Result<Value, SchemaError> {
    let mut value_properties = serde_json::Map::new();
    let mut source_properties = serde_json::Map::new();
    let mut required = Vec::new();

    for &name in field_names {
        value_properties.insert(name.to_string(), json_type_for_field(name)?);
        source_properties.insert(
            name.to_string(),
            json!({
                "type": ["string", "null"],
                "description": format!("Exact source text span for {name}"),
            }),
        );
        required.push(name.to_string());
    }

    Ok(json!({
        "type": "object",
        "properties": {
            "values": {
                "type": "object",
                "properties": Value::Object(value_properties),
                "required": required,
            },
            "_source": {
                "type": "object",
                "properties": Value::Object(source_properties),
                "description": "Exact text spans from the document justifying each value.",
            },
        },
        "required": ["values", "_source"],
    }))
}

/// The JSON Schema for a feature group's LLM `format` constraint.
pub fn get_json_schema(feature_group: &str) -> Result<Value, SchemaError> {
    let fields = FEATURE_GROUPS
        .get(feature_group)
        .ok_or_else(|| SchemaError::UnknownField(feature_group.to_string()))?;
    build_group_schema(fields)
}

pub fn get_all_json_schemas() -> Result<Vec<(&'static str, Value)>, SchemaError> {
    let mut out = Vec::new();
    for &group in FEATURE_GROUPS.keys() {
        out.push((group, get_json_schema(group)?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ihc_schema_has_values_and_source_objects() {
        let schema = get_json_schema("ihc").unwrap();
        assert_eq!(schema["type"], "object");
        assert!(schema["properties"]["values"]["properties"]["ihc_idh1"].is_object());
        assert!(schema["properties"]["_source"]["properties"]["ihc_idh1"].is_object());
    }

    #[test]
    fn enum_field_schema_lists_allowed_values_plus_null() {
        let schema = get_json_schema("ihc").unwrap();
        let enum_values = schema["properties"]["values"]["properties"]["ihc_idh1"]["enum"]
            .as_array()
            .unwrap();
        assert!(enum_values.contains(&Value::from("positif")));
        assert!(enum_values.contains(&Value::Null));
    }

    #[test]
    fn integer_field_schema_uses_typed_nullable() {
        let schema = get_json_schema("diagnosis").unwrap();
        let grade_type = &schema["properties"]["values"]["properties"]["grade"]["type"];
        assert_eq!(grade_type, &json!(["integer", "null"]));
    }

    #[test]
    fn all_values_fields_are_required() {
        let schema = get_json_schema("demographics").unwrap();
        let required = schema["properties"]["values"]["required"].as_array().unwrap();
        assert!(required.iter().any(|v| v == "nip"));
    }

    #[test]
    fn unknown_feature_group_is_an_error() {
        assert!(get_json_schema("not_a_group").is_err());
    }

    #[test]
    fn get_all_json_schemas_covers_every_group() {
        let schemas = get_all_json_schemas().unwrap();
        assert_eq!(schemas.len(), 8);
    }
}
