//! Strict document mapping check.
//!
//! The target index uses `dynamic: strict`, so any field a record emits
//! that the mapping does not declare would be rejected at write time. This
//! walks serialized records against the embedded mapping to catch that
//! before a record ever reaches the loader.

use crate::error::{GeneratorError, Result};
use crate::record::MediaRecord;
use serde_json::{Map, Value};

const MEDIA_MAPPING: &str = include_str!("../schema/media-mapping.json");

/// Leaf field types that accept a JSON object as their value.
const OBJECT_VALUED_LEAVES: &[&str] = &["geo_point", "flattened", "object"];

#[derive(Debug, Clone)]
pub struct SchemaChecker {
    properties: Map<String, Value>,
}

impl SchemaChecker {
    /// Parse the embedded mapping.
    pub fn new() -> Result<Self> {
        Self::from_mapping(MEDIA_MAPPING)
    }

    /// Parse an index definition (`{"mappings": {"properties": ...}}`) or a
    /// bare mapping (`{"properties": ...}`).
    pub fn from_mapping(mapping: &str) -> Result<Self> {
        let parsed: Value = serde_json::from_str(mapping)
            .map_err(|e| GeneratorError::config(format!("invalid document mapping: {e}")))?;
        let root = parsed.get("mappings").unwrap_or(&parsed);
        let properties = root
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .ok_or_else(|| GeneratorError::config("document mapping declares no properties"))?;
        Ok(Self { properties })
    }

    /// Every path in `document` the mapping does not declare.
    pub fn unknown_fields(&self, document: &Value) -> Vec<String> {
        let mut unknown = Vec::new();
        walk_value(&self.properties, document, "", &mut unknown);
        unknown
    }

    pub fn check(&self, record: &MediaRecord) -> Result<()> {
        let document = serde_json::to_value(record)
            .map_err(|e| GeneratorError::invariant(format!("{}: serialization failed: {e}", record.media.id)))?;
        let unknown = self.unknown_fields(&document);
        if unknown.is_empty() {
            Ok(())
        } else {
            Err(GeneratorError::invariant(format!(
                "{}: fields not declared in mapping: {}",
                record.media.id,
                unknown.join(", ")
            )))
        }
    }
}

/// Undeclared paths of `document` against the embedded mapping.
pub fn unknown_fields(document: &Value) -> Result<Vec<String>> {
    Ok(SchemaChecker::new()?.unknown_fields(document))
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

fn walk_value(properties: &Map<String, Value>, value: &Value, path: &str, unknown: &mut Vec<String>) {
    match value {
        Value::Object(fields) => walk_object(properties, fields, path, unknown),
        Value::Array(items) => {
            for item in items {
                walk_value(properties, item, path, unknown);
            }
        }
        _ => {}
    }
}

fn walk_object(properties: &Map<String, Value>, fields: &Map<String, Value>, path: &str, unknown: &mut Vec<String>) {
    for (key, value) in fields {
        let field_path = join(path, key);
        let Some(field) = properties.get(key) else {
            unknown.push(field_path);
            continue;
        };

        match field.get("properties").and_then(Value::as_object) {
            Some(children) => walk_value(children, value, &field_path, unknown),
            None => {
                let field_type = field.get("type").and_then(Value::as_str).unwrap_or("object");
                if contains_object(value) && !OBJECT_VALUED_LEAVES.contains(&field_type) {
                    unknown.push(field_path);
                }
            }
        }
    }
}

fn contains_object(value: &Value) -> bool {
    match value {
        Value::Object(_) => true,
        Value::Array(items) => items.iter().any(contains_object),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const MAPPING: &str = r#"{
        "mappings": {
            "dynamic": "strict",
            "properties": {
                "tenant_id": { "type": "keyword" },
                "location": { "properties": { "coordinates": { "type": "geo_point" } } },
                "detection": {
                    "properties": {
                        "objects": {
                            "type": "nested",
                            "properties": {
                                "class": { "type": "keyword" },
                                "attributes": { "properties": { "sex": { "type": "keyword" } } }
                            }
                        }
                    }
                }
            }
        }
    }"#;

    #[test]
    fn test_declared_document_passes() {
        let checker = SchemaChecker::from_mapping(MAPPING).unwrap();
        let doc = json!({
            "tenant_id": "tenant-001",
            "location": { "coordinates": [-99.6, 30.9] },
            "detection": { "objects": [{ "class": "deer", "attributes": { "sex": "buck" } }] }
        });
        assert!(checker.unknown_fields(&doc).is_empty());
    }

    #[test]
    fn test_undeclared_paths_are_reported() {
        let checker = SchemaChecker::from_mapping(MAPPING).unwrap();
        let doc = json!({
            "tenant_id": "tenant-001",
            "extra": 1,
            "detection": {
                "objects": [
                    { "class": "deer", "attributes": { "sex": "buck", "antler_points": 8 } },
                    { "class": "person", "attributes": { "gender": "male" } }
                ]
            }
        });
        let mut unknown = checker.unknown_fields(&doc);
        unknown.sort();
        assert_eq!(
            unknown,
            vec![
                "detection.objects.attributes.antler_points",
                "detection.objects.attributes.gender",
                "extra",
            ]
        );
    }

    #[test]
    fn test_object_under_leaf_is_reported() {
        let checker = SchemaChecker::from_mapping(MAPPING).unwrap();
        let doc = json!({ "tenant_id": { "id": "tenant-001" } });
        assert_eq!(checker.unknown_fields(&doc), vec!["tenant_id"]);
    }

    #[test]
    fn test_embedded_mapping_is_strict() {
        let raw: Value = serde_json::from_str(MEDIA_MAPPING).unwrap();
        assert_eq!(raw["mappings"]["dynamic"], "strict");
        let checker = SchemaChecker::new().unwrap();
        for block in ["@timestamp", "tenant_id", "media", "detection", "enrichment_processes", "system"] {
            assert!(checker.properties.contains_key(block), "{block} missing from mapping");
        }
    }

    #[test]
    fn test_invalid_mapping_is_configuration_error() {
        assert!(matches!(
            SchemaChecker::from_mapping("{\"mappings\": {}}"),
            Err(GeneratorError::Configuration(_))
        ));
        assert!(SchemaChecker::from_mapping("not json").is_err());
    }
}
