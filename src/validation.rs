//! Configuration validation against a [`Schema`].
//!
//! ```
//! use gocd_provider::schema::{Attribute, Schema};
//! use gocd_provider::validation::validate;
//! use serde_json::json;
//!
//! let schema = Schema::v0()
//!     .with_attribute("profile_id", Attribute::required_string())
//!     .with_attribute("retry", Attribute::optional_int64());
//!
//! assert!(validate(&schema, &json!({"profile_id": "k8s"})).is_empty());
//!
//! let diagnostics = validate(&schema, &json!({"profile_id": "k8s", "retry": "ten"}));
//! assert_eq!(diagnostics.len(), 1);
//! assert_eq!(diagnostics[0].attribute, Some("retry".to_string()));
//! ```

use crate::schema::{
    Attribute, AttributeType, Block, BlockNestingMode, Diagnostic, NestedBlock, Schema,
};
use serde_json::Value;

/// Validate a configuration value against a schema.
///
/// - required attributes must be present and non-null
/// - computed-only attributes and computed blocks are skipped
/// - attribute types must match
/// - nested blocks are validated recursively, including min/max item counts
pub fn validate(schema: &Schema, value: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    validate_block(&schema.block, value, "", &mut diagnostics);
    diagnostics
}

/// Like [`validate`], returning `Err` with the diagnostics when any were produced.
pub fn validate_result(schema: &Schema, value: &Value) -> Result<(), Vec<Diagnostic>> {
    let diagnostics = validate(schema, value);
    if diagnostics.is_empty() {
        Ok(())
    } else {
        Err(diagnostics)
    }
}

/// Whether the value passes validation.
pub fn is_valid(schema: &Schema, value: &Value) -> bool {
    validate(schema, value).is_empty()
}

fn validate_block(block: &Block, value: &Value, path: &str, diagnostics: &mut Vec<Diagnostic>) {
    let obj = match value {
        Value::Object(map) => map,
        Value::Null => return,
        other => {
            let mut diag =
                Diagnostic::error("Expected object").with_detail(format!("Got {}", type_name(other)));
            if !path.is_empty() {
                diag = diag.with_attribute(path);
            }
            diagnostics.push(diag);
            return;
        },
    };

    for (name, attr) in &block.attributes {
        validate_attribute(attr, obj.get(name), &join_path(path, name), diagnostics);
    }

    for (name, nested) in &block.blocks {
        if nested.computed {
            continue;
        }
        validate_nested_block(nested, obj.get(name), &join_path(path, name), diagnostics);
    }
}

fn validate_attribute(
    attr: &Attribute,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if attr.flags.is_computed_only() {
        return;
    }

    match value {
        None | Some(Value::Null) => {
            if attr.flags.required {
                diagnostics.push(
                    Diagnostic::error(format!("Missing required attribute '{}'", path))
                        .with_detail("This attribute is required and must be provided")
                        .with_attribute(path),
                );
            }
        },
        Some(v) => validate_type(&attr.attr_type, v, path, diagnostics),
    }
}

fn validate_type(
    attr_type: &AttributeType,
    value: &Value,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let matches = match attr_type {
        AttributeType::String => value.is_string(),
        AttributeType::Int64 => is_int64(value),
        AttributeType::Float64 => value.is_number(),
        AttributeType::Bool => value.is_boolean(),
        AttributeType::List(element) | AttributeType::Set(element) => match value.as_array() {
            Some(items) => {
                for (i, item) in items.iter().enumerate() {
                    validate_type(element, item, &format!("{}.{}", path, i), diagnostics);
                }
                true
            },
            None => false,
        },
        AttributeType::Map(element) => match value.as_object() {
            Some(entries) => {
                for (key, item) in entries {
                    validate_type(element, item, &format!("{}.{}", path, key), diagnostics);
                }
                true
            },
            None => false,
        },
        AttributeType::Object(fields) => match value.as_object() {
            Some(entries) => {
                // object fields carry no required/optional flags, only types
                for (name, field_type) in fields {
                    if let Some(item) = entries.get(name) {
                        validate_type(field_type, item, &join_path(path, name), diagnostics);
                    }
                }
                true
            },
            None => false,
        },
        AttributeType::Dynamic => true,
    };

    if !matches {
        diagnostics.push(
            Diagnostic::error(format!("Invalid type for attribute '{}'", path))
                .with_detail(format!("Expected {}, got {}", expected_name(attr_type), type_name(value)))
                .with_attribute(path),
        );
    }
}

fn validate_nested_block(
    nested: &NestedBlock,
    value: Option<&Value>,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let value = match value {
        None | Some(Value::Null) => {
            if nested.min_items > 0 {
                let summary = match nested.nesting_mode {
                    BlockNestingMode::Single => format!("Missing required block '{}'", path),
                    _ => format!("Block '{}' requires at least {} item(s)", path, nested.min_items),
                };
                diagnostics.push(Diagnostic::error(summary).with_attribute(path));
            }
            return;
        },
        Some(v) => v,
    };

    match (nested.nesting_mode, value) {
        (BlockNestingMode::Single, v) => {
            validate_block(&nested.block, v, path, diagnostics);
        },
        (BlockNestingMode::List | BlockNestingMode::Set, Value::Array(items)) => {
            check_item_count(nested, items.len(), path, diagnostics);
            for (i, item) in items.iter().enumerate() {
                validate_block(&nested.block, item, &format!("{}.{}", path, i), diagnostics);
            }
        },
        (BlockNestingMode::Map, Value::Object(entries)) => {
            check_item_count(nested, entries.len(), path, diagnostics);
            for (key, item) in entries {
                validate_block(&nested.block, item, &format!("{}.{}", path, key), diagnostics);
            }
        },
        (mode, v) => {
            let expected = if mode == BlockNestingMode::Map {
                "map"
            } else {
                "list"
            };
            diagnostics.push(
                Diagnostic::error(format!("Expected {} for block '{}'", expected, path))
                    .with_detail(format!("Got {}", type_name(v)))
                    .with_attribute(path),
            );
        },
    }
}

fn check_item_count(
    nested: &NestedBlock,
    len: usize,
    path: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let len = len as u32;
    if len < nested.min_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' requires at least {} item(s), got {}",
                path, nested.min_items, len
            ))
            .with_attribute(path),
        );
    }
    if nested.max_items > 0 && len > nested.max_items {
        diagnostics.push(
            Diagnostic::error(format!(
                "Block '{}' allows at most {} item(s), got {}",
                path, nested.max_items, len
            ))
            .with_attribute(path),
        );
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.is_empty() {
        name.to_string()
    } else {
        format!("{}.{}", base, name)
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn expected_name(attr_type: &AttributeType) -> &'static str {
    match attr_type {
        AttributeType::String => "string",
        AttributeType::Int64 => "int64",
        AttributeType::Float64 => "float64",
        AttributeType::Bool => "bool",
        AttributeType::List(_) => "list",
        AttributeType::Set(_) => "set",
        AttributeType::Map(_) => "map",
        AttributeType::Object(_) => "object",
        AttributeType::Dynamic => "any",
    }
}

fn is_int64(value: &Value) -> bool {
    match value {
        Value::Number(n) if n.is_i64() || n.is_u64() => true,
        Value::Number(n) => n
            .as_f64()
            .map(|f| f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64)
            .unwrap_or(false),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeFlags, Block, NestedBlock};
    use serde_json::json;
    use std::collections::HashMap;

    fn properties() -> NestedBlock {
        NestedBlock::set(
            Block::new()
                .with_attribute("key", Attribute::required_string())
                .with_attribute("value", Attribute::optional_string()),
        )
    }

    #[test]
    fn test_required_string() {
        let schema = Schema::v0().with_attribute("profile_id", Attribute::required_string());

        assert!(validate(&schema, &json!({"profile_id": "k8s"})).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("profile_id".to_string()));

        assert_eq!(validate(&schema, &json!({"profile_id": null})).len(), 1);

        let diagnostics = validate(&schema, &json!({"profile_id": 7}));
        assert!(diagnostics[0].summary.contains("Invalid type"));
        assert_eq!(diagnostics[0].detail.as_deref(), Some("Expected string, got number"));
    }

    #[test]
    fn test_optional_and_computed() {
        let schema = Schema::v0()
            .with_attribute("retry", Attribute::optional_int64())
            .with_attribute("backup_id", Attribute::computed_string());

        assert!(validate(&schema, &json!({})).is_empty());
        assert!(validate(&schema, &json!({"retry": null})).is_empty());
        // computed-only attributes are never validated
        assert!(validate(&schema, &json!({"backup_id": 1})).is_empty());
        assert_eq!(validate(&schema, &json!({"retry": "30"})).len(), 1);
    }

    #[test]
    fn test_int64() {
        let schema = Schema::v0().with_attribute("delay", Attribute::optional_int64());
        assert!(validate(&schema, &json!({"delay": 5})).is_empty());
        assert!(validate(&schema, &json!({"delay": 5.0})).is_empty());
        assert_eq!(validate(&schema, &json!({"delay": 5.5})).len(), 1);
    }

    #[test]
    fn test_list_of_string_maps() {
        let schema = Schema::v0().with_attribute(
            "rules",
            Attribute::new(AttributeType::list_of_string_maps(), AttributeFlags::optional()),
        );

        let rules = json!({"rules": [{"directive": "allow", "action": "refer", "type": "*", "resource": "*"}]});
        assert!(validate(&schema, &rules).is_empty());

        let diagnostics = validate(&schema, &json!({"rules": [{"directive": true}]}));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute, Some("rules.0.directive".to_string()));

        assert_eq!(validate(&schema, &json!({"rules": "allow"})).len(), 1);
    }

    #[test]
    fn test_string_list() {
        let schema = Schema::v0()
            .with_attribute("pipelines", Attribute::string_list(AttributeFlags::optional()));
        assert!(validate(&schema, &json!({"pipelines": ["build", "deploy"]})).is_empty());

        let diagnostics = validate(&schema, &json!({"pipelines": ["build", 1]}));
        assert_eq!(diagnostics[0].attribute, Some("pipelines.1".to_string()));
    }

    #[test]
    fn test_set_block() {
        let schema = Schema::v0().with_block("properties", properties().with_min_items(1));

        assert!(validate(&schema, &json!({"properties": [{"key": "Image", "value": "alpine"}]})).is_empty());

        let diagnostics = validate(&schema, &json!({"properties": []}));
        assert!(diagnostics[0].summary.contains("at least 1"));

        let diagnostics = validate(&schema, &json!({"properties": [{"value": "alpine"}]}));
        assert_eq!(diagnostics[0].attribute, Some("properties.0.key".to_string()));

        let diagnostics = validate(&schema, &json!({"properties": {"key": "Image"}}));
        assert!(diagnostics[0].summary.contains("Expected list"));
    }

    #[test]
    fn test_single_block_nested() {
        let schema = Schema::v0().with_block(
            "material",
            NestedBlock::single(
                Block::new()
                    .with_attribute("type", Attribute::required_string())
                    .with_block(
                        "attributes",
                        NestedBlock::single(
                            Block::new().with_attribute("auto_update", Attribute::optional_bool()),
                        ),
                    ),
            )
            .with_min_items(1),
        );

        let valid = json!({"material": {"type": "git", "attributes": {"auto_update": true}}});
        assert!(validate(&schema, &valid).is_empty());

        let diagnostics = validate(&schema, &json!({}));
        assert!(diagnostics[0].summary.contains("Missing required block 'material'"));

        let diagnostics =
            validate(&schema, &json!({"material": {"type": "git", "attributes": {"auto_update": "yes"}}}));
        assert_eq!(
            diagnostics[0].attribute,
            Some("material.attributes.auto_update".to_string())
        );
    }

    #[test]
    fn test_max_items() {
        let schema = Schema::v0().with_block("retries", NestedBlock::list(Block::new()).with_max_items(1));
        let diagnostics = validate(&schema, &json!({"retries": [{}, {}]}));
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("at most 1"));
    }

    #[test]
    fn test_map_block() {
        let schema = Schema::v0().with_block(
            "stores",
            NestedBlock::map(Block::new().with_attribute("plugin_id", Attribute::required_string())),
        );
        assert!(validate(&schema, &json!({"stores": {"docker": {"plugin_id": "cd.go.docker"}}})).is_empty());
        let diagnostics = validate(&schema, &json!({"stores": {"docker": {"plugin_id": 1}}}));
        assert_eq!(
            diagnostics[0].attribute,
            Some("stores.docker.plugin_id".to_string())
        );
    }

    #[test]
    fn test_computed_block_skipped() {
        let schema = Schema::v0().with_block("properties", properties().with_min_items(1).computed());
        assert!(validate(&schema, &json!({})).is_empty());
    }

    #[test]
    fn test_object_type() {
        let mut fields = HashMap::new();
        fields.insert("count".to_string(), AttributeType::Int64);
        fields.insert("wait_time".to_string(), AttributeType::Int64);
        let schema = Schema::v0().with_attribute(
            "retries",
            Attribute::new(AttributeType::Object(fields), AttributeFlags::optional()),
        );
        assert!(validate(&schema, &json!({"retries": {"count": 3, "wait_time": 1}})).is_empty());
        let diagnostics = validate(&schema, &json!({"retries": {"count": "3"}}));
        assert_eq!(diagnostics[0].attribute, Some("retries.count".to_string()));
    }

    #[test]
    fn test_helpers_and_root() {
        let schema = Schema::v0().with_attribute("name", Attribute::required_string());
        assert!(is_valid(&schema, &json!({"name": "dev"})));
        assert!(!is_valid(&schema, &json!({})));
        assert_eq!(validate_result(&schema, &json!({})).unwrap_err().len(), 1);

        let diagnostics = validate(&schema, &json!("dev"));
        assert!(diagnostics[0].summary.contains("Expected object"));
    }
}
