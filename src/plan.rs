//! Schema-driven planning.
//!
//! Plans compare the prior state with the proposed configuration one
//! top-level attribute or block at a time. Set-typed attributes and set
//! blocks compare without regard to order. Computed values the
//! configuration leaves unset (`etag`, `id`, server-filled blocks) carry
//! over from the prior state so they do not show up as changes.

use serde_json::{Map, Value};

use crate::schema::{BlockNestingMode, Schema};
use crate::types::{AttributeChange, PlanResult};

/// Plan a create, update or delete of one resource.
///
/// - `prior == None`: create; every configured value is reported as added.
/// - `proposed == Null`: delete; every prior value is reported as removed.
/// - otherwise: update; `requires_replace` is set when a force-new attribute changed.
pub fn plan_resource(schema: &Schema, prior: Option<&Value>, proposed: &Value) -> PlanResult {
    match (prior, proposed) {
        (Some(prior), Value::Null) => plan_delete(prior),
        (None, proposed) => plan_create(schema, proposed),
        (Some(prior), proposed) => plan_update(schema, prior, proposed),
    }
}

/// Fill in schema defaults for attributes the configuration leaves unset.
pub fn with_defaults(schema: &Schema, value: Value) -> Value {
    let mut map = match value {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return other,
    };
    for (name, attr) in &schema.block.attributes {
        if let Some(default) = &attr.default {
            if map.get(name).map_or(true, Value::is_null) {
                map.insert(name.clone(), default.clone());
            }
        }
    }
    Value::Object(map)
}

fn plan_create(schema: &Schema, proposed: &Value) -> PlanResult {
    let planned = with_defaults(schema, proposed.clone());
    let changes = match &planned {
        Value::Object(map) => sorted(map)
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::added(k.as_str(), v.clone()))
            .collect(),
        _ => Vec::new(),
    };
    PlanResult::with_changes(planned, changes, false)
}

fn plan_delete(prior: &Value) -> PlanResult {
    let changes = match prior {
        Value::Object(map) => sorted(map)
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| AttributeChange::removed(k.as_str(), v.clone()))
            .collect(),
        _ => Vec::new(),
    };
    PlanResult::with_changes(Value::Null, changes, false)
}

fn plan_update(schema: &Schema, prior: &Value, proposed: &Value) -> PlanResult {
    let empty = Map::new();
    let prior_map = prior.as_object().unwrap_or(&empty);
    let mut planned = match with_defaults(schema, proposed.clone()) {
        Value::Object(map) => map,
        _ => Map::new(),
    };

    // computed values the config does not set keep their prior value
    let computed_attrs = schema
        .block
        .attributes
        .iter()
        .filter(|(_, attr)| attr.flags.computed)
        .map(|(name, _)| name);
    let computed_blocks = schema
        .block
        .blocks
        .iter()
        .filter(|(_, block)| block.computed)
        .map(|(name, _)| name);
    for name in computed_attrs.chain(computed_blocks) {
        if planned.get(name).map_or(true, Value::is_null) {
            if let Some(previous) = prior_map.get(name) {
                planned.insert(name.clone(), previous.clone());
            }
        }
    }

    let force_new = schema.force_new_paths();
    let mut changes = Vec::new();
    let mut requires_replace = false;
    for name in schema.block.names() {
        let before = prior_map.get(name).unwrap_or(&Value::Null);
        let after = planned.get(name).unwrap_or(&Value::Null);
        if values_equal(is_unordered(schema, name), before, after) {
            continue;
        }
        requires_replace |= force_new.contains(name);
        changes.push(match (before.is_null(), after.is_null()) {
            (true, _) => AttributeChange::added(name, after.clone()),
            (false, true) => AttributeChange::removed(name, before.clone()),
            (false, false) => AttributeChange::modified(name, before.clone(), after.clone()),
        });
    }

    PlanResult::with_changes(Value::Object(planned), changes, requires_replace)
}

fn is_unordered(schema: &Schema, name: &str) -> bool {
    if let Some(attr) = schema.block.attributes.get(name) {
        return attr.attr_type.is_set();
    }
    schema
        .block
        .blocks
        .get(name)
        .map(|block| block.nesting_mode == BlockNestingMode::Set)
        .unwrap_or(false)
}

/// Compare two attribute values; `unordered` compares arrays as multisets.
///
/// Values are compared after [`normalize`], so a zero value and an unset
/// value are equal.
pub fn values_equal(unordered: bool, a: &Value, b: &Value) -> bool {
    let a = normalize(a);
    let b = normalize(b);
    match (&a, &b) {
        (Value::Array(left), Value::Array(right)) if unordered => {
            if left.len() != right.len() {
                return false;
            }
            let mut left: Vec<String> = left.iter().map(Value::to_string).collect();
            let mut right: Vec<String> = right.iter().map(Value::to_string).collect();
            left.sort();
            right.sort();
            left == right
        }
        _ => a == b,
    }
}

/// Collapse zero values to `null` and drop them from objects, recursively.
///
/// `null`, `""`, `false`, `0`, `[]` and `{}` all mean "not set" to the
/// practitioner, matching how configuration omits them.
pub fn normalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let map: Map<String, Value> = map
                .iter()
                .map(|(k, v)| (k.clone(), normalize(v)))
                .filter(|(_, v)| !v.is_null())
                .collect();
            if map.is_empty() {
                Value::Null
            } else {
                Value::Object(map)
            }
        }
        Value::Array(items) if items.is_empty() => Value::Null,
        Value::Array(items) => Value::Array(items.iter().map(normalize).collect()),
        Value::String(s) if s.is_empty() => Value::Null,
        Value::Bool(false) => Value::Null,
        Value::Number(n) if n.as_f64() == Some(0.0) => Value::Null,
        other => other.clone(),
    }
}

fn sorted(map: &Map<String, Value>) -> impl Iterator<Item = (&String, &Value)> {
    let mut entries: Vec<_> = map.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    entries.into_iter()
}
