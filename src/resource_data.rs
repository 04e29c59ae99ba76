//! The attribute map resource callbacks read configuration from and write state into.
//!
//! Getters return the zero value of the requested type when an attribute is
//! absent or null, so callbacks can read optional attributes without
//! unwrapping. Change tracking compares against the prior state, which is
//! only present while updating.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::ProviderError;

static NULL: Value = Value::Null;

/// Configuration and state of one resource or data source instance.
#[derive(Debug, Clone, Default)]
pub struct ResourceData {
    id: String,
    state: Map<String, Value>,
    prior: Option<Map<String, Value>>,
    new_resource: bool,
}

impl ResourceData {
    /// Data for a resource about to be created from its planned state.
    pub fn new_resource(planned: Value) -> Result<Self, ProviderError> {
        let mut data = Self::from_state(planned)?;
        data.new_resource = true;
        Ok(data)
    }

    /// Data for an existing resource (read, delete) or a data source config.
    pub fn from_state(state: Value) -> Result<Self, ProviderError> {
        let state = into_object(state)?;
        let id = state
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            id,
            state,
            prior: None,
            new_resource: false,
        })
    }

    /// Data for a data source read from its configuration.
    pub fn from_config(config: Value) -> Result<Self, ProviderError> {
        Self::from_state(config)
    }

    /// Data for an update: `planned` is what the callback sees, `prior` what it diffs against.
    pub fn for_update(prior: Value, planned: Value) -> Result<Self, ProviderError> {
        let prior = into_object(prior)?;
        let mut data = Self::from_state(planned)?;
        if data.id.is_empty() {
            if let Some(id) = prior.get("id").and_then(Value::as_str) {
                data.id = id.to_string();
            }
        }
        data.prior = Some(prior);
        Ok(data)
    }

    /// Data for an import: only the ID is known.
    pub fn for_import(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// The resource ID, empty when unset.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Set the resource ID. An empty ID marks the resource as gone.
    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    /// Whether the data was built for a create.
    pub fn is_new_resource(&self) -> bool {
        self.new_resource
    }

    /// The raw value of an attribute, `Null` when absent.
    pub fn get(&self, key: &str) -> &Value {
        self.state.get(key).unwrap_or(&NULL)
    }

    /// The value of an attribute when it is set to something non-null.
    pub fn get_ok(&self, key: &str) -> Option<&Value> {
        self.state.get(key).filter(|v| !is_empty(v))
    }

    /// A string attribute, empty when unset.
    pub fn get_string(&self, key: &str) -> String {
        self.get(key).as_str().unwrap_or_default().to_string()
    }

    /// A bool attribute, false when unset.
    pub fn get_bool(&self, key: &str) -> bool {
        self.get(key).as_bool().unwrap_or(false)
    }

    /// An integer attribute, 0 when unset.
    pub fn get_i64(&self, key: &str) -> i64 {
        let value = self.get(key);
        value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f as i64))
            .unwrap_or(0)
    }

    /// A float attribute, 0.0 when unset.
    pub fn get_f64(&self, key: &str) -> f64 {
        self.get(key).as_f64().unwrap_or(0.0)
    }

    /// A list or set attribute (or block), empty when unset.
    pub fn get_list(&self, key: &str) -> Vec<Value> {
        match self.get(key) {
            Value::Array(items) => items.clone(),
            _ => Vec::new(),
        }
    }

    /// A list of strings; non-string elements are skipped.
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        crate::utils::string_list(self.get(key))
    }

    /// An object attribute (map or single block), `None` when unset.
    pub fn get_object(&self, key: &str) -> Option<&Map<String, Value>> {
        self.get(key).as_object()
    }

    /// The elements of a list or set block that are objects.
    pub fn get_blocks(&self, key: &str) -> Vec<&Map<String, Value>> {
        match self.get(key) {
            Value::Array(items) => items.iter().filter_map(Value::as_object).collect(),
            Value::Object(map) => vec![map],
            _ => Vec::new(),
        }
    }

    /// A single nested block, accepting either an object or a one-element list.
    pub fn get_block(&self, key: &str) -> Option<&Map<String, Value>> {
        block_of(self.get(key))
    }

    /// Set an attribute from any serializable value.
    pub fn set<T: Serialize>(&mut self, key: &str, value: T) -> Result<(), ProviderError> {
        let value = serde_json::to_value(value)
            .map_err(|err| ProviderError::Sdk(format!("setting '{}' errored with: {}", key, err)))?;
        self.state.insert(key.to_string(), value);
        Ok(())
    }

    /// Whether the attribute differs from the prior state. Always false outside updates.
    pub fn has_change(&self, key: &str) -> bool {
        match &self.prior {
            Some(prior) => !same_value(prior.get(key).unwrap_or(&NULL), self.get(key)),
            None => false,
        }
    }

    /// Whether any of the attributes changed.
    pub fn has_changes(&self, keys: &[&str]) -> bool {
        keys.iter().any(|key| self.has_change(key))
    }

    /// The prior and current value of an attribute.
    pub fn get_change(&self, key: &str) -> (Value, Value) {
        let old = self
            .prior
            .as_ref()
            .and_then(|prior| prior.get(key))
            .cloned()
            .unwrap_or(Value::Null);
        (old, self.get(key).clone())
    }

    /// The state to hand back to the host, with `id` filled in.
    pub fn into_state(mut self) -> Value {
        self.state.insert("id".to_string(), Value::String(self.id));
        Value::Object(self.state)
    }
}

/// A single nested block, accepting either an object or a one-element list.
pub fn block_of(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) => Some(map),
        Value::Array(items) => items.first().and_then(Value::as_object),
        _ => None,
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>, ProviderError> {
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        other => Err(ProviderError::InvalidRequest(format!(
            "expected an object for resource data, got {}",
            other
        ))),
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn same_value(a: &Value, b: &Value) -> bool {
    crate::plan::values_equal(false, a, b)
}
