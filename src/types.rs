//! Values exchanged between the host and the provider: plans, imports and metadata.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::ProviderSchema;

/// A change to a single top-level attribute or block during a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeChange {
    /// The attribute or block name.
    pub path: String,
    /// The value before the change, `None` on create.
    pub before: Option<Value>,
    /// The value after the change, `None` on delete.
    pub after: Option<Value>,
}

/// What kind of change an [`AttributeChange`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    /// The attribute gains a value.
    Added,
    /// The attribute loses its value.
    Removed,
    /// The attribute changes value.
    Modified,
}

impl AttributeChange {
    /// Create a new attribute change.
    pub fn new(path: impl Into<String>, before: Option<Value>, after: Option<Value>) -> Self {
        Self {
            path: path.into(),
            before,
            after,
        }
    }

    /// A value that did not exist before.
    pub fn added(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, None, Some(value))
    }

    /// A value that goes away.
    pub fn removed(path: impl Into<String>, value: Value) -> Self {
        Self::new(path, Some(value), None)
    }

    /// A value that changes.
    pub fn modified(path: impl Into<String>, before: Value, after: Value) -> Self {
        Self::new(path, Some(before), Some(after))
    }

    /// Classify the change.
    pub fn kind(&self) -> ChangeKind {
        match (&self.before, &self.after) {
            (None, _) => ChangeKind::Added,
            (Some(_), None) => ChangeKind::Removed,
            (Some(_), Some(_)) => ChangeKind::Modified,
        }
    }
}

/// The result of planning a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanResult {
    /// The state the resource is expected to have once applied.
    pub planned_state: Value,
    /// Per-attribute changes, sorted by path.
    pub changes: Vec<AttributeChange>,
    /// Whether a force-new attribute changed.
    pub requires_replace: bool,
}

impl PlanResult {
    /// A plan that leaves the resource untouched.
    pub fn no_change(state: Value) -> Self {
        Self {
            planned_state: state,
            changes: Vec::new(),
            requires_replace: false,
        }
    }

    /// A plan with changes.
    pub fn with_changes(
        planned_state: Value,
        changes: Vec<AttributeChange>,
        requires_replace: bool,
    ) -> Self {
        Self {
            planned_state,
            changes,
            requires_replace,
        }
    }

    /// Whether applying the plan would touch the resource at all.
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Paths of all changed attributes.
    pub fn changed_paths(&self) -> Vec<&str> {
        self.changes.iter().map(|c| c.path.as_str()).collect()
    }
}

/// A resource brought under management by import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportedResource {
    /// The resource type, e.g. `gocd_environment`.
    pub resource_type: String,
    /// The state read from the server.
    pub state: Value,
}

impl ImportedResource {
    /// Create a new imported resource.
    pub fn new(resource_type: impl Into<String>, state: Value) -> Self {
        Self {
            resource_type: resource_type.into(),
            state,
        }
    }

    /// The `id` recorded in the imported state.
    pub fn id(&self) -> &str {
        self.state.get("id").and_then(Value::as_str).unwrap_or_default()
    }
}

/// Names of everything the provider serves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProviderMetadata {
    /// Resource type names, sorted.
    pub resources: Vec<String>,
    /// Data source type names, sorted.
    pub data_sources: Vec<String>,
    /// Server capabilities.
    pub capabilities: ServerCapabilities,
}

impl ProviderMetadata {
    /// Derive metadata from a schema.
    pub fn from_schema(schema: &ProviderSchema) -> Self {
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        Self {
            resources,
            data_sources,
            capabilities: ServerCapabilities::default(),
        }
    }
}

/// Server capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ServerCapabilities {
    /// Whether the provider supports planning destroy operations.
    pub plan_destroy: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Schema;
    use serde_json::json;

    #[test]
    fn test_change_kinds() {
        assert_eq!(AttributeChange::added("name", json!("dev")).kind(), ChangeKind::Added);
        assert_eq!(
            AttributeChange::removed("pipelines", json!(["build"])).kind(),
            ChangeKind::Removed
        );
        let modified = AttributeChange::modified("retry", json!(30), json!(10));
        assert_eq!(modified.kind(), ChangeKind::Modified);
        assert_eq!(modified.before, Some(json!(30)));
    }

    #[test]
    fn test_plan_result() {
        let unchanged = PlanResult::no_change(json!({"id": "dev"}));
        assert!(!unchanged.has_changes());
        assert!(!unchanged.requires_replace);

        let plan = PlanResult::with_changes(
            json!({"id": "dev", "pipelines": ["build"]}),
            vec![AttributeChange::modified("pipelines", json!([]), json!(["build"]))],
            false,
        );
        assert!(plan.has_changes());
        assert_eq!(plan.changed_paths(), vec!["pipelines"]);
    }

    #[test]
    fn test_imported_resource_id() {
        let imported = ImportedResource::new("gocd_environment", json!({"id": "dev", "name": "dev"}));
        assert_eq!(imported.id(), "dev");
        assert_eq!(ImportedResource::new("gocd_environment", json!({})).id(), "");
    }

    #[test]
    fn test_metadata_sorted() {
        let schema = ProviderSchema::new()
            .with_resource("gocd_role", Schema::v0())
            .with_resource("gocd_agent", Schema::v0())
            .with_data_source("gocd_plugin_info", Schema::v0());
        let metadata = ProviderMetadata::from_schema(&schema);
        assert_eq!(metadata.resources, vec!["gocd_agent", "gocd_role"]);
        assert_eq!(metadata.data_sources, vec!["gocd_plugin_info"]);
    }
}
