//! Schema snippets and flatten/expand helpers shared by several resources.

use serde_json::{Map, Value};

use crate::client::{
    AuthorizationEntry, EnvironmentVariable, GroupAuthorization, Material, MaterialAttributes,
    MaterialFilter, PipelineRef, PluginConfiguration, Rule,
};
use crate::error::ProviderError;
use crate::resource_data::block_of;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Block, NestedBlock};
use crate::utils::{bool_field, map_slice, optional_string_field, string_field, string_list};

// =============================================================================
// Properties
// =============================================================================

fn property_block(computed: bool) -> Block {
    let (optional_string, optional_bool) = if computed {
        (Attribute::optional_computed_string(), Attribute::computed_bool())
    } else {
        (Attribute::optional_string(), Attribute::optional_bool())
    };
    Block::new()
        .with_attribute(
            "key",
            if computed {
                Attribute::computed_string()
            } else {
                Attribute::required_string()
            }
            .with_description("the name of the property key."),
        )
        .with_attribute(
            "value",
            optional_string
                .clone()
                .with_description("The value of the property"),
        )
        .with_attribute(
            "encrypted_value",
            optional_string.with_description("The encrypted value of the property"),
        )
        .with_attribute(
            "is_secure",
            optional_bool.with_description(
                "Specify whether the given property is secure or not. If true and encrypted_value is not specified, \
                 GoCD will store the value in encrypted format.",
            ),
        )
}

/// Configuration properties of a plugin-backed object, as a set block.
pub fn properties_block(required: bool, description: &str) -> NestedBlock {
    let block = NestedBlock::set(property_block(false).with_description(description));
    if required {
        block.with_min_items(1)
    } else {
        block
    }
}

/// Properties as returned by a data source.
pub fn properties_data_block(description: &str) -> NestedBlock {
    NestedBlock::list(property_block(true).with_description(description)).computed()
}

/// Read a properties block into API properties. Unset fields stay unset.
pub fn expand_properties(value: &Value) -> Vec<PluginConfiguration> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| PluginConfiguration {
                    key: string_field(item, "key"),
                    value: optional_string_field(item, "value"),
                    encrypted_value: optional_string_field(item, "encrypted_value"),
                    is_secure: item.get("is_secure").and_then(Value::as_bool),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_properties(properties: &[PluginConfiguration]) -> Result<Vec<Value>, ProviderError> {
    map_slice(properties)
}

// =============================================================================
// Rules and policies
// =============================================================================

/// A list of string maps, used for both rules and role policies.
pub fn rules_attribute(flags: AttributeFlags, description: &str) -> Attribute {
    Attribute::new(AttributeType::list_of_string_maps(), flags).with_description(description)
}

/// Read a list of rule maps; non-string values are rendered as strings.
pub fn expand_rules(value: &Value) -> Vec<Rule> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|rule| {
                    rule.iter()
                        .filter(|(_, v)| !v.is_null())
                        .map(|(k, v)| {
                            let v = match v {
                                Value::String(s) => s.clone(),
                                other => other.to_string(),
                            };
                            (k.clone(), v)
                        })
                        .collect()
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_rules(rules: &[Rule]) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(rules)?)
}

// =============================================================================
// Materials
// =============================================================================

const MATERIAL_STRINGS: [(&str, &str); 14] = [
    ("url", "The URL of the repository."),
    ("username", "The user account for the remote repository."),
    ("password", "The password for the specified user."),
    ("encrypted_password", "The encrypted password for the specified user."),
    ("branch", "The branch to build."),
    ("view", "The Perforce view."),
    ("port", "Perforce server connection to use ([transport:]host:port)."),
    ("project_path", "The project path within the TFS collection."),
    ("domain", "The domain name for TFS authentication credentials."),
    ("ref", "The unique package repository id."),
    ("name", "The name of this material."),
    ("stage", "The name of a stage which will trigger this pipeline once it is successful."),
    ("pipeline", "The name of a pipeline that this pipeline depends on."),
    ("destination", "The directory in which source code will be checked out."),
];

const MATERIAL_FLAGS: [(&str, &str); 5] = [
    ("auto_update", "Whether to poll for new changes or not."),
    ("check_externals", "Whether changes to the externals will trigger the pipeline."),
    ("use_tickets", "Whether to work with the Perforce tickets or not."),
    ("ignore_for_scheduling", "Whether the pipeline should be triggered when there are changes in this material."),
    ("invert_filter", "Invert filter to enable whitelist."),
];

fn material_attributes_block(computed: bool) -> Block {
    let mut block = Block::new();
    for (name, description) in MATERIAL_STRINGS {
        let attr = if computed {
            Attribute::optional_computed_string()
        } else {
            Attribute::optional_string()
        };
        let attr = if name == "password" { attr.sensitive() } else { attr };
        block = block.with_attribute(name, attr.with_description(description));
    }
    for (name, description) in MATERIAL_FLAGS {
        let attr = if computed {
            Attribute::computed_bool()
        } else {
            Attribute::optional_bool()
        };
        block = block.with_attribute(name, attr.with_description(description));
    }
    block.with_block(
        "filter",
        NestedBlock::single(
            Block::new()
                .with_attribute(
                    "ignore",
                    Attribute::string_list(if computed {
                        AttributeFlags::computed()
                    } else {
                        AttributeFlags::optional()
                    })
                    .with_description("Files in changesets that should not trigger a pipeline."),
                )
                .with_description("The filter specifies files in changesets that should not trigger a pipeline automatically."),
        ),
    )
}

/// The material a config repository polls. Changing it replaces the repository.
pub fn material_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_description("The type of a material. Can be one of git, svn, hg, p4, tfs."),
            )
            .with_attribute(
                "fingerprint",
                Attribute::optional_string().with_description("The fingerprint of the material."),
            )
            .with_block(
                "attributes",
                NestedBlock::single(
                    material_attributes_block(false)
                        .with_description("The attributes for each material type."),
                )
                .with_min_items(1),
            )
            .with_description("The material to be used by the config repo."),
    )
    .with_min_items(1)
    .with_force_new()
}

pub fn material_data_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("fingerprint", Attribute::optional_computed_string())
            .with_block(
                "attributes",
                NestedBlock::single(material_attributes_block(true)).computed(),
            )
            .with_description("The material used by the config repo."),
    )
    .computed()
}

/// Read a material block; a missing block yields an empty material.
pub fn expand_material(value: &Value) -> Material {
    let Some(material) = block_of(value) else {
        return Material::default();
    };
    let Some(attrs) = material.get("attributes").and_then(block_of) else {
        return Material {
            material_type: string_field(material, "type"),
            fingerprint: string_field(material, "fingerprint"),
            ..Default::default()
        };
    };

    let filter = attrs
        .get("filter")
        .and_then(block_of)
        .map(|filter| MaterialFilter {
            ignore: string_list(filter.get("ignore").unwrap_or(&Value::Null)),
        });

    Material {
        material_type: string_field(material, "type"),
        fingerprint: string_field(material, "fingerprint"),
        attributes: MaterialAttributes {
            url: string_field(attrs, "url"),
            username: string_field(attrs, "username"),
            password: string_field(attrs, "password"),
            encrypted_password: string_field(attrs, "encrypted_password"),
            branch: string_field(attrs, "branch"),
            view: string_field(attrs, "view"),
            port: string_field(attrs, "port"),
            project_path: string_field(attrs, "project_path"),
            domain: string_field(attrs, "domain"),
            reference: string_field(attrs, "ref"),
            name: string_field(attrs, "name"),
            stage: string_field(attrs, "stage"),
            pipeline: string_field(attrs, "pipeline"),
            destination: string_field(attrs, "destination"),
            auto_update: bool_field(attrs, "auto_update"),
            check_externals: bool_field(attrs, "check_externals"),
            use_tickets: bool_field(attrs, "use_tickets"),
            ignore_for_scheduling: bool_field(attrs, "ignore_for_scheduling"),
            invert_filter: bool_field(attrs, "invert_filter"),
            filter,
        },
    }
}

/// Flatten a material for resource state: empty strings are dropped, flags kept.
pub fn flatten_material(material: &Material) -> Value {
    flatten_material_with(material, true)
}

/// Flatten a material for a data source: empty strings and unset flags are dropped.
pub fn flatten_material_data(material: &Material) -> Value {
    flatten_material_with(material, false)
}

fn flatten_material_with(material: &Material, keep_false: bool) -> Value {
    if material.is_empty() {
        return Value::Null;
    }

    let a = &material.attributes;
    let strings = [
        ("url", &a.url),
        ("username", &a.username),
        ("password", &a.password),
        ("encrypted_password", &a.encrypted_password),
        ("branch", &a.branch),
        ("view", &a.view),
        ("port", &a.port),
        ("project_path", &a.project_path),
        ("domain", &a.domain),
        ("ref", &a.reference),
        ("name", &a.name),
        ("stage", &a.stage),
        ("pipeline", &a.pipeline),
        ("destination", &a.destination),
    ];
    let flags = [
        ("auto_update", a.auto_update),
        ("check_externals", a.check_externals),
        ("use_tickets", a.use_tickets),
        ("ignore_for_scheduling", a.ignore_for_scheduling),
        ("invert_filter", a.invert_filter),
    ];

    let mut attrs = Map::new();
    if *a != MaterialAttributes::default() {
        for (name, value) in strings {
            if !value.is_empty() {
                attrs.insert(name.to_string(), Value::String(value.clone()));
            }
        }
        for (name, value) in flags {
            if value || keep_false {
                attrs.insert(name.to_string(), Value::Bool(value));
            }
        }
        if let Some(filter) = a.filter.as_ref().filter(|f| !f.ignore.is_empty()) {
            let mut block = Map::new();
            block.insert("ignore".to_string(), serde_json::json!(filter.ignore));
            attrs.insert("filter".to_string(), Value::Object(block));
        }
    }

    let mut result = Map::new();
    result.insert("type".to_string(), Value::String(material.material_type.clone()));
    if !material.fingerprint.is_empty() {
        result.insert(
            "fingerprint".to_string(),
            Value::String(material.fingerprint.clone()),
        );
    }
    if !attrs.is_empty() {
        result.insert("attributes".to_string(), Value::Object(attrs));
    }
    Value::Object(result)
}

// =============================================================================
// Pipeline group authorization
// =============================================================================

const PERMISSIONS: [(&str, &str); 3] = [
    ("view", "Users and roles allowed to view the pipelines of the group."),
    ("operate", "Users and roles allowed to operate the pipelines of the group."),
    ("admins", "Users and roles allowed to administer the group."),
];

fn permission_block(computed: bool) -> Block {
    let flags = if computed {
        AttributeFlags::computed()
    } else {
        AttributeFlags::optional()
    };
    Block::new()
        .with_attribute(
            "users",
            Attribute::string_list(flags).with_description("The list of users."),
        )
        .with_attribute(
            "roles",
            Attribute::string_list(flags).with_description("The list of roles."),
        )
}

pub fn authorization_block(computed: bool) -> NestedBlock {
    let mut block =
        Block::new().with_description("The authorization configuration for the pipeline group.");
    for (name, description) in PERMISSIONS {
        let nested = NestedBlock::single(permission_block(computed).with_description(description));
        block = block.with_block(name, if computed { nested.computed() } else { nested });
    }
    let nested = NestedBlock::single(block);
    if computed {
        nested.computed()
    } else {
        nested
    }
}

/// Read an authorization block; an absent block grants nothing.
pub fn expand_authorization(value: &Value) -> GroupAuthorization {
    let Some(auth) = block_of(value) else {
        return GroupAuthorization::default();
    };
    let entry = |name: &str| {
        auth.get(name)
            .and_then(block_of)
            .map(|entry| AuthorizationEntry {
                users: string_list(entry.get("users").unwrap_or(&Value::Null)),
                roles: string_list(entry.get("roles").unwrap_or(&Value::Null)),
            })
    };
    GroupAuthorization {
        view: entry("view"),
        operate: entry("operate"),
        admins: entry("admins"),
    }
}

fn authorization_entries(auth: &GroupAuthorization) -> [(&'static str, Option<&AuthorizationEntry>); 3] {
    [
        ("view", auth.view.as_ref()),
        ("operate", auth.operate.as_ref()),
        ("admins", auth.admins.as_ref()),
    ]
}

fn entry_value(entry: &AuthorizationEntry) -> Value {
    serde_json::json!({ "users": entry.users, "roles": entry.roles })
}

/// Flatten for resource state; permissions nobody holds are omitted.
pub fn flatten_authorization(auth: &GroupAuthorization) -> Value {
    let map: Map<String, Value> = authorization_entries(auth)
        .into_iter()
        .filter_map(|(name, entry)| {
            entry
                .filter(|e| !e.is_empty())
                .map(|e| (name.to_string(), entry_value(e)))
        })
        .collect();
    Value::Object(map)
}

/// Flatten for data sources; all three permissions are always present.
pub fn flatten_authorization_data(auth: &GroupAuthorization) -> Value {
    let empty = AuthorizationEntry::default();
    let map: Map<String, Value> = authorization_entries(auth)
        .into_iter()
        .map(|(name, entry)| (name.to_string(), entry_value(entry.unwrap_or(&empty))))
        .collect();
    Value::Object(map)
}

// =============================================================================
// Environment variables and pipeline references
// =============================================================================

fn environment_variable_block() -> Block {
    Block::new()
        .with_attribute(
            "name",
            Attribute::required_string().with_description("The name of the environment variable."),
        )
        .with_attribute(
            "value",
            Attribute::optional_string().with_description(
                "The value of the environment variable. You MUST specify one of value or encrypted_value.",
            ),
        )
        .with_attribute(
            "encrypted_value",
            Attribute::optional_string().with_description(
                "The encrypted value of the environment variable. You MUST specify one of value or encrypted_value.",
            ),
        )
        .with_attribute(
            "secure",
            Attribute::optional_bool()
                .with_description("Whether environment variable is secure or not."),
        )
}

/// Environment variables of an environment, as a set block.
pub fn environment_variables_block() -> NestedBlock {
    NestedBlock::set(environment_variable_block().with_description(
        "The list of environment variables that will be passed to all tasks that are part of this environment.",
    ))
}

pub fn environment_variables_data_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("value", Attribute::optional_computed_string())
            .with_attribute("encrypted_value", Attribute::optional_computed_string())
            .with_attribute("secure", Attribute::computed_bool()),
    )
    .computed()
}

pub fn expand_environment_variables(value: &Value) -> Vec<EnvironmentVariable> {
    value
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(|item| EnvironmentVariable {
                    name: string_field(item, "name"),
                    value: optional_string_field(item, "value"),
                    encrypted_value: optional_string_field(item, "encrypted_value"),
                    secure: bool_field(item, "secure"),
                })
                .collect()
        })
        .unwrap_or_default()
}

pub fn flatten_environment_variables(
    variables: &[EnvironmentVariable],
) -> Result<Vec<Value>, ProviderError> {
    map_slice(variables)
}

pub fn pipeline_refs(names: &[String]) -> Vec<PipelineRef> {
    names
        .iter()
        .map(|name| PipelineRef { name: name.clone() })
        .collect()
}

pub fn pipeline_names(pipelines: &[PipelineRef]) -> Vec<String> {
    pipelines.iter().map(|p| p.name.clone()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_expand_properties() {
        let props = expand_properties(&json!([
            {"key": "Image", "value": "alpine:3", "is_secure": false},
            {"key": "Token", "encrypted_value": "AES:abc", "value": null},
            "junk",
        ]));
        assert_eq!(props.len(), 2);
        assert_eq!(props[0].value.as_deref(), Some("alpine:3"));
        assert_eq!(props[0].is_secure, Some(false));
        assert_eq!(props[1].value, None);
        assert_eq!(props[1].encrypted_value.as_deref(), Some("AES:abc"));
        assert!(expand_properties(&Value::Null).is_empty());
    }

    #[test]
    fn test_flatten_properties_uses_api_names() {
        let flattened = flatten_properties(&[PluginConfiguration {
            key: "Image".to_string(),
            value: Some("alpine".to_string()),
            ..Default::default()
        }])
        .unwrap();
        assert_eq!(flattened, vec![json!({"key": "Image", "value": "alpine"})]);
    }

    #[test]
    fn test_expand_rules() {
        let rules = expand_rules(&json!([
            {"directive": "allow", "action": "refer", "type": "pipeline_group", "resource": "*"},
        ]));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0]["directive"], "allow");
        assert_eq!(flatten_rules(&rules).unwrap()[0]["resource"], "*");
    }

    #[test]
    fn test_expand_material_accepts_list_blocks() {
        let material = expand_material(&json!([{
            "type": "git",
            "attributes": [{
                "url": "https://github.com/gocd/sample.git",
                "branch": "main",
                "auto_update": true,
                "filter": [{"ignore": ["*.md"]}],
            }],
        }]));
        assert_eq!(material.material_type, "git");
        assert_eq!(material.attributes.branch, "main");
        assert!(material.attributes.auto_update);
        assert_eq!(material.attributes.filter.unwrap().ignore, vec!["*.md"]);
        assert!(expand_material(&Value::Null).is_empty());
    }

    #[test]
    fn test_flatten_material_resource_vs_data() {
        let material = Material {
            material_type: "git".to_string(),
            fingerprint: String::new(),
            attributes: MaterialAttributes {
                url: "https://github.com/gocd/sample.git".to_string(),
                auto_update: true,
                ..Default::default()
            },
        };

        let resource = flatten_material(&material);
        assert_eq!(resource["attributes"]["auto_update"], true);
        assert_eq!(resource["attributes"]["check_externals"], false);
        assert!(resource["attributes"].get("branch").is_none());
        assert!(resource.get("fingerprint").is_none());

        let data = flatten_material_data(&material);
        assert_eq!(data["attributes"]["auto_update"], true);
        assert!(data["attributes"].get("check_externals").is_none());

        assert!(flatten_material(&Material::default()).is_null());
    }

    #[test]
    fn test_material_round_trip_through_state() {
        let config = json!({
            "type": "git",
            "attributes": {"url": "https://github.com/gocd/sample.git", "auto_update": true},
        });
        let flattened = flatten_material(&expand_material(&config));
        assert!(crate::plan::values_equal(false, &config, &flattened));
    }

    #[test]
    fn test_authorization() {
        let auth = expand_authorization(&json!({
            "view": {"users": ["bob"], "roles": []},
            "admins": [{"roles": ["admins"]}],
        }));
        assert_eq!(auth.view.as_ref().unwrap().users, vec!["bob"]);
        assert!(auth.operate.is_none());
        assert_eq!(auth.admins.as_ref().unwrap().roles, vec!["admins"]);

        let resource = flatten_authorization(&auth);
        assert!(resource.get("operate").is_none());
        assert_eq!(resource["view"]["users"], json!(["bob"]));

        let data = flatten_authorization_data(&auth);
        assert_eq!(data["operate"], json!({"users": [], "roles": []}));

        assert_eq!(expand_authorization(&Value::Null), GroupAuthorization::default());
    }

    #[test]
    fn test_environment_variables() {
        let vars = expand_environment_variables(&json!([
            {"name": "JAVA_HOME", "value": "/usr/lib/jvm"},
            {"name": "TOKEN", "encrypted_value": "AES:x", "secure": true},
        ]));
        assert_eq!(vars[0].value.as_deref(), Some("/usr/lib/jvm"));
        assert!(vars[1].secure);
        let flattened = flatten_environment_variables(&vars).unwrap();
        assert_eq!(flattened[0], json!({"name": "JAVA_HOME", "value": "/usr/lib/jvm", "secure": false}));
    }

    #[test]
    fn test_pipeline_refs() {
        let names = vec!["build".to_string(), "deploy".to_string()];
        let refs = pipeline_refs(&names);
        assert_eq!(refs[1].name, "deploy");
        assert_eq!(pipeline_names(&refs), names);
    }

    #[test]
    fn test_schema_fragments() {
        assert!(material_block().force_new);
        assert!(properties_data_block("props").computed);
        assert_eq!(properties_block(true, "props").min_items, 1);
        assert!(authorization_block(true).block.blocks["view"].computed);
    }
}
