//! GoCD API payloads.
//!
//! Field names follow the GoCD JSON API. `etag` is never part of a payload:
//! the client fills it from the `ETag` response header and sends it back as
//! `If-Match`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Models that carry the version token of the object they were read from.
pub trait Versioned {
    fn etag(&self) -> &str;
    fn set_etag(&mut self, etag: String);
}

macro_rules! versioned {
    ($($model:ty),+ $(,)?) => {
        $(
            impl Versioned for $model {
                fn etag(&self) -> &str {
                    &self.etag
                }

                fn set_etag(&mut self, etag: String) {
                    self.etag = etag;
                }
            }
        )+
    };
}

versioned!(
    PluginSettings,
    PluginInfo,
    ClusterProfile,
    ElasticAgentProfile,
    ArtifactStore,
    AuthConfig,
    SecretConfig,
    ConfigRepo,
    Environment,
    PipelineGroup,
    Role,
    SystemAdmins,
    Agent,
);

fn is_false(value: &bool) -> bool {
    !*value
}

/// A rule or policy entry: `directive`, `action`, `type`, `resource`.
pub type Rule = BTreeMap<String, String>;

/// One key of a plugin-backed configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginConfiguration {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secure: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginSettings {
    pub plugin_id: String,
    #[serde(default)]
    pub configuration: Vec<PluginConfiguration>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginStatus {
    #[serde(default)]
    pub state: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginInfo {
    pub id: String,
    #[serde(default)]
    pub status: PluginStatus,
    #[serde(default)]
    pub plugin_file_location: String,
    #[serde(default)]
    pub bundled_plugin: bool,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub id: String,
    pub plugin_id: String,
    #[serde(default)]
    pub properties: Vec<PluginConfiguration>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElasticAgentProfile {
    pub id: String,
    pub cluster_profile_id: String,
    #[serde(default)]
    pub properties: Vec<PluginConfiguration>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ArtifactStore {
    pub id: String,
    pub plugin_id: String,
    #[serde(default)]
    pub properties: Vec<PluginConfiguration>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthConfig {
    pub id: String,
    pub plugin_id: String,
    #[serde(default)]
    pub allow_only_known_users_to_login: bool,
    #[serde(default)]
    pub properties: Vec<PluginConfiguration>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretConfig {
    pub id: String,
    pub plugin_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub properties: Vec<PluginConfiguration>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialFilter {
    #[serde(default)]
    pub ignore: Vec<String>,
}

/// Material-type specific attributes. Empty strings and unset flags are left
/// out of requests; `auto_update` is always sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaterialAttributes {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub url: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub encrypted_password: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub branch: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub view: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub port: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    #[serde(rename = "ref", default, skip_serializing_if = "String::is_empty")]
    pub reference: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stage: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub pipeline: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub destination: String,
    #[serde(default)]
    pub auto_update: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub check_externals: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub use_tickets: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub ignore_for_scheduling: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub invert_filter: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<MaterialFilter>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Material {
    #[serde(rename = "type")]
    pub material_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub fingerprint: String,
    #[serde(default)]
    pub attributes: MaterialAttributes,
}

impl Material {
    pub fn is_empty(&self) -> bool {
        *self == Material::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConfigRepo {
    pub id: String,
    pub plugin_id: String,
    #[serde(default)]
    pub material: Material,
    #[serde(default)]
    pub configuration: Vec<PluginConfiguration>,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(skip)]
    pub etag: String,
}

/// A pipeline referenced by name from an environment or a pipeline group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentVariable {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encrypted_value: Option<String>,
    #[serde(default)]
    pub secure: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineRef>,
    #[serde(default)]
    pub environment_variables: Vec<EnvironmentVariable>,
    #[serde(skip)]
    pub etag: String,
}

/// Users and roles granted one permission on a pipeline group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationEntry {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl AuthorizationEntry {
    pub fn is_empty(&self) -> bool {
        self.users.is_empty() && self.roles.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAuthorization {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<AuthorizationEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operate: Option<AuthorizationEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admins: Option<AuthorizationEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineGroup {
    pub name: String,
    #[serde(default)]
    pub pipelines: Vec<PipelineRef>,
    #[serde(default)]
    pub authorization: GroupAuthorization,
    #[serde(skip)]
    pub etag: String,
}

/// A pipeline definition as GoCD stores it, kept as raw JSON.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineConfig {
    pub name: String,
    pub group: String,
    pub config: Map<String, Value>,
    /// Only honoured on create.
    pub pause_on_creation: bool,
    pub pause_reason: String,
    pub etag: String,
}

impl Versioned for PipelineConfig {
    fn etag(&self) -> &str {
        &self.etag
    }

    fn set_etag(&mut self, etag: String) {
        self.etag = etag;
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoleAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub users: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_config_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Vec<PluginConfiguration>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    #[serde(rename = "type")]
    pub role_type: String,
    #[serde(default)]
    pub attributes: RoleAttributes,
    #[serde(default)]
    pub policy: Vec<Rule>,
    #[serde(skip)]
    pub etag: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemAdmins {
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(skip)]
    pub etag: String,
}

/// Roles to add to and remove from the system admins in one request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRoleChanges {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub add: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub remove: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentEnvironment {
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub uuid: String,
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub ip_address: String,
    #[serde(default)]
    pub sandbox: String,
    #[serde(default)]
    pub operating_system: String,
    /// Bytes free, or the string `"unknown"`.
    #[serde(default)]
    pub free_space: Value,
    #[serde(default)]
    pub agent_config_state: String,
    #[serde(default)]
    pub agent_state: String,
    #[serde(default)]
    pub agent_version: String,
    #[serde(default)]
    pub build_state: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub environments: Vec<AgentEnvironment>,
    #[serde(default)]
    pub elastic_agent_id: String,
    #[serde(default)]
    pub elastic_plugin_id: String,
    #[serde(default)]
    pub build_details: Map<String, Value>,
    #[serde(skip)]
    pub etag: String,
}

impl Agent {
    pub fn free_space_bytes(&self) -> f64 {
        match &self.free_space {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.parse().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    pub fn environment_names(&self) -> Vec<String> {
        self.environments.iter().map(|e| e.name.clone()).collect()
    }

    /// String-valued build details; links and nested objects are dropped.
    pub fn build_detail_strings(&self) -> BTreeMap<String, String> {
        self.build_details
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
            .collect()
    }
}

/// Fields of an agent that can be changed through the API.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentUpdate {
    #[serde(skip)]
    pub uuid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hostname: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub agent_config_state: String,
    #[serde(default)]
    pub resources: Vec<String>,
    #[serde(default)]
    pub environments: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub schedule: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub post_backup_script: String,
    #[serde(default)]
    pub email_on_success: bool,
    #[serde(default)]
    pub email_on_failure: bool,
}

/// The handle GoCD returns when a backup is scheduled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduledBackup {
    pub id: String,
    /// Seconds GoCD asks the caller to wait before polling.
    pub retry_after: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Backup {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub progress_status: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedValue {
    pub encrypted_value: String,
}
