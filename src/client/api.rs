//! One method per GoCD API call the provider makes.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Map, Value};

use super::models::*;
use super::{ApiRequest, ApiResponse, ApiVersion, GocdClient};
use crate::error::ProviderError;

const HEALTH: &str = "api/v1/health";
const ENCRYPT: &str = "api/admin/encrypt";
const PLUGIN_SETTINGS: &str = "api/admin/plugin_settings";
const PLUGIN_INFO: &str = "api/admin/plugin_info";
const AUTH_CONFIGS: &str = "api/admin/security/auth_configs";
const CLUSTER_PROFILES: &str = "api/admin/elastic/cluster_profiles";
const ELASTIC_PROFILES: &str = "api/elastic/profiles";
const ARTIFACT_STORES: &str = "api/admin/artifact_stores";
const SECRET_CONFIGS: &str = "api/admin/secret_configs";
const CONFIG_REPOS: &str = "api/admin/config_repos";
const ENVIRONMENTS: &str = "api/admin/environments";
const PIPELINE_GROUPS: &str = "api/admin/pipeline_groups";
const PIPELINES: &str = "api/admin/pipelines";
const ROLES: &str = "api/admin/security/roles";
const SYSTEM_ADMINS: &str = "api/admin/security/system_admins";
const AGENTS: &str = "api/agents";
const BACKUP_CONFIG: &str = "api/config/backup";
const BACKUPS: &str = "api/backups";

const V1: ApiVersion = ApiVersion::V(1);
const V2: ApiVersion = ApiVersion::V(2);
const V3: ApiVersion = ApiVersion::V(3);
const V4: ApiVersion = ApiVersion::V(4);
const V7: ApiVersion = ApiVersion::V(7);
const V11: ApiVersion = ApiVersion::V(11);

impl GocdClient {
    // =========================================================================
    // Shared request shapes
    // =========================================================================

    async fn fetch<T>(&self, path: &str, version: ApiVersion, id: &str) -> Result<T, ProviderError>
    where
        T: DeserializeOwned + Versioned,
    {
        let request = ApiRequest::new(Method::GET, path, version).segment(id);
        self.execute(request).await?.versioned()
    }

    async fn create_model<T>(&self, path: &str, version: ApiVersion, model: &T) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned + Versioned,
    {
        let request = ApiRequest::new(Method::POST, path, version).body(serde_json::to_value(model)?);
        self.execute(request).await?.versioned()
    }

    async fn update_model<T>(
        &self,
        path: &str,
        version: ApiVersion,
        id: &str,
        model: &T,
    ) -> Result<T, ProviderError>
    where
        T: Serialize + DeserializeOwned + Versioned,
    {
        let request = ApiRequest::new(Method::PUT, path, version)
            .segment(id)
            .if_match(model.etag())
            .body(serde_json::to_value(model)?);
        self.execute(request).await?.versioned()
    }

    async fn remove(&self, path: &str, version: ApiVersion, id: &str) -> Result<(), ProviderError> {
        let request = ApiRequest::new(Method::DELETE, path, version).segment(id);
        self.execute(request).await.map(|_| ())
    }

    // =========================================================================
    // Server
    // =========================================================================

    /// Ask the server whether it is up. Non-JSON answers count as healthy.
    pub async fn server_health(&self) -> Result<Value, ProviderError> {
        let response = self
            .execute(ApiRequest::new(Method::GET, HEALTH, ApiVersion::Json))
            .await?;
        Ok(response.json().unwrap_or_else(|_| Value::String(response.body.clone())))
    }

    pub async fn encrypt_text(&self, value: &str) -> Result<EncryptedValue, ProviderError> {
        let request = ApiRequest::new(Method::POST, ENCRYPT, V1).body(json!({ "value": value }));
        self.execute(request).await?.json()
    }

    // =========================================================================
    // Plugins
    // =========================================================================

    pub async fn get_plugin_settings(&self, plugin_id: &str) -> Result<PluginSettings, ProviderError> {
        self.fetch(PLUGIN_SETTINGS, V1, plugin_id).await
    }

    pub async fn create_plugin_settings(
        &self,
        settings: &PluginSettings,
    ) -> Result<PluginSettings, ProviderError> {
        self.create_model(PLUGIN_SETTINGS, V1, settings).await
    }

    pub async fn update_plugin_settings(
        &self,
        settings: &PluginSettings,
    ) -> Result<PluginSettings, ProviderError> {
        self.update_model(PLUGIN_SETTINGS, V1, &settings.plugin_id, settings)
            .await
    }

    pub async fn get_plugin_info(&self, plugin_id: &str) -> Result<PluginInfo, ProviderError> {
        self.fetch(PLUGIN_INFO, V7, plugin_id).await
    }

    // =========================================================================
    // Security
    // =========================================================================

    pub async fn get_auth_config(&self, id: &str) -> Result<AuthConfig, ProviderError> {
        self.fetch(AUTH_CONFIGS, V2, id).await
    }

    pub async fn create_auth_config(&self, config: &AuthConfig) -> Result<AuthConfig, ProviderError> {
        self.create_model(AUTH_CONFIGS, V2, config).await
    }

    pub async fn update_auth_config(&self, config: &AuthConfig) -> Result<AuthConfig, ProviderError> {
        self.update_model(AUTH_CONFIGS, V2, &config.id, config).await
    }

    pub async fn delete_auth_config(&self, id: &str) -> Result<(), ProviderError> {
        self.remove(AUTH_CONFIGS, V2, id).await
    }

    pub async fn get_role(&self, name: &str) -> Result<Role, ProviderError> {
        self.fetch(ROLES, V3, name).await
    }

    pub async fn create_role(&self, role: &Role) -> Result<Role, ProviderError> {
        self.create_model(ROLES, V3, role).await
    }

    pub async fn update_role(&self, role: &Role) -> Result<Role, ProviderError> {
        self.update_model(ROLES, V3, &role.name, role).await
    }

    pub async fn delete_role(&self, name: &str) -> Result<(), ProviderError> {
        self.remove(ROLES, V3, name).await
    }

    pub async fn get_system_admins(&self) -> Result<SystemAdmins, ProviderError> {
        let request = ApiRequest::new(Method::GET, SYSTEM_ADMINS, V2);
        self.execute(request).await?.versioned()
    }

    /// Add and remove roles from the system admins in a single request.
    pub async fn update_system_admins_bulk(
        &self,
        roles: &AdminRoleChanges,
    ) -> Result<SystemAdmins, ProviderError> {
        let body = json!({ "operations": { "roles": serde_json::to_value(roles)? } });
        let request = ApiRequest::new(Method::PATCH, SYSTEM_ADMINS, V2).body(body);
        self.execute(request).await?.versioned()
    }

    // =========================================================================
    // Elastic agents and artifacts
    // =========================================================================

    pub async fn get_cluster_profile(&self, id: &str) -> Result<ClusterProfile, ProviderError> {
        self.fetch(CLUSTER_PROFILES, V1, id).await
    }

    pub async fn create_cluster_profile(
        &self,
        profile: &ClusterProfile,
    ) -> Result<ClusterProfile, ProviderError> {
        self.create_model(CLUSTER_PROFILES, V1, profile).await
    }

    pub async fn update_cluster_profile(
        &self,
        profile: &ClusterProfile,
    ) -> Result<ClusterProfile, ProviderError> {
        self.update_model(CLUSTER_PROFILES, V1, &profile.id, profile)
            .await
    }

    pub async fn delete_cluster_profile(&self, id: &str) -> Result<(), ProviderError> {
        self.remove(CLUSTER_PROFILES, V1, id).await
    }

    pub async fn get_elastic_agent_profile(
        &self,
        id: &str,
    ) -> Result<ElasticAgentProfile, ProviderError> {
        self.fetch(ELASTIC_PROFILES, V2, id).await
    }

    pub async fn create_elastic_agent_profile(
        &self,
        profile: &ElasticAgentProfile,
    ) -> Result<ElasticAgentProfile, ProviderError> {
        self.create_model(ELASTIC_PROFILES, V2, profile).await
    }

    pub async fn update_elastic_agent_profile(
        &self,
        profile: &ElasticAgentProfile,
    ) -> Result<ElasticAgentProfile, ProviderError> {
        self.update_model(ELASTIC_PROFILES, V2, &profile.id, profile)
            .await
    }

    pub async fn delete_elastic_agent_profile(&self, id: &str) -> Result<(), ProviderError> {
        self.remove(ELASTIC_PROFILES, V2, id).await
    }

    pub async fn get_artifact_store(&self, id: &str) -> Result<ArtifactStore, ProviderError> {
        self.fetch(ARTIFACT_STORES, V1, id).await
    }

    pub async fn create_artifact_store(
        &self,
        store: &ArtifactStore,
    ) -> Result<ArtifactStore, ProviderError> {
        self.create_model(ARTIFACT_STORES, V1, store).await
    }

    pub async fn update_artifact_store(
        &self,
        store: &ArtifactStore,
    ) -> Result<ArtifactStore, ProviderError> {
        self.update_model(ARTIFACT_STORES, V1, &store.id, store).await
    }

    pub async fn delete_artifact_store(&self, id: &str) -> Result<(), ProviderError> {
        self.remove(ARTIFACT_STORES, V1, id).await
    }

    pub async fn get_secret_config(&self, id: &str) -> Result<SecretConfig, ProviderError> {
        self.fetch(SECRET_CONFIGS, V3, id).await
    }

    pub async fn create_secret_config(
        &self,
        config: &SecretConfig,
    ) -> Result<SecretConfig, ProviderError> {
        self.create_model(SECRET_CONFIGS, V3, config).await
    }

    pub async fn update_secret_config(
        &self,
        config: &SecretConfig,
    ) -> Result<SecretConfig, ProviderError> {
        self.update_model(SECRET_CONFIGS, V3, &config.id, config).await
    }

    pub async fn delete_secret_config(&self, id: &str) -> Result<(), ProviderError> {
        self.remove(SECRET_CONFIGS, V3, id).await
    }

    // =========================================================================
    // Pipelines
    // =========================================================================

    pub async fn get_config_repo(&self, id: &str) -> Result<ConfigRepo, ProviderError> {
        self.fetch(CONFIG_REPOS, V4, id).await
    }

    pub async fn create_config_repo(&self, repo: &ConfigRepo) -> Result<ConfigRepo, ProviderError> {
        self.create_model(CONFIG_REPOS, V4, repo).await
    }

    pub async fn update_config_repo(&self, repo: &ConfigRepo) -> Result<ConfigRepo, ProviderError> {
        self.update_model(CONFIG_REPOS, V4, &repo.id, repo).await
    }

    pub async fn delete_config_repo(&self, id: &str) -> Result<(), ProviderError> {
        self.remove(CONFIG_REPOS, V4, id).await
    }

    pub async fn get_environment(&self, name: &str) -> Result<Environment, ProviderError> {
        self.fetch(ENVIRONMENTS, V3, name).await
    }

    pub async fn create_environment(
        &self,
        environment: &Environment,
    ) -> Result<Environment, ProviderError> {
        self.create_model(ENVIRONMENTS, V3, environment).await
    }

    pub async fn update_environment(
        &self,
        environment: &Environment,
    ) -> Result<Environment, ProviderError> {
        self.update_model(ENVIRONMENTS, V3, &environment.name, environment)
            .await
    }

    pub async fn delete_environment(&self, name: &str) -> Result<(), ProviderError> {
        self.remove(ENVIRONMENTS, V3, name).await
    }

    pub async fn get_pipeline_group(&self, name: &str) -> Result<PipelineGroup, ProviderError> {
        self.fetch(PIPELINE_GROUPS, V1, name).await
    }

    pub async fn create_pipeline_group(
        &self,
        group: &PipelineGroup,
    ) -> Result<PipelineGroup, ProviderError> {
        self.create_model(PIPELINE_GROUPS, V1, group).await
    }

    pub async fn update_pipeline_group(
        &self,
        group: &PipelineGroup,
    ) -> Result<PipelineGroup, ProviderError> {
        self.update_model(PIPELINE_GROUPS, V1, &group.name, group)
            .await
    }

    pub async fn delete_pipeline_group(&self, name: &str) -> Result<(), ProviderError> {
        self.remove(PIPELINE_GROUPS, V1, name).await
    }

    pub async fn get_pipeline_config(&self, name: &str) -> Result<PipelineConfig, ProviderError> {
        let request = ApiRequest::new(Method::GET, PIPELINES, V11).segment(name);
        pipeline_config(self.execute(request).await?, name)
    }

    /// Create a pipeline in `pipeline.group`, optionally paused.
    pub async fn create_pipeline(
        &self,
        pipeline: &PipelineConfig,
    ) -> Result<PipelineConfig, ProviderError> {
        let body = json!({
            "group": pipeline.group.as_str(),
            "pipeline": Value::Object(pipeline.config.clone()),
        });
        let mut request = ApiRequest::new(Method::POST, PIPELINES, V11).body(body);
        if pipeline.pause_on_creation {
            request = request
                .header("X-pause-pipeline", "true")
                .header("X-pause-cause", pipeline.pause_reason.clone());
        }
        pipeline_config(self.execute(request).await?, &pipeline.name)
    }

    pub async fn update_pipeline_config(
        &self,
        pipeline: &PipelineConfig,
    ) -> Result<PipelineConfig, ProviderError> {
        let request = ApiRequest::new(Method::PUT, PIPELINES, V11)
            .segment(&pipeline.name)
            .if_match(&pipeline.etag)
            .body(Value::Object(pipeline.config.clone()));
        pipeline_config(self.execute(request).await?, &pipeline.name)
    }

    pub async fn delete_pipeline(&self, name: &str) -> Result<(), ProviderError> {
        self.remove(PIPELINES, V11, name).await
    }

    // =========================================================================
    // Agents
    // =========================================================================

    pub async fn get_agent(&self, uuid: &str) -> Result<Agent, ProviderError> {
        self.fetch(AGENTS, V7, uuid).await
    }

    pub async fn update_agent(&self, update: &AgentUpdate) -> Result<Agent, ProviderError> {
        let request = ApiRequest::new(Method::PATCH, AGENTS, V7)
            .segment(&update.uuid)
            .body(serde_json::to_value(update)?);
        self.execute(request).await?.versioned()
    }

    // =========================================================================
    // Backups
    // =========================================================================

    pub async fn get_backup_config(&self) -> Result<BackupConfig, ProviderError> {
        let request = ApiRequest::new(Method::GET, BACKUP_CONFIG, V1);
        self.execute(request).await?.json()
    }

    pub async fn create_or_update_backup_config(
        &self,
        config: &BackupConfig,
    ) -> Result<BackupConfig, ProviderError> {
        let request =
            ApiRequest::new(Method::POST, BACKUP_CONFIG, V1).body(serde_json::to_value(config)?);
        self.execute(request).await?.json()
    }

    pub async fn delete_backup_config(&self) -> Result<(), ProviderError> {
        let request = ApiRequest::new(Method::DELETE, BACKUP_CONFIG, V1);
        self.execute(request).await.map(|_| ())
    }

    /// Start a backup. GoCD answers with the new backup's location and how
    /// long to wait before polling it.
    pub async fn schedule_backup(&self) -> Result<ScheduledBackup, ProviderError> {
        let request =
            ApiRequest::new(Method::POST, BACKUPS, V2).header("X-GoCD-Confirm", "true");
        let response = self.execute(request).await?;

        let location = response.header("Location").unwrap_or_default();
        let id = location
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        if id.is_empty() {
            return Err(ProviderError::Sdk(
                "scheduling backup returned no backup location".to_string(),
            ));
        }

        let retry_after = match response.header("Retry-After") {
            Some(value) => value.trim().parse::<u64>().map_err(|err| {
                ProviderError::Sdk(format!("invalid Retry-After header '{}': {}", value, err))
            })?,
            None => 0,
        };

        Ok(ScheduledBackup { id, retry_after })
    }

    pub async fn get_backup(&self, id: &str) -> Result<Backup, ProviderError> {
        let request = ApiRequest::new(Method::GET, BACKUPS, V2).segment(id);
        self.execute(request).await?.json()
    }
}

fn pipeline_config(response: ApiResponse, name: &str) -> Result<PipelineConfig, ProviderError> {
    let etag = response.etag();
    let config: Map<String, Value> = match response.json::<Value>()? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    Ok(PipelineConfig {
        name: config
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string(),
        group: config
            .get("group")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        config,
        etag,
        ..Default::default()
    })
}
