//! GoCD resources and data sources.
//!
//! Each module defines the schema of one GoCD entity together with the
//! callbacks that map [`ResourceData`] onto [`GocdClient`] calls. The
//! provider looks them up by type name through [`resources`] and
//! [`data_sources`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::GocdClient;
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::Schema;

pub mod fragments;

mod agent;
mod artifact_store;
mod auth_config;
mod backup_config;
mod backup_schedule;
mod cluster_profile;
mod config_repository;
mod elastic_agent_profile;
mod encrypt_value;
mod environment;
mod pipeline;
mod pipeline_group;
mod plugin_info;
mod plugin_setting;
mod role;
mod secret_config;

pub use agent::{AgentDataSource, AgentResource};
pub use artifact_store::{ArtifactStoreDataSource, ArtifactStoreResource};
pub use auth_config::{AuthConfigDataSource, AuthConfigResource};
pub use backup_config::BackupConfigResource;
pub use backup_schedule::BackupScheduleResource;
pub use cluster_profile::{ClusterProfileDataSource, ClusterProfileResource};
pub use config_repository::{ConfigRepositoryDataSource, ConfigRepositoryResource};
pub use elastic_agent_profile::{ElasticAgentProfileDataSource, ElasticAgentProfileResource};
pub use encrypt_value::EncryptValueResource;
pub use environment::{EnvironmentDataSource, EnvironmentResource};
pub use pipeline::{PipelineDataSource, PipelineResource};
pub use pipeline_group::{PipelineGroupDataSource, PipelineGroupResource};
pub use plugin_info::PluginInfoDataSource;
pub use plugin_setting::{PluginSettingDataSource, PluginSettingResource};
pub use role::{RoleDataSource, RoleResource};
pub use secret_config::{SecretConfigDataSource, SecretConfigResource};

/// A managed GoCD object type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// Type name, e.g. `gocd_environment`.
    fn name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError>;

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError>;

    /// Apply changed attributes. Resources whose attributes all force
    /// replacement keep this default, which only refreshes state.
    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError>;

    fn supports_import(&self) -> bool {
        false
    }

    /// Populate every configurable attribute from the server object named by `data.id()`.
    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let _ = (client, data);
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for resource type '{}'",
            self.name()
        )))
    }
}

/// A read-only view of a GoCD object.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError>;
}

/// Every resource the provider manages.
pub fn resources() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(PluginSettingResource),
        Arc::new(AuthConfigResource),
        Arc::new(ClusterProfileResource),
        Arc::new(ElasticAgentProfileResource),
        Arc::new(ArtifactStoreResource),
        Arc::new(SecretConfigResource),
        Arc::new(ConfigRepositoryResource),
        Arc::new(EnvironmentResource),
        Arc::new(PipelineGroupResource),
        Arc::new(PipelineResource),
        Arc::new(RoleResource),
        Arc::new(AgentResource),
        Arc::new(EncryptValueResource),
        Arc::new(BackupConfigResource),
        Arc::new(BackupScheduleResource),
    ]
}

/// Every data source the provider offers.
pub fn data_sources() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(PluginSettingDataSource),
        Arc::new(PluginInfoDataSource),
        Arc::new(AuthConfigDataSource),
        Arc::new(ClusterProfileDataSource),
        Arc::new(ElasticAgentProfileDataSource),
        Arc::new(ArtifactStoreDataSource),
        Arc::new(SecretConfigDataSource),
        Arc::new(ConfigRepositoryDataSource),
        Arc::new(EnvironmentDataSource),
        Arc::new(PipelineGroupDataSource),
        Arc::new(PipelineDataSource),
        Arc::new(RoleDataSource),
        Arc::new(AgentDataSource),
    ]
}

/// Fail when a resource about to be deleted has no ID.
pub(crate) fn require_id(data: &ResourceData) -> Result<&str, ProviderError> {
    let id = data.id();
    if id.is_empty() {
        return Err(ProviderError::NotFound(format!(
            "resource with the ID '{}' not found",
            id
        )));
    }
    Ok(id)
}

pub(crate) fn skip_update(resource_type: &str, data: &ResourceData) {
    tracing::debug!(resource_type, id = data.id(), "nothing to update so skipping");
}

/// The natural key of an object: the attribute when set, else the resource ID.
pub(crate) fn key_or_id(data: &ResourceData, key: &str) -> String {
    match data.get_string(key) {
        value if value.is_empty() => data.id().to_string(),
        value => value,
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use url::Url;
    use wiremock::MockServer;

    use crate::client::GocdClient;
    use crate::config::{Auth, ProviderConfig, RetryPolicy};
    use crate::logging::LogLevel;

    /// A client pointed at `<mock>/go` with no retries.
    pub fn client(server: &MockServer) -> GocdClient {
        GocdClient::new(&ProviderConfig {
            base_url: Url::parse(&format!("{}/go", server.uri())).unwrap(),
            auth: Auth::Basic {
                username: "admin".to_string(),
                password: "badger".to_string(),
            },
            ca_file: None,
            skip_check: true,
            log_level: LogLevel::Debug,
            retries: RetryPolicy {
                count: 0,
                wait: Duration::ZERO,
            },
        })
        .unwrap()
    }
}
