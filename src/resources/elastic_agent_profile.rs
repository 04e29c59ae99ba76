use async_trait::async_trait;

use super::fragments::{expand_properties, flatten_properties, properties_block, properties_data_block};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{ElasticAgentProfile, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

const PROPERTIES_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of this elastic agent profile.";

/// `gocd_elastic_agent_profile`: how elastic agents of one kind are launched
/// inside a cluster profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticAgentProfileResource;

fn elastic_agent_profile(data: &ResourceData) -> ElasticAgentProfile {
    ElasticAgentProfile {
        id: data.get_string("profile_id"),
        cluster_profile_id: data.get_string("cluster_profile_id"),
        properties: expand_properties(data.get("properties")),
        etag: data.get_string("etag"),
    }
}

#[async_trait]
impl Resource for ElasticAgentProfileResource {
    fn name(&self) -> &'static str {
        "gocd_elastic_agent_profile"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the identifier of the elastic agent profile."),
            )
            .with_attribute(
                "cluster_profile_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the identifier of the cluster profile this elastic agent profile belongs to."),
            )
            .with_attribute(
                "etag",
                Attribute::etag("etag used to track the elastic agent profile configurations"),
            )
            .with_block("properties", properties_block(true, PROPERTIES_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile = elastic_agent_profile(data);
        client.create_elastic_agent_profile(&profile).await.map_err(|err| {
            err.context(format!(
                "creating elastic agent profile {} for cluster profile {} errored with",
                profile.id, profile.cluster_profile_id
            ))
        })?;

        data.set_id(profile.id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = key_or_id(data, "profile_id");
        let response = client
            .get_elastic_agent_profile(&profile_id)
            .await
            .map_err(|err| {
                err.context(format!("getting elastic agent profile {} errored with", profile_id))
            })?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_change("properties") {
            skip_update(self.name(), data);
            return Ok(());
        }

        let profile = elastic_agent_profile(data);
        client
            .update_elastic_agent_profile(&profile)
            .await
            .map_err(|err| {
                err.context(format!("updating elastic agent profile {} errored with", profile.id))
            })?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let profile_id = key_or_id(data, "profile_id");
        client
            .delete_elastic_agent_profile(&profile_id)
            .await
            .map_err(|err| {
                err.context(format!("deleting elastic agent profile {} errored with", profile_id))
            })?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.id().to_string();
        let response = client
            .get_elastic_agent_profile(&profile_id)
            .await
            .map_err(|err| {
                err.context(format!("getting elastic agent profile {} errored with", profile_id))
            })?;

        data.set("profile_id", &profile_id)?;
        data.set("cluster_profile_id", &response.cluster_profile_id)?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)
    }
}

/// `gocd_elastic_agent_profile` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ElasticAgentProfileDataSource;

#[async_trait]
impl DataSource for ElasticAgentProfileDataSource {
    fn name(&self) -> &'static str {
        "gocd_elastic_agent_profile"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_description("The identifier of the elastic agent profile."),
            )
            .with_attribute(
                "cluster_profile_id",
                Attribute::optional_computed_string()
                    .with_description("The identifier of the cluster profile to which current elastic agent profile belongs."),
            )
            .with_attribute(
                "etag",
                Attribute::optional_computed_string()
                    .with_description("Etag used to track the elastic agent profile"),
            )
            .with_block("properties", properties_data_block(PROPERTIES_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.get_string("profile_id");
        let response = client
            .get_elastic_agent_profile(&profile_id)
            .await
            .map_err(|err| {
                err.context(format!("getting elastic agent profile {} errored with", profile_id))
            })?;

        data.set("cluster_profile_id", &response.cluster_profile_id)?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)?;
        data.set_id(profile_id);
        Ok(())
    }
}
