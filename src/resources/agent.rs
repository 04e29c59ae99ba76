use async_trait::async_trait;

use super::{key_or_id, require_id, DataSource, Resource};
use crate::client::{AgentUpdate, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `gocd_agent`: the configuration of an agent that registered itself with
/// the server. Agents cannot be created through the API, so create applies
/// the configuration and delete only forgets the resource.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentResource;

#[async_trait]
impl Resource for AgentResource {
    fn name(&self) -> &'static str {
        "gocd_agent"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "uuid",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("UUID of the agent which needs to be managed."),
            )
            .with_attribute(
                "hostname",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Hostname of the agent."),
            )
            .with_attribute(
                "agent_config_state",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Whether an agent should be enabled. One of Enabled or Disabled."),
            )
            .with_attribute(
                "resources",
                Attribute::string_list(AttributeFlags::optional())
                    .with_force_new()
                    .with_description("The set of resources that the agent is tagged with."),
            )
            .with_attribute(
                "environments",
                Attribute::string_list(AttributeFlags::optional())
                    .with_force_new()
                    .with_description("The set of environment names that the agent belongs to."),
            )
            .with_attribute(
                "ip_address",
                Attribute::optional_computed_string().with_description("IP address of the agent."),
            )
            .with_attribute(
                "operating_system",
                Attribute::optional_computed_string().with_description("Operating system of the agent."),
            )
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let update = AgentUpdate {
            uuid: data.get_string("uuid"),
            hostname: data.get_string("hostname"),
            agent_config_state: data.get_string("agent_config_state"),
            resources: data.get_strings("resources"),
            environments: data.get_strings("environments"),
        };
        client
            .update_agent(&update)
            .await
            .map_err(|err| err.context(format!("updating agent '{}' errored with", update.uuid)))?;

        data.set_id(update.uuid);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let uuid = key_or_id(data, "uuid");
        let agent = client.get_agent(&uuid).await.map_err(|err| {
            err.context(format!("fetching information of agent '{}' errored with", uuid))
        })?;

        data.set("ip_address", &agent.ip_address)?;
        data.set("operating_system", &agent.operating_system)
    }

    async fn delete(&self, _client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        data.set_id("");
        Ok(())
    }
}

/// `gocd_agent` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentDataSource;

#[async_trait]
impl DataSource for AgentDataSource {
    fn name(&self) -> &'static str {
        "gocd_agent"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0().with_attribute(
            "uuid",
            Attribute::required_string().with_description("UUID of the agent."),
        );
        for name in [
            "hostname",
            "elastic_agent_id",
            "elastic_plugin_id",
            "ip_address",
            "sandbox",
            "operating_system",
            "agent_config_state",
            "agent_state",
            "agent_version",
            "build_state",
        ] {
            schema = schema.with_attribute(name, Attribute::computed_string());
        }
        schema
            .with_attribute(
                "free_space",
                Attribute::computed_float64().with_description("Free disk space on the agent in bytes."),
            )
            .with_attribute("resources", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute("environments", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute(
                "build_details",
                Attribute::new(AttributeType::map(AttributeType::String), AttributeFlags::computed())
                    .with_description("Details of the build the agent is running, if any."),
            )
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let uuid = data.get_string("uuid");
        let agent = client.get_agent(&uuid).await.map_err(|err| {
            err.context(format!("fetching information of agent '{}' errored with", uuid))
        })?;

        data.set("hostname", &agent.hostname)?;
        data.set("elastic_agent_id", &agent.elastic_agent_id)?;
        data.set("elastic_plugin_id", &agent.elastic_plugin_id)?;
        data.set("ip_address", &agent.ip_address)?;
        data.set("sandbox", &agent.sandbox)?;
        data.set("operating_system", &agent.operating_system)?;
        data.set("agent_config_state", &agent.agent_config_state)?;
        data.set("agent_state", &agent.agent_state)?;
        data.set("agent_version", &agent.agent_version)?;
        data.set("build_state", &agent.build_state)?;
        data.set("free_space", agent.free_space_bytes())?;
        data.set("resources", &agent.resources)?;
        data.set("environments", agent.environment_names())?;
        data.set("build_details", agent.build_detail_strings())?;
        data.set_id(uuid);
        Ok(())
    }
}
