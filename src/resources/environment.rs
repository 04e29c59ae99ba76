use async_trait::async_trait;

use super::fragments::{
    environment_variables_block, environment_variables_data_block, expand_environment_variables,
    flatten_environment_variables, pipeline_names, pipeline_refs,
};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{Environment, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, Schema};
use crate::utils::{random_id, string_list};

/// `gocd_environment`: a named group of pipelines and agents sharing
/// environment variables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentResource;

fn environment(data: &ResourceData) -> Environment {
    Environment {
        name: data.get_string("name"),
        pipelines: pipeline_refs(&data.get_strings("pipelines")),
        environment_variables: expand_environment_variables(data.get("environment_variables")),
        etag: data.get_string("etag"),
    }
}

fn set_environment(data: &mut ResourceData, environment: &Environment) -> Result<(), ProviderError> {
    data.set("pipelines", pipeline_names(&environment.pipelines))?;
    data.set(
        "environment_variables",
        flatten_environment_variables(&environment.environment_variables)?,
    )?;
    data.set("etag", &environment.etag)
}

#[async_trait]
impl Resource for EnvironmentResource {
    fn name(&self) -> &'static str {
        "gocd_environment"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The name of the environment."),
            )
            .with_attribute(
                "pipelines",
                Attribute::string_list(AttributeFlags::optional())
                    .with_description("List of pipeline names that should be added to this environment."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the environment"))
            .with_block("environment_variables", environment_variables_block())
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let environment = environment(data);
        client.create_environment(&environment).await.map_err(|err| {
            err.context(format!("creating environment {} errored with", environment.name))
        })?;

        data.set_id(environment.name);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = key_or_id(data, "name");
        let response = client
            .get_environment(&name)
            .await
            .map_err(|err| err.context(format!("getting environment {} errored with", name)))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let pipelines_changed = data.has_change("pipelines");
        let variables_changed = data.has_change("environment_variables");
        if !pipelines_changed && !variables_changed {
            skip_update(self.name(), data);
            return Ok(());
        }

        // The unchanged half is sent as it was stored.
        let (old_pipelines, new_pipelines) = data.get_change("pipelines");
        let (old_variables, new_variables) = data.get_change("environment_variables");
        let pipelines = if pipelines_changed { new_pipelines } else { old_pipelines };
        let variables = if variables_changed { new_variables } else { old_variables };

        let environment = Environment {
            name: key_or_id(data, "name"),
            pipelines: pipeline_refs(&string_list(&pipelines)),
            environment_variables: expand_environment_variables(&variables),
            etag: data.get_string("etag"),
        };
        client.update_environment(&environment).await.map_err(|err| {
            err.context(format!("updating environment {} errored with", environment.name))
        })?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let name = key_or_id(data, "name");
        client
            .delete_environment(&name)
            .await
            .map_err(|err| err.context(format!("deleting environment {} errored with", name)))?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.id().to_string();
        let response = client
            .get_environment(&name)
            .await
            .map_err(|err| err.context(format!("getting environment {} errored with", name)))?;

        data.set("name", &name)?;
        set_environment(data, &response)
    }
}

/// `gocd_environment` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvironmentDataSource;

#[async_trait]
impl DataSource for EnvironmentDataSource {
    fn name(&self) -> &'static str {
        "gocd_environment"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the environment."),
            )
            .with_attribute("pipelines", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("environment_variables", environment_variables_data_block())
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.get_string("name");
        let response = client
            .get_environment(&name)
            .await
            .map_err(|err| err.context(format!("getting environment {} errored with", name)))?;

        set_environment(data, &response)?;
        data.set_id(random_id());
        Ok(())
    }
}
