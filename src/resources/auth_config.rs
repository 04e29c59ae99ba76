use async_trait::async_trait;

use super::fragments::{expand_properties, flatten_properties, properties_block, properties_data_block};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{AuthConfig, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

const PROPERTIES_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of this authorization configuration.";

/// `gocd_auth_config`: an authorization plugin profile.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthConfigResource;

fn auth_config(data: &ResourceData) -> AuthConfig {
    AuthConfig {
        id: data.get_string("profile_id"),
        plugin_id: data.get_string("plugin_id"),
        allow_only_known_users_to_login: data.get_bool("allow_only_known_users_to_login"),
        properties: expand_properties(data.get("properties")),
        etag: data.get_string("etag"),
    }
}

#[async_trait]
impl Resource for AuthConfigResource {
    fn name(&self) -> &'static str {
        "gocd_auth_config"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The identifier of the authorization configuration."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The plugin identifier of the authorization plugin."),
            )
            .with_attribute(
                "allow_only_known_users_to_login",
                Attribute::optional_bool().with_description(
                    "Allow only those users to login who have explicitly been added by an administrator.",
                ),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the authorization configuration"))
            .with_block("properties", properties_block(true, PROPERTIES_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let config = auth_config(data);
        client.create_auth_config(&config).await.map_err(|err| {
            err.context(format!(
                "creating authorization configuration {} for plugin {} errored with",
                config.id, config.plugin_id
            ))
        })?;

        data.set_id(config.id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = key_or_id(data, "profile_id");
        let response = client.get_auth_config(&profile_id).await.map_err(|err| {
            err.context(format!(
                "getting authorization configuration {} errored with",
                profile_id
            ))
        })?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_changes(&["properties", "allow_only_known_users_to_login"]) {
            skip_update(self.name(), data);
            return Ok(());
        }

        let config = auth_config(data);
        client.update_auth_config(&config).await.map_err(|err| {
            err.context(format!(
                "updating authorization configuration {} errored with",
                config.id
            ))
        })?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let profile_id = key_or_id(data, "profile_id");
        client.delete_auth_config(&profile_id).await.map_err(|err| {
            err.context(format!(
                "deleting authorization configuration {} errored with",
                profile_id
            ))
        })?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.id().to_string();
        let response = client.get_auth_config(&profile_id).await.map_err(|err| {
            err.context(format!(
                "getting authorization configuration {} errored with",
                profile_id
            ))
        })?;

        data.set("profile_id", &profile_id)?;
        data.set("plugin_id", &response.plugin_id)?;
        data.set(
            "allow_only_known_users_to_login",
            response.allow_only_known_users_to_login,
        )?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)
    }
}

/// `gocd_auth_config` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuthConfigDataSource;

#[async_trait]
impl DataSource for AuthConfigDataSource {
    fn name(&self) -> &'static str {
        "gocd_auth_config"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_description("The identifier of the authorization configuration."),
            )
            .with_attribute("plugin_id", Attribute::optional_computed_string())
            .with_attribute("allow_only_known_users_to_login", Attribute::computed_bool())
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("properties", properties_data_block(PROPERTIES_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.get_string("profile_id");
        let response = client.get_auth_config(&profile_id).await.map_err(|err| {
            err.context(format!(
                "getting authorization configuration {} errored with",
                profile_id
            ))
        })?;

        data.set("plugin_id", &response.plugin_id)?;
        data.set(
            "allow_only_known_users_to_login",
            response.allow_only_known_users_to_login,
        )?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)?;
        data.set_id(profile_id);
        Ok(())
    }
}
