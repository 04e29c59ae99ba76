use async_trait::async_trait;

use super::fragments::{
    expand_properties, expand_rules, flatten_properties, flatten_rules, properties_block,
    properties_data_block, rules_attribute,
};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{GocdClient, PluginConfiguration, SecretConfig};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, Schema};

const PROPERTIES_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of this secret config.";
const RULES_DESCRIPTION: &str =
    "The list of rules, which allows restricting the usage of the secret config. Referring to the secret config from other parts of configuration is denied by default, an explicit rule should be added to allow a specific resource to refer the secret config.";

/// `gocd_secret_config`: a secret plugin profile with its usage rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretConfigResource;

fn secret_config(data: &ResourceData) -> SecretConfig {
    SecretConfig {
        id: data.get_string("profile_id"),
        plugin_id: data.get_string("plugin_id"),
        description: data.get_string("description"),
        properties: expand_properties(data.get("properties")),
        rules: expand_rules(data.get("rules")),
        etag: data.get_string("etag"),
    }
}

/// Properties keyed for comparison, since set blocks carry no order.
fn sorted(mut properties: Vec<PluginConfiguration>) -> Vec<PluginConfiguration> {
    properties.sort_by(|a, b| a.key.cmp(&b.key));
    properties
}

/// Whether the sendable parts of the config differ from the prior state.
fn config_changed(data: &ResourceData) -> bool {
    let (old_properties, new_properties) = data.get_change("properties");
    let (old_rules, new_rules) = data.get_change("rules");

    sorted(expand_properties(&old_properties)) != sorted(expand_properties(&new_properties))
        || expand_rules(&old_rules) != expand_rules(&new_rules)
        || data.has_change("description")
}

#[async_trait]
impl Resource for SecretConfigResource {
    fn name(&self) -> &'static str {
        "gocd_secret_config"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The identifier of the secret config."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The plugin identifier of the secret plugin."),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("The description for this secret config."),
            )
            .with_attribute("rules", rules_attribute(AttributeFlags::optional(), RULES_DESCRIPTION))
            .with_attribute("etag", Attribute::etag("etag used to track the secret config"))
            .with_block("properties", properties_block(true, PROPERTIES_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let config = secret_config(data);
        client.create_secret_config(&config).await.map_err(|err| {
            err.context(format!("creating secret config {} errored with", config.id))
        })?;

        data.set_id(config.id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = key_or_id(data, "profile_id");
        let response = client
            .get_secret_config(&profile_id)
            .await
            .map_err(|err| err.context(format!("getting secret config {} errored with", profile_id)))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_changes(&["properties", "rules", "description"]) || !config_changed(data) {
            skip_update(self.name(), data);
            return Ok(());
        }

        let config = secret_config(data);
        client.update_secret_config(&config).await.map_err(|err| {
            err.context(format!("updating secret config {} errored with", config.id))
        })?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let profile_id = key_or_id(data, "profile_id");
        client
            .delete_secret_config(&profile_id)
            .await
            .map_err(|err| err.context("deleting secret config errored with"))?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.id().to_string();
        let response = client
            .get_secret_config(&profile_id)
            .await
            .map_err(|err| err.context(format!("getting secret config {} errored with", profile_id)))?;

        data.set("profile_id", &profile_id)?;
        set_secret_config(data, &response)
    }
}

fn set_secret_config(data: &mut ResourceData, config: &SecretConfig) -> Result<(), ProviderError> {
    data.set("plugin_id", &config.plugin_id)?;
    data.set("description", &config.description)?;
    data.set("etag", &config.etag)?;
    data.set("properties", flatten_properties(&config.properties)?)?;
    data.set("rules", flatten_rules(&config.rules)?)
}

/// `gocd_secret_config` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct SecretConfigDataSource;

#[async_trait]
impl DataSource for SecretConfigDataSource {
    fn name(&self) -> &'static str {
        "gocd_secret_config"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string().with_description("The identifier of the secret config."),
            )
            .with_attribute("plugin_id", Attribute::optional_computed_string())
            .with_attribute("description", Attribute::optional_computed_string())
            .with_attribute("rules", rules_attribute(AttributeFlags::computed(), RULES_DESCRIPTION))
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("properties", properties_data_block(PROPERTIES_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.get_string("profile_id");
        let response = client
            .get_secret_config(&profile_id)
            .await
            .map_err(|err| err.context(format!("getting secret config {} errored with", profile_id)))?;

        set_secret_config(data, &response)?;
        data.set_id(profile_id);
        Ok(())
    }
}
