use async_trait::async_trait;

use super::fragments::{expand_properties, flatten_properties, properties_block, properties_data_block};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{GocdClient, PluginSettings};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

const CONFIGURATIONS_DESCRIPTION: &str = "List of configuration required to configure the plugin settings.";

/// `gocd_plugin_setting`: the global settings of an installed plugin.
///
/// GoCD has no way to remove plugin settings, so deleting the resource
/// resets them to an empty configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginSettingResource;

fn plugin_settings(data: &ResourceData) -> PluginSettings {
    PluginSettings {
        plugin_id: data.get_string("plugin_id"),
        configuration: expand_properties(data.get("plugin_configurations")),
        etag: data.get_string("etag"),
    }
}

#[async_trait]
impl Resource for PluginSettingResource {
    fn name(&self) -> &'static str {
        "gocd_plugin_setting"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The ID of the plugin to which the settings are applied."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the plugin settings"))
            .with_block("plugin_configurations", properties_block(true, CONFIGURATIONS_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let settings = plugin_settings(data);
        client
            .create_plugin_settings(&settings)
            .await
            .map_err(|err| err.context("applying plugin setting errored with"))?;

        data.set_id(settings.plugin_id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let plugin_id = key_or_id(data, "plugin_id");
        let response = client
            .get_plugin_settings(&plugin_id)
            .await
            .map_err(|err| err.context("getting plugin configuration errored with"))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_change("plugin_configurations") {
            skip_update(self.name(), data);
            return Ok(());
        }

        let settings = plugin_settings(data);
        client
            .update_plugin_settings(&settings)
            .await
            .map_err(|err| err.context("updating plugin configuration errored with"))?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let settings = PluginSettings {
            plugin_id: key_or_id(data, "plugin_id"),
            configuration: Vec::new(),
            etag: data.get_string("etag"),
        };
        client
            .update_plugin_settings(&settings)
            .await
            .map_err(|err| err.context("resetting plugin configuration errored with"))?;

        data.set_id("");
        Ok(())
    }
}

/// `gocd_plugin_setting` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginSettingDataSource;

#[async_trait]
impl DataSource for PluginSettingDataSource {
    fn name(&self) -> &'static str {
        "gocd_plugin_setting"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "plugin_id",
                Attribute::required_string().with_description("The ID of the plugin."),
            )
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("configuration", properties_data_block(CONFIGURATIONS_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let plugin_id = data.get_string("plugin_id");
        let response = client
            .get_plugin_settings(&plugin_id)
            .await
            .map_err(|err| err.context("getting plugin configuration errored with"))?;

        data.set("etag", &response.etag)?;
        data.set("configuration", flatten_properties(&response.configuration)?)?;
        data.set_id(plugin_id);
        Ok(())
    }
}
