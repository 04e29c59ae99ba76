use async_trait::async_trait;
use serde_json::json;

use super::DataSource;
use crate::client::GocdClient;
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// `gocd_plugin_info`: what GoCD knows about an installed plugin.
#[derive(Debug, Clone, Copy, Default)]
pub struct PluginInfoDataSource;

#[async_trait]
impl DataSource for PluginInfoDataSource {
    fn name(&self) -> &'static str {
        "gocd_plugin_info"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "plugin_id",
                Attribute::required_string().with_description("The ID of the plugin."),
            )
            .with_attribute(
                "plugin_file_location",
                Attribute::computed_string().with_description("The location where the plugin is installed."),
            )
            .with_attribute(
                "bundled_plugin",
                Attribute::computed_bool().with_description("Whether the plugin ships with GoCD."),
            )
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block(
                "status",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("status", Attribute::computed_string())
                        .with_description("The load status of the plugin."),
                )
                .computed(),
            )
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let plugin_id = data.get_string("plugin_id");
        let response = client.get_plugin_info(&plugin_id).await.map_err(|err| {
            err.context(format!("getting plugin information {} errored with", plugin_id))
        })?;

        data.set("plugin_file_location", &response.plugin_file_location)?;
        data.set("bundled_plugin", response.bundled_plugin)?;
        data.set("status", json!([{ "status": response.status.state }]))?;
        data.set("etag", &response.etag)?;
        data.set_id(plugin_id);
        Ok(())
    }
}
