use async_trait::async_trait;
use serde_json::{Map, Value};

use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{GocdClient, PipelineConfig};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `gocd_pipeline`: a pipeline defined by its full JSON or YAML config.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineResource;

/// Parse a pipeline definition, JSON first and YAML second.
///
/// Returns the config as a JSON object and whether it was written as YAML.
pub(crate) fn parse_pipeline_config(raw: &str) -> Result<(Map<String, Value>, bool), ProviderError> {
    if let Ok(Value::Object(config)) = serde_json::from_str::<Value>(raw) {
        return Ok((config, false));
    }

    match serde_yaml::from_str::<serde_yaml::Value>(raw) {
        Ok(yaml @ serde_yaml::Value::Mapping(_)) => {
            match serde_json::to_value(yaml)
                .map_err(|err| ProviderError::from(err).context("decoding pipeline config errored with"))?
            {
                Value::Object(config) => Ok((config, true)),
                _ => Err(ProviderError::Validation("pipeline config type is unknown".to_string())),
            }
        }
        _ => Err(ProviderError::Validation("pipeline config type is unknown".to_string())),
    }
}

fn check_name(name: &str, config: &Map<String, Value>) -> Result<(), ProviderError> {
    let config_name = config.get("name").and_then(Value::as_str).unwrap_or_default();
    if config_name != name {
        return Err(ProviderError::Validation(format!(
            "pipeline name passed under attribute and pipeline config are not same, make sure to pass the same values, current values: 'attribute:{} config:{}'",
            name, config_name
        )));
    }
    Ok(())
}

#[async_trait]
impl Resource for PipelineResource {
    fn name(&self) -> &'static str {
        "gocd_pipeline"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the pipeline to be created or updated."),
            )
            .with_attribute(
                "group",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the pipeline group the pipeline belongs to."),
            )
            .with_attribute(
                "config",
                Attribute::required_string()
                    .with_description("The pipeline config, as JSON or YAML, that GoCD understands."),
            )
            .with_attribute(
                "pause_on_creation",
                Attribute::optional_bool()
                    .with_force_new()
                    .with_description("Pause the pipeline once it is created."),
            )
            .with_attribute(
                "pause_reason",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("Reason recorded when pausing the pipeline on creation."),
            )
            .with_attribute(
                "yaml",
                Attribute::new(AttributeType::Bool, AttributeFlags::optional_computed())
                    .with_force_new()
                    .with_description("Whether the config was passed as YAML."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the pipeline config"))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.get_string("name");
        let (config, yaml) = parse_pipeline_config(&data.get_string("config"))?;
        check_name(&name, &config)?;

        let pipeline = PipelineConfig {
            name: name.clone(),
            group: data.get_string("group"),
            config,
            pause_on_creation: data.get_bool("pause_on_creation"),
            pause_reason: data.get_string("pause_reason"),
            etag: String::new(),
        };
        client.create_pipeline(&pipeline).await.map_err(|err| {
            err.context(format!("creating pipeline '{}' errored with", name))
        })?;

        data.set("yaml", yaml)?;
        data.set_id(name);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = key_or_id(data, "name");
        let response = client
            .get_pipeline_config(&name)
            .await
            .map_err(|err| err.context(format!("getting pipeline config {} errored with", name)))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_change("config") {
            skip_update(self.name(), data);
            return Ok(());
        }

        let name = key_or_id(data, "name");
        let group = data.get_string("group");
        let (mut config, yaml) = parse_pipeline_config(&data.get_string("config"))?;
        check_name(&name, &config)?;
        config.insert("group".to_string(), Value::String(group.clone()));

        let pipeline = PipelineConfig {
            name: name.clone(),
            group,
            config,
            etag: data.get_string("etag"),
            ..Default::default()
        };
        client.update_pipeline_config(&pipeline).await.map_err(|err| {
            err.context(format!("updating pipeline '{}' errored with", name))
        })?;

        data.set("yaml", yaml)?;
        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let name = key_or_id(data, "name");
        client
            .delete_pipeline(&name)
            .await
            .map_err(|err| err.context(format!("deleting pipeline {} errored with", name)))?;

        data.set_id("");
        Ok(())
    }
}

/// `gocd_pipeline` data source. Renders the stored config as JSON, or as
/// YAML when `yaml` is set.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineDataSource;

#[async_trait]
impl DataSource for PipelineDataSource {
    fn name(&self) -> &'static str {
        "gocd_pipeline"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Name of the pipeline."),
            )
            .with_attribute(
                "yaml",
                Attribute::optional_bool().with_description("Render the config as YAML instead of JSON."),
            )
            .with_attribute("config", Attribute::computed_string())
            .with_attribute("etag", Attribute::optional_computed_string())
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.get_string("name");
        let response = client.get_pipeline_config(&name).await.map_err(|err| {
            err.context(format!("getting pipeline configuration {} errored with", name))
        })?;

        let config = Value::Object(response.config);
        let rendered = if data.get_bool("yaml") {
            serde_yaml::to_string(&config)?
        } else {
            serde_json::to_string(&config)?
        };

        data.set("config", rendered)?;
        data.set("etag", &response.etag)?;
        data.set_id(name);
        Ok(())
    }
}
