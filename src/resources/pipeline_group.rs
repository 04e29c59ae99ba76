use async_trait::async_trait;

use super::fragments::{
    authorization_block, expand_authorization, flatten_authorization, flatten_authorization_data,
    pipeline_names, pipeline_refs,
};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{GocdClient, PipelineGroup};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, Schema};

/// `gocd_pipeline_group`: a named group of pipelines with its permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineGroupResource;

fn pipeline_group(data: &ResourceData) -> PipelineGroup {
    PipelineGroup {
        name: data.get_string("name"),
        pipelines: pipeline_refs(&data.get_strings("pipelines")),
        authorization: expand_authorization(data.get("authorization")),
        etag: data.get_string("etag"),
    }
}

#[async_trait]
impl Resource for PipelineGroupResource {
    fn name(&self) -> &'static str {
        "gocd_pipeline_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Name of the pipeline group to be created or updated."),
            )
            .with_attribute(
                "pipelines",
                Attribute::string_list(AttributeFlags::optional_computed())
                    .with_description("List of pipelines belonging to this group."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the pipeline group"))
            .with_block("authorization", authorization_block(false))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        // Pipelines join a group when they are created, never through the group.
        let group = PipelineGroup {
            name: data.get_string("name"),
            authorization: expand_authorization(data.get("authorization")),
            ..Default::default()
        };
        client.create_pipeline_group(&group).await.map_err(|err| {
            err.context(format!("creating pipeline group '{}' errored with", group.name))
        })?;

        data.set_id(group.name);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = key_or_id(data, "name");
        let response = client
            .get_pipeline_group(&name)
            .await
            .map_err(|err| err.context(format!("getting pipeline group '{}' errored with", name)))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_changes(&["authorization", "pipelines"]) {
            skip_update(self.name(), data);
            return Ok(());
        }

        let group = pipeline_group(data);
        client.update_pipeline_group(&group).await.map_err(|err| {
            err.context(format!("updating pipeline group '{}' errored with", group.name))
        })?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let name = key_or_id(data, "name");
        client
            .delete_pipeline_group(&name)
            .await
            .map_err(|err| err.context("deleting pipeline group errored with"))?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.id().to_string();
        let response = client
            .get_pipeline_group(&name)
            .await
            .map_err(|err| err.context(format!("getting pipeline group '{}' errored with", name)))?;

        data.set("name", &name)?;
        data.set("pipelines", pipeline_names(&response.pipelines))?;
        data.set("authorization", flatten_authorization(&response.authorization))?;
        data.set("etag", &response.etag)
    }
}

/// `gocd_pipeline_group` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineGroupDataSource;

#[async_trait]
impl DataSource for PipelineGroupDataSource {
    fn name(&self) -> &'static str {
        "gocd_pipeline_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "group_id",
                Attribute::required_string().with_description("Name of the pipeline group."),
            )
            .with_attribute("pipelines", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("authorization", authorization_block(true))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.get_string("group_id");
        let response = client
            .get_pipeline_group(&name)
            .await
            .map_err(|err| err.context(format!("getting pipeline group '{}' errored with", name)))?;

        data.set("pipelines", pipeline_names(&response.pipelines))?;
        data.set("authorization", flatten_authorization_data(&response.authorization))?;
        data.set("etag", &response.etag)?;
        data.set_id(name);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const GROUP_PATH: &str = "/go/api/admin/pipeline_groups/release";

    fn group_body() -> serde_json::Value {
        json!({
            "name": "release",
            "pipelines": [{"name": "deploy"}],
            "authorization": {
                "view": {"users": ["alice"], "roles": []},
                "admins": {"users": [], "roles": ["release-managers"]},
            },
        })
    }

    #[tokio::test]
    async fn test_create_sends_no_pipelines() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/go/api/admin/pipeline_groups"))
            .and(body_json(json!({
                "name": "release",
                "pipelines": [],
                "authorization": {"view": {"users": ["alice"], "roles": []}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(group_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(GROUP_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(group_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::new_resource(json!({
            "name": "release",
            "pipelines": ["ignored"],
            "authorization": [{"view": [{"users": ["alice"]}]}],
        }))
        .unwrap();
        PipelineGroupResource.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), "release");
        assert_eq!(data.get_string("etag"), "\"v1\"");
    }

    #[tokio::test]
    async fn test_import_omits_empty_permissions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GROUP_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(group_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::for_import("release");
        PipelineGroupResource.import(&client, &mut data).await.unwrap();

        let authorization = data.get_object("authorization").unwrap();
        assert!(authorization.get("operate").is_none());
        assert_eq!(authorization["admins"]["roles"], json!(["release-managers"]));
        assert_eq!(data.get_strings("pipelines"), vec!["deploy"]);
    }

    #[tokio::test]
    async fn test_data_source_lists_every_permission() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(GROUP_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(group_body()))
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::from_config(json!({"group_id": "release"})).unwrap();
        PipelineGroupDataSource.read(&client, &mut data).await.unwrap();

        let authorization = data.get_object("authorization").unwrap();
        assert_eq!(authorization["operate"], json!({"users": [], "roles": []}));
        assert_eq!(data.id(), "release");
    }
}
