use async_trait::async_trait;

use super::fragments::{expand_properties, flatten_properties, properties_block, properties_data_block};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{ClusterProfile, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

const PROPERTIES_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of this profile.";

/// `gocd_cluster_profile`: connection settings for an elastic agent cluster.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterProfileResource;

fn cluster_profile(data: &ResourceData) -> ClusterProfile {
    ClusterProfile {
        id: data.get_string("profile_id"),
        plugin_id: data.get_string("plugin_id"),
        properties: expand_properties(data.get("properties")),
        etag: data.get_string("etag"),
    }
}

#[async_trait]
impl Resource for ClusterProfileResource {
    fn name(&self) -> &'static str {
        "gocd_cluster_profile"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the identifier of the cluster profile."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("the plugin identifier of the cluster profile."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the cluster profile"))
            .with_block("properties", properties_block(true, PROPERTIES_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile = cluster_profile(data);
        client.create_cluster_profile(&profile).await.map_err(|err| {
            err.context(format!(
                "creating cluster profile {} setting for plugin {} errored with",
                profile.id, profile.plugin_id
            ))
        })?;

        data.set_id(profile.id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = key_or_id(data, "profile_id");
        let response = client.get_cluster_profile(&profile_id).await.map_err(|err| {
            err.context(format!(
                "getting cluster profile configuration {} errored with",
                profile_id
            ))
        })?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_change("properties") {
            skip_update(self.name(), data);
            return Ok(());
        }

        let profile = cluster_profile(data);
        client.update_cluster_profile(&profile).await.map_err(|err| {
            err.context(format!("updating cluster profile {} errored with", profile.id))
        })?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let profile_id = key_or_id(data, "profile_id");
        client.delete_cluster_profile(&profile_id).await.map_err(|err| {
            err.context(format!("deleting cluster profile {} errored with", profile_id))
        })?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.id().to_string();
        let response = client.get_cluster_profile(&profile_id).await.map_err(|err| {
            err.context(format!(
                "getting cluster profile configuration {} errored with",
                profile_id
            ))
        })?;

        data.set("profile_id", &profile_id)?;
        data.set("plugin_id", &response.plugin_id)?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)
    }
}

/// `gocd_cluster_profile` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClusterProfileDataSource;

#[async_trait]
impl DataSource for ClusterProfileDataSource {
    fn name(&self) -> &'static str {
        "gocd_cluster_profile"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string().with_description("The identifier of the cluster profile."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::optional_computed_string()
                    .with_description("The plugin identifier of the cluster profile."),
            )
            .with_attribute(
                "etag",
                Attribute::optional_computed_string().with_description("Etag used to track the cluster profile"),
            )
            .with_block("properties", properties_data_block(PROPERTIES_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.get_string("profile_id");
        let response = client.get_cluster_profile(&profile_id).await.map_err(|err| {
            err.context(format!("getting cluster profile {} errored with", profile_id))
        })?;

        data.set("plugin_id", &response.plugin_id)?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)?;
        data.set_id(profile_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support;
    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const PROFILE_PATH: &str = "/go/api/admin/elastic/cluster_profiles/k8s";

    fn profile_body() -> serde_json::Value {
        json!({
            "id": "k8s",
            "plugin_id": "cd.go.contrib.elasticagent.kubernetes",
            "properties": [{"key": "go_server_url", "value": "https://gocd/go"}],
        })
    }

    fn planned() -> serde_json::Value {
        json!({
            "profile_id": "k8s",
            "plugin_id": "cd.go.contrib.elasticagent.kubernetes",
            "properties": [{"key": "go_server_url", "value": "https://gocd/go"}],
        })
    }

    #[tokio::test]
    async fn test_create_then_reads_etag() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/go/api/admin/elastic/cluster_profiles"))
            .and(header("Accept", "application/vnd.go.cd.v1+json"))
            .and(body_json(profile_body()))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"etag-1\"")
                    .set_body_json(profile_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::new_resource(planned()).unwrap();
        ClusterProfileResource.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), "k8s");
        assert_eq!(data.get_string("etag"), "\"etag-1\"");
    }

    #[tokio::test]
    async fn test_update_without_changes_makes_no_call() {
        let server = MockServer::start().await;
        let client = test_support::client(&server);

        let mut state = planned();
        state["etag"] = json!("\"etag-1\"");
        let mut data = ResourceData::for_update(state.clone(), state).unwrap();
        ClusterProfileResource.update(&client, &mut data).await.unwrap();

        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_sends_etag() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(PROFILE_PATH))
            .and(header("If-Match", "\"etag-1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(profile_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"etag-2\"")
                    .set_body_json(profile_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut prior = planned();
        prior["id"] = json!("k8s");
        prior["etag"] = json!("\"etag-1\"");
        let mut next = prior.clone();
        next["properties"] = json!([{"key": "go_server_url", "value": "https://gocd.internal/go"}]);

        let mut data = ResourceData::for_update(prior, next).unwrap();
        ClusterProfileResource.update(&client, &mut data).await.unwrap();
        assert_eq!(data.get_string("etag"), "\"etag-2\"");
    }

    #[tokio::test]
    async fn test_import_populates_attributes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"etag-1\"")
                    .set_body_json(profile_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::for_import("k8s");
        ClusterProfileResource.import(&client, &mut data).await.unwrap();

        assert_eq!(data.get_string("profile_id"), "k8s");
        assert_eq!(data.get_string("plugin_id"), "cd.go.contrib.elasticagent.kubernetes");
        assert_eq!(data.get_list("properties")[0]["key"], "go_server_url");
    }

    #[tokio::test]
    async fn test_delete() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(PROFILE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut state = planned();
        state["id"] = json!("k8s");
        let mut data = ResourceData::from_state(state).unwrap();
        ClusterProfileResource.delete(&client, &mut data).await.unwrap();
        assert_eq!(data.id(), "");
    }

    #[tokio::test]
    async fn test_data_source_read() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"etag-1\"")
                    .set_body_json(profile_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::from_config(json!({"profile_id": "k8s"})).unwrap();
        ClusterProfileDataSource.read(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), "k8s");
        assert_eq!(data.get_string("etag"), "\"etag-1\"");
        assert_eq!(data.get_list("properties").len(), 1);
    }

    #[tokio::test]
    async fn test_read_missing_profile_is_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(PROFILE_PATH))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"message": "Either the resource you requested was not found"})),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::from_state(json!({"id": "k8s", "profile_id": "k8s"})).unwrap();
        let err = ClusterProfileResource.read(&client, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert!(err.message().starts_with("getting cluster profile configuration k8s errored with"));
    }
}
