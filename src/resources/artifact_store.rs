use async_trait::async_trait;

use super::fragments::{expand_properties, flatten_properties, properties_block, properties_data_block};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{ArtifactStore, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

const PROPERTIES_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of this artifact store.";

/// `gocd_artifact_store`: an external store artifact plugins publish to.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStoreResource;

fn artifact_store(data: &ResourceData) -> ArtifactStore {
    ArtifactStore {
        id: data.get_string("store_id"),
        plugin_id: data.get_string("plugin_id"),
        properties: expand_properties(data.get("properties")),
        etag: data.get_string("etag"),
    }
}

#[async_trait]
impl Resource for ArtifactStoreResource {
    fn name(&self) -> &'static str {
        "gocd_artifact_store"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "store_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The identifier of the artifact store."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The plugin identifier of the artifact plugin."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the artifact store"))
            .with_block("properties", properties_block(true, PROPERTIES_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let store = artifact_store(data);
        client.create_artifact_store(&store).await.map_err(|err| {
            err.context(format!(
                "creating artifact store {} for plugin {} errored with",
                store.id, store.plugin_id
            ))
        })?;

        data.set_id(store.id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let store_id = key_or_id(data, "store_id");
        let response = client
            .get_artifact_store(&store_id)
            .await
            .map_err(|err| err.context(format!("getting artifact store {} errored with", store_id)))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_change("properties") {
            skip_update(self.name(), data);
            return Ok(());
        }

        let store = artifact_store(data);
        client
            .update_artifact_store(&store)
            .await
            .map_err(|err| err.context(format!("updating artifact store {} errored with", store.id)))?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let store_id = key_or_id(data, "store_id");
        client
            .delete_artifact_store(&store_id)
            .await
            .map_err(|err| err.context(format!("deleting artifact store {} errored with", store_id)))?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let store_id = data.id().to_string();
        let response = client
            .get_artifact_store(&store_id)
            .await
            .map_err(|err| err.context(format!("getting artifact store {} errored with", store_id)))?;

        data.set("store_id", &store_id)?;
        data.set("plugin_id", &response.plugin_id)?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)
    }
}

/// `gocd_artifact_store` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArtifactStoreDataSource;

#[async_trait]
impl DataSource for ArtifactStoreDataSource {
    fn name(&self) -> &'static str {
        "gocd_artifact_store"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "store_id",
                Attribute::required_string().with_description("The identifier of the artifact store."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::optional_computed_string()
                    .with_description("The plugin identifier of the artifact plugin."),
            )
            .with_attribute(
                "etag",
                Attribute::optional_computed_string().with_description("Etag used to track the artifact store"),
            )
            .with_block("properties", properties_data_block(PROPERTIES_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let store_id = data.get_string("store_id");
        let response = client
            .get_artifact_store(&store_id)
            .await
            .map_err(|err| err.context(format!("getting artifact store {} errored with", store_id)))?;

        data.set("plugin_id", &response.plugin_id)?;
        data.set("etag", &response.etag)?;
        data.set("properties", flatten_properties(&response.properties)?)?;
        data.set_id(store_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_body() -> serde_json::Value {
        json!({
            "id": "docker",
            "plugin_id": "cd.go.artifact.docker.registry",
            "properties": [
                {"key": "RegistryURL", "value": "https://index.docker.io/v1/"},
                {"key": "Password", "encrypted_value": "AES:abc", "is_secure": true},
            ],
        })
    }

    #[tokio::test]
    async fn test_update_puts_full_store() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/go/api/admin/artifact_stores/docker"))
            .and(header("If-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(store_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/go/api/admin/artifact_stores/docker"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v2\"")
                    .set_body_json(store_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let prior = json!({
            "id": "docker",
            "store_id": "docker",
            "plugin_id": "cd.go.artifact.docker.registry",
            "properties": [{"key": "RegistryURL", "value": "https://index.docker.io/v1/"}],
            "etag": "\"v1\"",
        });
        let mut planned = prior.clone();
        planned["properties"] = store_body()["properties"].clone();

        let mut data = ResourceData::for_update(prior, planned).unwrap();
        ArtifactStoreResource.update(&client, &mut data).await.unwrap();
        assert_eq!(data.get_string("etag"), "\"v2\"");
    }

    #[tokio::test]
    async fn test_import_keeps_secure_properties() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/go/api/admin/artifact_stores/docker"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(store_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::for_import("docker");
        ArtifactStoreResource.import(&client, &mut data).await.unwrap();

        let properties = data.get_list("properties");
        assert_eq!(properties[1]["encrypted_value"], "AES:abc");
        assert_eq!(properties[1]["is_secure"], true);
        assert!(properties[1].get("value").is_none());
    }

    #[tokio::test]
    async fn test_delete_requires_id() {
        let server = MockServer::start().await;
        let client = test_support::client(&server);
        let mut data = ResourceData::from_state(json!({"store_id": "docker"})).unwrap();

        let err = ArtifactStoreResource.delete(&client, &mut data).await.unwrap_err();
        assert_eq!(err.message(), "resource with the ID '' not found");
    }
}
