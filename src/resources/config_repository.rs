use async_trait::async_trait;

use super::fragments::{
    expand_material, expand_properties, expand_rules, flatten_material, flatten_material_data,
    flatten_properties, flatten_rules, material_block, material_data_block, properties_block,
    properties_data_block, rules_attribute,
};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{ConfigRepo, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, Schema};

const CONFIGURATION_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of config repositories.";
const RULES_DESCRIPTION: &str =
    "The list of rules, which allows restricting the entities that the config repo can refer to.";

/// `gocd_config_repository`: a repository GoCD polls for pipeline definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigRepositoryResource;

fn config_repo(data: &ResourceData) -> ConfigRepo {
    ConfigRepo {
        id: data.get_string("profile_id"),
        plugin_id: data.get_string("plugin_id"),
        material: expand_material(data.get("material")),
        configuration: expand_properties(data.get("configuration")),
        rules: expand_rules(data.get("rules")),
        etag: data.get_string("etag"),
    }
}

fn set_config_repo(data: &mut ResourceData, repo: &ConfigRepo, for_data_source: bool) -> Result<(), ProviderError> {
    let material = if for_data_source {
        flatten_material_data(&repo.material)
    } else {
        flatten_material(&repo.material)
    };
    data.set("plugin_id", &repo.plugin_id)?;
    data.set("material", material)?;
    data.set("configuration", flatten_properties(&repo.configuration)?)?;
    data.set("rules", flatten_rules(&repo.rules)?)?;
    data.set("etag", &repo.etag)
}

#[async_trait]
impl Resource for ConfigRepositoryResource {
    fn name(&self) -> &'static str {
        "gocd_config_repository"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The identifier of the config repository."),
            )
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The name of the config repo plugin."),
            )
            .with_attribute("rules", rules_attribute(AttributeFlags::optional(), RULES_DESCRIPTION))
            .with_attribute("etag", Attribute::etag("etag used to track the config repository"))
            .with_block("material", material_block())
            .with_block("configuration", properties_block(false, CONFIGURATION_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let repo = config_repo(data);
        client
            .create_config_repo(&repo)
            .await
            .map_err(|err| err.context(format!("creating config repo {} errored with", repo.id)))?;

        data.set_id(repo.id);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = key_or_id(data, "profile_id");
        let response = client
            .get_config_repo(&profile_id)
            .await
            .map_err(|err| err.context(format!("getting config repo {} errored with", profile_id)))?;

        set_config_repo(data, &response, false)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_changes(&["material", "rules", "configuration"]) {
            skip_update(self.name(), data);
            return Ok(());
        }

        let repo = config_repo(data);
        client
            .update_config_repo(&repo)
            .await
            .map_err(|err| err.context(format!("updating config repo {} errored with", repo.id)))?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let profile_id = key_or_id(data, "profile_id");
        client
            .delete_config_repo(&profile_id)
            .await
            .map_err(|err| err.context("deleting config repo errored with"))?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.id().to_string();
        let response = client
            .get_config_repo(&profile_id)
            .await
            .map_err(|err| err.context(format!("getting config repo {} errored with", profile_id)))?;

        data.set("profile_id", &profile_id)?;
        set_config_repo(data, &response, false)
    }
}

/// `gocd_config_repository` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConfigRepositoryDataSource;

#[async_trait]
impl DataSource for ConfigRepositoryDataSource {
    fn name(&self) -> &'static str {
        "gocd_config_repository"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "profile_id",
                Attribute::required_string().with_description("The identifier of the config repository."),
            )
            .with_attribute("plugin_id", Attribute::optional_computed_string())
            .with_attribute("rules", rules_attribute(AttributeFlags::computed(), RULES_DESCRIPTION))
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("material", material_data_block())
            .with_block("configuration", properties_data_block(CONFIGURATION_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let profile_id = data.get_string("profile_id");
        let response = client
            .get_config_repo(&profile_id)
            .await
            .map_err(|err| err.context(format!("getting config repo {} errored with", profile_id)))?;

        set_config_repo(data, &response, true)?;
        data.set_id(profile_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::test_support;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const REPO_PATH: &str = "/go/api/admin/config_repos/sample";

    fn repo_body() -> serde_json::Value {
        json!({
            "id": "sample",
            "plugin_id": "json.config.plugin",
            "material": {
                "type": "git",
                "attributes": {
                    "url": "https://github.com/config-repo/gocd-json-config-example.git",
                    "branch": "master",
                    "auto_update": true,
                },
            },
            "configuration": [{"key": "pipeline_pattern", "value": "*.gopipeline.json"}],
            "rules": [{"directive": "allow", "action": "refer", "type": "pipeline_group", "resource": "*"}],
        })
    }

    #[tokio::test]
    async fn test_create_reads_back_material() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/go/api/admin/config_repos"))
            .and(header("Accept", "application/vnd.go.cd.v4+json"))
            .and(body_partial_json(json!({
                "id": "sample",
                "material": {"type": "git", "attributes": {"branch": "master", "auto_update": true}},
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(REPO_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(repo_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::new_resource(json!({
            "profile_id": "sample",
            "plugin_id": "json.config.plugin",
            "material": [{
                "type": "git",
                "attributes": [{
                    "url": "https://github.com/config-repo/gocd-json-config-example.git",
                    "branch": "master",
                    "auto_update": true,
                }],
            }],
            "configuration": [{"key": "pipeline_pattern", "value": "*.gopipeline.json"}],
        }))
        .unwrap();
        ConfigRepositoryResource.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), "sample");
        assert_eq!(data.get_string("etag"), "\"v1\"");
        let material = data.get_block("material").unwrap();
        assert_eq!(material["attributes"]["branch"], "master");
        assert_eq!(material["attributes"]["check_externals"], false);
        assert_eq!(data.get_list("rules").len(), 1);
    }

    #[tokio::test]
    async fn test_update_on_rules_change() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(REPO_PATH))
            .and(header("If-Match", "\"v1\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(repo_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(REPO_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v2\"")
                    .set_body_json(repo_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let prior = json!({
            "id": "sample",
            "profile_id": "sample",
            "plugin_id": "json.config.plugin",
            "material": repo_body()["material"].clone(),
            "rules": [],
            "etag": "\"v1\"",
        });
        let mut planned = prior.clone();
        planned["rules"] = repo_body()["rules"].clone();

        let mut data = ResourceData::for_update(prior, planned).unwrap();
        ConfigRepositoryResource.update(&client, &mut data).await.unwrap();
        assert_eq!(data.get_string("etag"), "\"v2\"");
    }

    #[tokio::test]
    async fn test_data_source_drops_unset_flags() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(REPO_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(repo_body()),
            )
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::from_config(json!({"profile_id": "sample"})).unwrap();
        ConfigRepositoryDataSource.read(&client, &mut data).await.unwrap();

        let material = data.get_block("material").unwrap();
        assert_eq!(material["type"], "git");
        assert!(material["attributes"].get("check_externals").is_none());
        assert_eq!(data.get_string("plugin_id"), "json.config.plugin");
        assert_eq!(data.id(), "sample");
    }
}
