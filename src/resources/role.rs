use async_trait::async_trait;
use tracing::info;

use super::fragments::{
    expand_properties, expand_rules, flatten_properties, flatten_rules, properties_block,
    properties_data_block, rules_attribute,
};
use super::{key_or_id, require_id, skip_update, DataSource, Resource};
use crate::client::{AdminRoleChanges, GocdClient, Role, RoleAttributes};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, Schema};
use crate::utils::contains;

const GOCD_ROLE: &str = "gocd";
const PLUGIN_ROLE: &str = "plugin";

const POLICY_DESCRIPTION: &str = "Policy is a fine-grained permissions attached to the role.";
const PROPERTIES_DESCRIPTION: &str =
    "The list of configuration properties that represent the configuration of this plugin role.";

/// `gocd_role`: a GoCD role, either listing its users directly (`gocd`) or
/// backed by an authorization plugin (`plugin`).
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleResource;

fn role(data: &ResourceData) -> Result<Role, ProviderError> {
    let role_type = data.get_string("type").to_lowercase();
    let attributes = match role_type.as_str() {
        GOCD_ROLE => RoleAttributes {
            users: Some(data.get_strings("users")),
            ..Default::default()
        },
        PLUGIN_ROLE => RoleAttributes {
            auth_config_id: Some(data.get_string("auth_config_id")),
            properties: Some(expand_properties(data.get("properties"))),
            ..Default::default()
        },
        other => {
            return Err(ProviderError::Validation(format!("unknown role type '{}'", other)));
        }
    };

    Ok(Role {
        name: data.get_string("name"),
        role_type,
        attributes,
        policy: expand_rules(data.get("policy")),
        etag: data.get_string("etag"),
    })
}

fn set_role(data: &mut ResourceData, role: &Role) -> Result<(), ProviderError> {
    data.set("type", &role.role_type)?;
    data.set("policy", flatten_rules(&role.policy)?)?;
    data.set("etag", &role.etag)?;

    match role.role_type.to_lowercase().as_str() {
        GOCD_ROLE => data.set("users", role.attributes.users.clone().unwrap_or_default()),
        PLUGIN_ROLE => {
            data.set(
                "auth_config_id",
                role.attributes.auth_config_id.clone().unwrap_or_default(),
            )?;
            let properties = role.attributes.properties.as_deref().unwrap_or_default();
            data.set("properties", flatten_properties(properties)?)
        }
        other => Err(ProviderError::Validation(format!("unknown role type '{}'", other))),
    }
}

/// Make the role's membership in the system admins match `system_admin`.
async fn reconcile_system_admin(
    client: &GocdClient,
    name: &str,
    system_admin: bool,
) -> Result<(), ProviderError> {
    let admins = client
        .get_system_admins()
        .await
        .map_err(|err| err.context("fetching system admins errored with"))?;

    if contains(&admins.roles, name) == system_admin {
        return Ok(());
    }

    let changes = if system_admin {
        info!("Adding role '{}' to system admins", name);
        AdminRoleChanges {
            add: vec![name.to_string()],
            ..Default::default()
        }
    } else {
        info!("Removing role '{}' from system admins", name);
        AdminRoleChanges {
            remove: vec![name.to_string()],
            ..Default::default()
        }
    };

    client
        .update_system_admins_bulk(&changes)
        .await
        .map_err(|err| err.context("updating system admins bulk errored with"))?;
    Ok(())
}

#[async_trait]
impl Resource for RoleResource {
    fn name(&self) -> &'static str {
        "gocd_role"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("The name of the role."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Type of the role. Use gocd to create core role and plugin to create plugin role."),
            )
            .with_attribute(
                "system_admin",
                Attribute::optional_bool()
                    .with_description("Whether members of this role are system administrators."),
            )
            .with_attribute("policy", rules_attribute(AttributeFlags::required(), POLICY_DESCRIPTION))
            .with_attribute(
                "users",
                Attribute::string_list(AttributeFlags::optional())
                    .with_description("The list of users belongs to the role, only for roles of type gocd."),
            )
            .with_attribute(
                "auth_config_id",
                Attribute::optional_string()
                    .with_force_new()
                    .with_description("The authorization configuration identifier, only for roles of type plugin."),
            )
            .with_attribute("etag", Attribute::etag("etag used to track the role"))
            .with_block("properties", properties_block(false, PROPERTIES_DESCRIPTION))
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let role = role(data)?;
        client.create_role(&role).await.map_err(|err| {
            err.context(format!(
                "creating role '{}' of type '{}' errored with",
                role.name, role.role_type
            ))
        })?;

        reconcile_system_admin(client, &role.name, data.get_bool("system_admin")).await?;

        data.set_id(role.name);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = key_or_id(data, "name");
        let response = client
            .get_role(&name)
            .await
            .map_err(|err| err.context(format!("fetching role {} errored with", name)))?;

        data.set("etag", response.etag)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_changes(&["properties", "policy", "users", "system_admin"]) {
            skip_update(self.name(), data);
            return Ok(());
        }

        let role = role(data)?;
        if data.has_changes(&["properties", "policy", "users"]) {
            client.update_role(&role).await.map_err(|err| {
                err.context(format!("updating role '{}' errored with", role.name))
            })?;
        }
        reconcile_system_admin(client, &role.name, data.get_bool("system_admin")).await?;

        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        let name = key_or_id(data, "name");
        client
            .delete_role(&name)
            .await
            .map_err(|err| err.context(format!("deleting role '{}' errored with", name)))?;

        data.set_id("");
        Ok(())
    }

    fn supports_import(&self) -> bool {
        true
    }

    async fn import(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.id().to_string();
        let response = client
            .get_role(&name)
            .await
            .map_err(|err| err.context(format!("fetching role {} errored with", name)))?;

        data.set("name", &name)?;
        set_role(data, &response)
    }
}

/// `gocd_role` data source.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleDataSource;

#[async_trait]
impl DataSource for RoleDataSource {
    fn name(&self) -> &'static str {
        "gocd_role"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "name",
                Attribute::required_string().with_description("The name of the role."),
            )
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("policy", rules_attribute(AttributeFlags::computed(), POLICY_DESCRIPTION))
            .with_attribute("users", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute("auth_config_id", Attribute::computed_string())
            .with_attribute("etag", Attribute::optional_computed_string())
            .with_block("properties", properties_data_block(PROPERTIES_DESCRIPTION))
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let name = data.get_string("name");
        let response = client
            .get_role(&name)
            .await
            .map_err(|err| err.context(format!("fetching role {} errored with", name)))?;

        set_role(data, &response)?;
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

    const ADMINS_PATH: &str = "/go/api/admin/security/system_admins";

    fn gocd_role_body() -> serde_json::Value {
        json!({
            "name": "deployers",
            "type": "gocd",
            "attributes": {"users": ["alice", "bob"]},
            "policy": [{"permission": "allow", "action": "view", "type": "environment", "resource": "*"}],
        })
    }

    async fn mount_role(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/go/api/admin/security/roles/deployers"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("ETag", "\"v1\"")
                    .set_body_json(body),
            )
            .mount(server)
            .await;
    }

    #[test]
    fn test_unknown_role_type() {
        let data = ResourceData::from_state(json!({"name": "x", "type": "ldap", "policy": []})).unwrap();
        let err = role(&data).unwrap_err();
        assert_eq!(err.message(), "unknown role type 'ldap'");
    }

    #[test]
    fn test_role_type_is_case_insensitive() {
        let data = ResourceData::from_state(json!({
            "name": "x",
            "type": "Plugin",
            "auth_config_id": "ldap",
            "properties": [{"key": "MemberOf", "value": "ou=admins"}],
        }))
        .unwrap();
        let role = role(&data).unwrap();
        assert_eq!(role.role_type, "plugin");
        assert_eq!(role.attributes.auth_config_id.as_deref(), Some("ldap"));
        assert!(role.attributes.users.is_none());
    }

    #[tokio::test]
    async fn test_create_adds_system_admin() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/go/api/admin/security/roles"))
            .and(body_json(gocd_role_body()))
            .respond_with(ResponseTemplate::new(200).set_body_json(gocd_role_body()))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ADMINS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"roles": [], "users": ["admin"]})))
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(ADMINS_PATH))
            .and(body_json(json!({"operations": {"roles": {"add": ["deployers"]}}})))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"roles": ["deployers"], "users": ["admin"]})),
            )
            .expect(1)
            .mount(&server)
            .await;
        mount_role(&server, gocd_role_body()).await;

        let client = test_support::client(&server);
        let mut data = ResourceData::new_resource(json!({
            "name": "deployers",
            "type": "gocd",
            "system_admin": true,
            "users": ["alice", "bob"],
            "policy": [{"permission": "allow", "action": "view", "type": "environment", "resource": "*"}],
        }))
        .unwrap();
        RoleResource.create(&client, &mut data).await.unwrap();

        assert_eq!(data.id(), "deployers");
        assert_eq!(data.get_string("etag"), "\"v1\"");
    }

    #[tokio::test]
    async fn test_update_removes_system_admin_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ADMINS_PATH))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"roles": ["deployers"], "users": []})),
            )
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(ADMINS_PATH))
            .and(body_json(json!({"operations": {"roles": {"remove": ["deployers"]}}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"roles": [], "users": []})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        mount_role(&server, gocd_role_body()).await;

        let client = test_support::client(&server);
        let prior = json!({
            "id": "deployers",
            "name": "deployers",
            "type": "gocd",
            "system_admin": true,
            "users": ["alice", "bob"],
            "policy": gocd_role_body()["policy"].clone(),
            "etag": "\"v1\"",
        });
        let mut planned = prior.clone();
        planned["system_admin"] = json!(false);

        let mut data = ResourceData::for_update(prior, planned).unwrap();
        RoleResource.update(&client, &mut data).await.unwrap();
    }

    #[tokio::test]
    async fn test_data_source_reads_plugin_role() {
        let server = MockServer::start().await;
        mount_role(
            &server,
            json!({
                "name": "deployers",
                "type": "plugin",
                "attributes": {
                    "auth_config_id": "ldap",
                    "properties": [{"key": "UserGroupMembershipAttribute", "value": "memberOf"}],
                },
                "policy": [],
            }),
        )
        .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::from_config(json!({"name": "deployers"})).unwrap();
        RoleDataSource.read(&client, &mut data).await.unwrap();

        assert_eq!(data.get_string("type"), "plugin");
        assert_eq!(data.get_string("auth_config_id"), "ldap");
        assert_eq!(data.get_list("properties")[0]["value"], "memberOf");
        assert!(data.get_ok("users").is_none());
    }
}
