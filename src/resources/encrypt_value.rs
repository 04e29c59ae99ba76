use async_trait::async_trait;

use super::{require_id, Resource};
use crate::client::GocdClient;
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};
use crate::utils::random_id;

/// `gocd_encrypt_value`: encrypts a plain text value with the server's
/// cipher so it can be used as an `encrypted_value` elsewhere.
#[derive(Debug, Clone, Copy, Default)]
pub struct EncryptValueResource;

#[async_trait]
impl Resource for EncryptValueResource {
    fn name(&self) -> &'static str {
        "gocd_encrypt_value"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "value",
                Attribute::required_string()
                    .sensitive()
                    .with_force_new()
                    .with_description("The plain text value to be encrypted."),
            )
            .with_attribute(
                "encrypted_value",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("The value encrypted by GoCD."),
            )
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let encrypted = client
            .encrypt_text(&data.get_string("value"))
            .await
            .map_err(|err| err.context("encrypting value errored with"))?;

        data.set("encrypted_value", encrypted.encrypted_value)?;
        data.set_id(random_id());
        Ok(())
    }

    async fn read(&self, _client: &GocdClient, _data: &mut ResourceData) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn delete(&self, _client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        data.set_id("");
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

    #[tokio::test]
    async fn test_create_encrypts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/go/api/admin/encrypt"))
            .and(body_json(json!({"value": "badger"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"encrypted_value": "AES:abc:def"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_support::client(&server);
        let mut data = ResourceData::new_resource(json!({"value": "badger"})).unwrap();
        EncryptValueResource.create(&client, &mut data).await.unwrap();

        assert_eq!(data.get_string("encrypted_value"), "AES:abc:def");
        assert_eq!(data.id().len(), 16);
    }

    #[test]
    fn test_schema_marks_values_sensitive() {
        let schema = EncryptValueResource.schema();
        assert!(schema.block.attributes["value"].flags.sensitive);
        assert!(schema.block.attributes["value"].force_new);
        assert!(schema.block.attributes["encrypted_value"].flags.sensitive);
    }

    #[tokio::test]
    async fn test_delete_without_id() {
        let server = MockServer::start().await;
        let client = test_support::client(&server);
        let mut data = ResourceData::default();

        let err = EncryptValueResource.delete(&client, &mut data).await.unwrap_err();
        assert!(matches!(err, ProviderError::NotFound(_)));
        assert_eq!(err.message(), "resource with the ID '' not found");
        assert!(server.received_requests().await.unwrap().is_empty());
    }
}
