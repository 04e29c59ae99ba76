use async_trait::async_trait;

use super::{require_id, skip_update, Resource};
use crate::client::{BackupConfig, GocdClient};
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, Schema};

/// `gocd_backup_config`: the server-wide backup schedule. There is a
/// single backup configuration per server; its ID is the cron schedule.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupConfigResource;

fn backup_config(data: &ResourceData) -> BackupConfig {
    BackupConfig {
        schedule: data.get_string("schedule"),
        post_backup_script: data.get_string("post_backup_script"),
        email_on_success: data.get_bool("email_on_success"),
        email_on_failure: data.get_bool("email_on_failure"),
    }
}

#[async_trait]
impl Resource for BackupConfigResource {
    fn name(&self) -> &'static str {
        "gocd_backup_config"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "schedule",
                Attribute::required_string()
                    .with_description("The backup schedule as a quartz cron expression."),
            )
            .with_attribute(
                "post_backup_script",
                Attribute::optional_string()
                    .with_description("The script that will be executed once the backup finishes."),
            )
            .with_attribute(
                "email_on_success",
                Attribute::optional_bool()
                    .with_description("Whether an email should be sent when the backup completes successfully."),
            )
            .with_attribute(
                "email_on_failure",
                Attribute::optional_bool()
                    .with_description("Whether an email should be sent when the backup fails."),
            )
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let config = backup_config(data);
        client
            .create_or_update_backup_config(&config)
            .await
            .map_err(|err| err.context("creating backup configuration errored with"))?;

        data.set_id(config.schedule);
        self.read(client, data).await
    }

    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let config = client
            .get_backup_config()
            .await
            .map_err(|err| err.context("getting backup configuration errored with"))?;

        data.set("schedule", &config.schedule)?;
        data.set("post_backup_script", &config.post_backup_script)?;
        data.set("email_on_success", config.email_on_success)?;
        data.set("email_on_failure", config.email_on_failure)
    }

    async fn update(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.has_changes(&["schedule", "post_backup_script", "email_on_success", "email_on_failure"]) {
            skip_update(self.name(), data);
            return Ok(());
        }

        let config = backup_config(data);
        client
            .create_or_update_backup_config(&config)
            .await
            .map_err(|err| err.context("updating backup configuration errored with"))?;

        data.set_id(config.schedule);
        self.read(client, data).await
    }

    async fn delete(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        client
            .delete_backup_config()
            .await
            .map_err(|err| err.context("deleting backup configuration errored with"))?;

        data.set_id("");
        Ok(())
    }
}
