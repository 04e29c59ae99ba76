use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;
use tracing::info;

use super::{require_id, Resource};
use crate::client::GocdClient;
use crate::error::ProviderError;
use crate::resource_data::ResourceData;
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};
use crate::utils::random_id;

const DEFAULT_RETRY: i64 = 30;
const DEFAULT_DELAY: i64 = 5;

const IN_PROGRESS: &str = "IN_PROGRESS";
const COMPLETED: &str = "COMPLETED";

/// `gocd_backup_schedule`: takes a one-off server backup and waits for it
/// to finish.
#[derive(Debug, Clone, Copy, Default)]
pub struct BackupScheduleResource;

fn seconds(value: i64) -> Duration {
    Duration::from_secs(value.max(0) as u64)
}

#[async_trait]
impl Resource for BackupScheduleResource {
    fn name(&self) -> &'static str {
        "gocd_backup_schedule"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_attribute(
                "schedule",
                Attribute::required_bool()
                    .with_force_new()
                    .with_description("Set to true to take a backup; it is reset to false once the backup completes."),
            )
            .with_attribute(
                "retry",
                Attribute::optional_int64()
                    .with_default(json!(DEFAULT_RETRY))
                    .with_force_new()
                    .with_description("Number of times to poll the backup status before giving up."),
            )
            .with_attribute(
                "delay",
                Attribute::optional_int64()
                    .with_default(json!(DEFAULT_DELAY))
                    .with_force_new()
                    .with_description("Seconds to wait between two polls of the backup status."),
            )
            .with_attribute(
                "retry_after",
                Attribute::new(AttributeType::Int64, AttributeFlags::optional_computed())
                    .with_description("Seconds GoCD asked to wait before the first poll."),
            )
            .with_attribute(
                "backup_id",
                Attribute::optional_computed_string().with_description("Identifier of the scheduled backup."),
            )
    }

    async fn create(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        if !data.get_bool("schedule") {
            return Err(ProviderError::Validation(
                "scheduling backup is disabled, set attribute 'schedule' to true to schedule a backup"
                    .to_string(),
            ));
        }

        let scheduled = client
            .schedule_backup()
            .await
            .map_err(|err| err.context("scheduling backup errored with"))?;

        data.set("backup_id", &scheduled.id)?;
        data.set("retry_after", scheduled.retry_after)?;
        data.set_id(random_id());
        self.read(client, data).await
    }

    /// Poll the scheduled backup until it completes.
    async fn read(&self, client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        let backup_id = data.get_string("backup_id");
        let retry = data.get_i64("retry");
        let delay = seconds(data.get_i64("delay"));

        tokio::time::sleep(seconds(data.get_i64("retry_after"))).await;

        let mut count = 0;
        let mut status = String::new();
        loop {
            if count > retry {
                return Err(ProviderError::DeadlineExceeded(format!(
                    "maximum retry count of '{}' crossed with current count '{}', still backup is not ready yet with status '{}'. Exiting",
                    retry, count, status
                )));
            }

            let backup = client
                .get_backup(&backup_id)
                .await
                .map_err(|err| err.context("getting last configured backup ID errored with"))?;
            status = backup.status;

            match status.as_str() {
                IN_PROGRESS => {
                    info!(
                        backup_id = %backup_id,
                        progress = %backup.progress_status,
                        "backup is still in progress, retrying... '{}' more to go",
                        retry - count
                    );
                }
                COMPLETED => {
                    data.set("schedule", false)?;
                    return Ok(());
                }
                other => {
                    return Err(ProviderError::FailedPrecondition(format!(
                        "looks like backup status is neither IN_PROGRESS nor COMPLETED rather it is {}",
                        other
                    )));
                }
            }

            tokio::time::sleep(delay).await;
            count += 1;
        }
    }

    async fn delete(&self, _client: &GocdClient, data: &mut ResourceData) -> Result<(), ProviderError> {
        require_id(data)?;
        data.set_id("");
        Ok(())
    }
}
