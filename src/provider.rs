//! The GoCD provider: resource registry plus the configured API client.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::client::GocdClient;
use crate::config::{provider_config_schema, ProviderConfig};
use crate::error::ProviderError;
use crate::logging::try_init_logging_with_default;
use crate::plan::{plan_resource, with_defaults};
use crate::resource_data::ResourceData;
use crate::resources::{data_sources, resources, DataSource, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

/// Manages GoCD server configuration through its REST API.
///
/// The provider must be configured before any resource or data source
/// operation; until then those operations fail with a precondition error.
pub struct GocdProvider {
    resources: HashMap<&'static str, Arc<dyn Resource>>,
    data_sources: HashMap<&'static str, Arc<dyn DataSource>>,
    client: RwLock<Option<Arc<GocdClient>>>,
}

impl Default for GocdProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for GocdProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut resources: Vec<_> = self.resources.keys().collect();
        resources.sort();
        f.debug_struct("GocdProvider")
            .field("resources", &resources)
            .finish_non_exhaustive()
    }
}

impl GocdProvider {
    pub fn new() -> Self {
        Self {
            resources: resources().into_iter().map(|r| (r.name(), r)).collect(),
            data_sources: data_sources().into_iter().map(|d| (d.name(), d)).collect(),
            client: RwLock::new(None),
        }
    }

    fn resource(&self, resource_type: &str) -> Result<Arc<dyn Resource>, ProviderError> {
        self.resources.get(resource_type).cloned().ok_or_else(|| {
            ProviderError::UnknownResource(format!("unknown resource type '{}'", resource_type))
        })
    }

    fn data_source(&self, data_source_type: &str) -> Result<Arc<dyn DataSource>, ProviderError> {
        self.data_sources.get(data_source_type).cloned().ok_or_else(|| {
            ProviderError::UnknownResource(format!("unknown data source type '{}'", data_source_type))
        })
    }

    async fn client(&self) -> Result<Arc<GocdClient>, ProviderError> {
        self.client.read().await.clone().ok_or_else(|| {
            ProviderError::FailedPrecondition(
                "provider is not configured, call configure first".to_string(),
            )
        })
    }
}

#[async_trait]
impl ProviderService for GocdProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(provider_config_schema());
        let schema = self.resources.values().fold(schema, |schema, resource| {
            schema.with_resource(resource.name(), resource.schema().with_id())
        });
        self.data_sources.values().fold(schema, |schema, data_source| {
            schema.with_data_source(data_source.name(), data_source.schema().with_id())
        })
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&provider_config_schema(), &config))
    }

    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = validate(&provider_config_schema(), &config);
        if diagnostics.iter().any(Diagnostic::is_error) {
            return Ok(diagnostics);
        }

        let config = ProviderConfig::from_value(&config)?;
        try_init_logging_with_default(config.log_level.as_filter());

        let client = GocdClient::new(&config)?;
        if config.skip_check {
            debug!("skipping server health check");
        } else {
            client.server_health().await.map_err(|err| {
                ProviderError::Configuration(format!(
                    "errored while connecting to server, kindly re-check the baseURL and authorization config: {}",
                    err.message()
                ))
            })?;
        }

        info!(base_url = %config.base_url, "configured GoCD provider");
        *self.client.write().await = Some(Arc::new(client));
        Ok(diagnostics)
    }

    async fn stop(&self) -> Result<(), ProviderError> {
        self.client.write().await.take();
        Ok(())
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.resource(resource_type)?.schema(), &config))
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let schema = self.resource(resource_type)?.schema().with_id();
        Ok(plan_resource(&schema, prior_state.as_ref(), &proposed_state))
    }

    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::new_resource(with_defaults(&resource.schema(), planned_state))?;
        resource.create(&client, &mut data).await?;
        Ok(data.into_state())
    }

    async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_state(current_state)?;
        resource.read(&client, &mut data).await?;
        Ok(data.into_state())
    }

    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::for_update(prior_state, planned_state)?;
        resource.update(&client, &mut data).await?;
        Ok(data.into_state())
    }

    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_state(current_state)?;
        resource.delete(&client, &mut data).await
    }

    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        if !resource.supports_import() {
            return Err(ProviderError::Unimplemented(format!(
                "import is not supported for resource type '{}'",
                resource_type
            )));
        }
        let client = self.client().await?;

        let mut data = ResourceData::for_import(id);
        resource.import(&client, &mut data).await?;
        Ok(vec![ImportedResource::new(resource_type, data.into_state())])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        Ok(validate(&self.data_source(data_source_type)?.schema(), &config))
    }

    async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let client = self.client().await?;

        let mut data = ResourceData::from_config(config)?;
        data_source.read(&client, &mut data).await?;
        Ok(data.into_state())
    }
}
