//! In-process test harness for [`ProviderService`] implementations.
//!
//! [`ProviderTester`] drives a provider the way a host would, without any
//! transport in between. Pair it with a fake GoCD server (for example a
//! `wiremock::MockServer`) to exercise whole resource lifecycles.
//!
//! # Example
//!
//! ```ignore
//! use gocd_provider::testing::ProviderTester;
//! use serde_json::json;
//!
//! #[tokio::test]
//! async fn test_environment() {
//!     let server = wiremock::MockServer::start().await;
//!     // mount the GoCD endpoints the test needs...
//!
//!     let tester = ProviderTester::gocd();
//!     tester.configure_unchecked(&format!("{}/go", server.uri())).await.unwrap();
//!
//!     let state = tester
//!         .lifecycle_create("gocd_environment", json!({"name": "staging"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state["id"], "staging");
//! }
//! ```

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::GocdProvider;
use crate::schema::{Diagnostic, ProviderSchema};
use crate::service::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Drives a provider through plan and apply without a host.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<GocdProvider> {
    /// A tester around a fresh, unconfigured [`GocdProvider`].
    pub fn gocd() -> Self {
        Self::new(GocdProvider::new())
    }
}

impl<P: ProviderService> ProviderTester<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> Vec<String> {
        self.provider.metadata().resources
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> Vec<String> {
        self.provider.metadata().data_sources
    }

    // =========================================================================
    // Provider Lifecycle
    // =========================================================================

    pub async fn validate_provider_config(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.validate_provider_config(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure the provider, failing on error diagnostics.
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Configure against `base_url` with basic auth and without the
    /// health check, which is what fake servers usually want.
    pub async fn configure_unchecked(&self, base_url: &str) -> Result<(), TestError> {
        self.configure(json!({
            "base_url": base_url,
            "username": "admin",
            "password": "badger",
            "skip_check": true,
        }))
        .await
    }

    pub async fn stop(&self) -> Result<(), ProviderError> {
        self.provider.stop().await
    }

    // =========================================================================
    // Resource Operations
    // =========================================================================

    pub async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a create: there is no prior state.
    pub async fn plan_create(
        &self,
        resource_type: &str,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed_state.clone(), proposed_state)
            .await
    }

    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        proposed_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), proposed_state.clone(), proposed_state)
            .await
    }

    pub async fn plan_delete(
        &self,
        resource_type: &str,
        prior_state: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior_state), Value::Null, Value::Null)
            .await
    }

    pub async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned_state).await
    }

    pub async fn read(&self, resource_type: &str, current_state: Value) -> Result<Value, ProviderError> {
        self.provider.read(resource_type, current_state).await
    }

    pub async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior_state, planned_state).await
    }

    pub async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, current_state).await
    }

    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    // =========================================================================
    // Data Source Operations
    // =========================================================================

    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, TestError> {
        self.validate_data_source_config(data_source_type, config.clone())
            .await?;
        Ok(self.provider.read_data_source(data_source_type, config).await?)
    }

    // =========================================================================
    // Lifecycle Helpers
    // =========================================================================

    /// validate, plan, create, then read back.
    pub async fn lifecycle_create(&self, resource_type: &str, config: Value) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        Ok(self.read(resource_type, created).await?)
    }

    /// Plan against `prior_state` and apply the result.
    ///
    /// A plan without changes returns the prior state untouched. A plan that
    /// requires replacement deletes the old object and creates a new one, as
    /// a host would for force-new attributes.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior_state: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate_resource_config(resource_type, config.clone())
            .await?;
        let plan = self
            .plan_update(resource_type, prior_state.clone(), config)
            .await?;

        if !plan.has_changes() {
            return Ok(prior_state);
        }
        let applied = if plan.requires_replace {
            self.delete(resource_type, prior_state).await?;
            self.create(resource_type, without_id(plan.planned_state))
                .await?
        } else {
            self.update(resource_type, prior_state, plan.planned_state)
                .await?
        };
        Ok(self.read(resource_type, applied).await?)
    }

    pub async fn lifecycle_delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        self.plan_delete(resource_type, current_state.clone()).await?;
        self.delete(resource_type, current_state).await
    }

    /// Create with `initial_config`, apply `updated_config`, then delete.
    ///
    /// Returns the state after the update.
    pub async fn lifecycle_crud(
        &self,
        resource_type: &str,
        initial_config: Value,
        updated_config: Value,
    ) -> Result<Value, TestError> {
        let created = self.lifecycle_create(resource_type, initial_config).await?;
        let updated = self
            .lifecycle_update(resource_type, created, updated_config)
            .await?;
        self.lifecycle_delete(resource_type, updated.clone()).await?;
        Ok(updated)
    }

    /// Import `id` and return the single imported state.
    pub async fn lifecycle_import(&self, resource_type: &str, id: &str) -> Result<Value, TestError> {
        let mut imported = self.import_resource(resource_type, id).await?;
        match imported.pop() {
            Some(resource) if imported.is_empty() => Ok(resource.state),
            _ => Err(TestError::Provider(ProviderError::Sdk(format!(
                "expected exactly one imported '{}' for '{}'",
                resource_type, id
            )))),
        }
    }
}

fn without_id(state: Value) -> Value {
    match state {
        Value::Object(mut map) => {
            map.remove("id");
            Value::Object(map)
        }
        other => other,
    }
}

/// Failure of a harness operation.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    #[error("{}", render_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),

    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn render_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("operation failed with {} diagnostic(s):", diagnostics.len());
    for diag in diagnostics {
        out.push_str(&format!("\n  [{:?}] {}", diag.severity, diag.summary));
        if let Some(detail) = &diag.detail {
            out.push_str(&format!(": {}", detail));
        }
        if let Some(attr) = &diag.attribute {
            out.push_str(&format!(" (at {})", attr));
        }
    }
    out
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics.into_iter().filter(Diagnostic::is_error).collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

// =========================================================================
// Assertion Helpers
// =========================================================================

/// # Panics
///
/// Panics unless the plan adds something without replacing.
pub fn assert_plan_creates(plan: &PlanResult) {
    assert!(
        !plan.changes.is_empty(),
        "expected plan to have changes for create, but got no changes"
    );
    assert!(!plan.requires_replace, "expected plan to create, not replace");
}

/// # Panics
///
/// Panics if the plan has any changes.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, but got {}: {:?}",
        plan.changes.len(),
        plan.changed_paths()
    );
}

/// # Panics
///
/// Panics if the plan does not require replacement.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(
        plan.requires_replace,
        "expected plan to require replacement, changed: {:?}",
        plan.changed_paths()
    );
}

/// # Panics
///
/// Panics if the plan has no changes or requires replacement.
pub fn assert_plan_updates_in_place(plan: &PlanResult) {
    assert!(plan.has_changes(), "expected plan to have changes, but got none");
    assert!(
        !plan.requires_replace,
        "expected plan to update in place, but it requires replacement"
    );
}

/// # Panics
///
/// Panics unless `path` is among the changed attributes.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changed_paths().contains(&path),
        "expected plan to change '{}', changed: {:?}",
        path,
        plan.changed_paths()
    );
}

/// # Panics
///
/// Panics if `path` is among the changed attributes.
pub fn assert_plan_does_not_change_attribute(plan: &PlanResult, path: &str) {
    assert!(
        !plan.changed_paths().contains(&path),
        "expected plan to leave '{}' alone, but it was changed",
        path
    );
}

/// # Panics
///
/// Panics if there are any error diagnostics.
pub fn assert_no_errors(diagnostics: &[Diagnostic]) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| &d.summary)
        .collect();
    assert!(errors.is_empty(), "expected no errors, but got {:?}", errors);
}

/// # Panics
///
/// Panics if no error diagnostic contains `substring`.
pub fn assert_error_contains(diagnostics: &[Diagnostic], substring: &str) {
    let errors: Vec<_> = diagnostics
        .iter()
        .filter(|d| d.is_error())
        .map(|d| d.summary.as_str())
        .collect();
    assert!(
        errors.iter().any(|summary| summary.contains(substring)),
        "expected an error containing '{}', errors: {:?}",
        substring,
        errors
    );
}
