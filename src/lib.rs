//! GoCD provider
//!
//! Manages the configuration of a [GoCD](https://www.gocd.org) server
//! (plugin settings, elastic agents, secrets, config repositories,
//! environments, pipelines, roles, agents and backups) through its REST API.
//!
//! # Overview
//!
//! - **Provider**: [`GocdProvider`] implements [`ProviderService`], the set of
//!   operations a host drives a provider through
//! - **Resources**: one module per GoCD object under [`resources`], each a
//!   schema plus create/read/update/delete callbacks over [`ResourceData`]
//! - **API client**: [`client::GocdClient`], a thin async client for the
//!   versioned GoCD API
//! - **Schema & plan**: attribute schemas, config validation and plan diffs
//! - **Testing**: [`testing::ProviderTester`] runs whole lifecycles in-process
//!
//! # Quick Start
//!
//! ```ignore
//! use gocd_provider::{GocdProvider, ProviderService};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), gocd_provider::ProviderError> {
//!     let provider = GocdProvider::new();
//!     provider
//!         .configure(json!({
//!             "base_url": "https://ci.example.com/go",
//!             "auth_token": std::env::var("GOCD_AUTH_TOKEN").unwrap_or_default(),
//!         }))
//!         .await?;
//!
//!     let state = provider
//!         .create("gocd_environment", json!({"name": "staging", "pipelines": ["build"]}))
//!         .await?;
//!     println!("{}", state["etag"]);
//!     Ok(())
//! }
//! ```
//!
//! # Configuration
//!
//! Every provider attribute falls back to an environment variable:
//! `GOCD_BASE_URL`, `GOCD_USERNAME`, `GOCD_PASSWORD`, `GOCD_AUTH_TOKEN`,
//! `GOCD_CAFILE_CONTENT`, `GOCD_SKIP_CHECK` and `GOCD_LOGLEVEL`. Logs go to
//! stderr; `RUST_LOG` overrides the configured level.

#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod resource_data;
pub mod resources;
pub mod schema;
pub mod service;
pub mod testing;
pub mod types;
pub mod utils;
pub mod validation;

// Re-export main types at crate root
pub use config::ProviderConfig;
pub use error::ProviderError;
pub use logging::{
    init_logging, init_logging_with_default, try_init_logging, try_init_logging_with_default,
    LogLevel,
};
pub use provider::GocdProvider;
pub use resource_data::ResourceData;
pub use schema::ProviderSchema;
pub use service::ProviderService;
pub use types::{AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities};
pub use validation::{is_valid, validate, validate_result};

pub use async_trait::async_trait;

pub use serde_json;
pub use tracing;
