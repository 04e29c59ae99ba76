//! Provider-level configuration: where the GoCD server is and how to talk to it.
//!
//! Every attribute can come from the provider block or from a `GOCD_*`
//! environment variable; values set in the block win.

use std::time::Duration;

use serde_json::Value;
use url::Url;

use crate::error::ProviderError;
use crate::logging::LogLevel;
use crate::resource_data::block_of;
use crate::schema::{Attribute, Block, NestedBlock, Schema};

pub const ENV_BASE_URL: &str = "GOCD_BASE_URL";
pub const ENV_USERNAME: &str = "GOCD_USERNAME";
pub const ENV_PASSWORD: &str = "GOCD_PASSWORD";
pub const ENV_AUTH_TOKEN: &str = "GOCD_AUTH_TOKEN";
pub const ENV_CA_FILE: &str = "GOCD_CAFILE_CONTENT";
pub const ENV_SKIP_CHECK: &str = "GOCD_SKIP_CHECK";
pub const ENV_LOGLEVEL: &str = "GOCD_LOGLEVEL";

/// How requests authenticate against the server.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum Auth {
    #[default]
    None,
    Basic { username: String, password: String },
    Bearer(String),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::None => write!(f, "None"),
            Auth::Basic { username, .. } => write!(f, "Basic({}, ****)", username),
            Auth::Bearer(_) => write!(f, "Bearer(****)"),
        }
    }
}

/// Retries applied to retryable API errors.
///
/// Every call is retried, POSTs included. A create that reached the server but
/// lost its response is sent again and then fails with `AlreadyExists`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub count: u32,
    /// Pause between attempts.
    pub wait: Duration,
}

/// Resolved provider configuration.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub base_url: Url,
    pub auth: Auth,
    /// PEM contents of an additional root certificate.
    pub ca_file: Option<String>,
    pub skip_check: bool,
    pub log_level: LogLevel,
    pub retries: RetryPolicy,
}

impl ProviderConfig {
    /// Resolve the configuration, falling back to the process environment.
    pub fn from_value(config: &Value) -> Result<Self, ProviderError> {
        Self::from_value_with_env(config, |key| std::env::var(key).ok())
    }

    /// Resolve the configuration with an explicit environment lookup.
    pub fn from_value_with_env<F>(config: &Value, env: F) -> Result<Self, ProviderError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let lookup = |attr: &str, var: &str| -> Option<String> {
            config
                .get(attr)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .or_else(|| env(var).filter(|s| !s.is_empty()))
        };

        let raw_url = lookup("base_url", ENV_BASE_URL).ok_or_else(|| {
            ProviderError::Configuration(format!(
                "'base_url' was not set, set it in the provider block or via {}",
                ENV_BASE_URL
            ))
        })?;
        let base_url = Url::parse(&raw_url).map_err(|err| {
            ProviderError::Configuration(format!("invalid 'base_url' '{}': {}", raw_url, err))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(ProviderError::Configuration(format!(
                "invalid 'base_url' '{}': not a base URL",
                raw_url
            )));
        }

        let auth = match (
            lookup("auth_token", ENV_AUTH_TOKEN),
            lookup("username", ENV_USERNAME),
            lookup("password", ENV_PASSWORD),
        ) {
            (Some(token), _, _) => Auth::Bearer(token),
            (None, Some(username), password) => Auth::Basic {
                username,
                password: password.unwrap_or_default(),
            },
            (None, None, _) => Auth::None,
        };

        let skip_check = match config.get("skip_check").and_then(Value::as_bool) {
            Some(skip) => skip,
            None => env(ENV_SKIP_CHECK)
                .map(|v| parse_bool(&v))
                .transpose()?
                .unwrap_or(false),
        };

        let log_level = match lookup("loglevel", ENV_LOGLEVEL) {
            Some(level) => level.parse()?,
            None => LogLevel::default(),
        };

        Ok(Self {
            base_url,
            auth,
            ca_file: lookup("ca_file", ENV_CA_FILE),
            skip_check,
            log_level,
            retries: retry_policy(config.get("retries").unwrap_or(&Value::Null))?,
        })
    }
}

fn retry_policy(value: &Value) -> Result<RetryPolicy, ProviderError> {
    let Some(block) = block_of(value) else {
        return Ok(RetryPolicy::default());
    };
    let number = |key: &str| -> Result<u64, ProviderError> {
        match block.get(key) {
            None | Some(Value::Null) => Ok(0),
            Some(v) => v.as_u64().ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "'retries.{}' must be a non-negative integer, got {}",
                    key, v
                ))
            }),
        }
    };
    let count = number("count")?;
    let wait_time = number("wait_time")?;
    if count != 0 {
        tracing::info!(count, "setting API retry count");
    }
    if wait_time != 0 {
        tracing::info!(wait_time, "setting API retry wait time");
    }
    Ok(RetryPolicy {
        count: u32::try_from(count).unwrap_or(u32::MAX),
        wait: Duration::from_secs(wait_time),
    })
}

fn parse_bool(value: &str) -> Result<bool, ProviderError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        other => Err(ProviderError::Configuration(format!(
            "invalid boolean '{}' for {}",
            other, ENV_SKIP_CHECK
        ))),
    }
}

/// Schema of the provider block.
pub fn provider_config_schema() -> Schema {
    Schema::v0()
        .with_attribute(
            "base_url",
            Attribute::optional_string()
                .with_env_default(ENV_BASE_URL)
                .with_description("base url of GoCD server, which this provider can interact with"),
        )
        .with_attribute(
            "username",
            Attribute::optional_string()
                .with_env_default(ENV_USERNAME)
                .with_description("username to be used while connecting with GoCD"),
        )
        .with_attribute(
            "password",
            Attribute::optional_string()
                .sensitive()
                .with_env_default(ENV_PASSWORD)
                .with_description("password to be used while connecting with GoCD"),
        )
        .with_attribute(
            "auth_token",
            Attribute::optional_string()
                .sensitive()
                .with_env_default(ENV_AUTH_TOKEN)
                .with_description("bearer token to be used while connecting with GoCD"),
        )
        .with_attribute(
            "ca_file",
            Attribute::optional_string()
                .with_env_default(ENV_CA_FILE)
                .with_description("CA file contents, used when the server certificate is signed by a private CA"),
        )
        .with_attribute(
            "skip_check",
            Attribute::optional_bool()
                .with_env_default(ENV_SKIP_CHECK)
                .with_description("skip the server health check while configuring the provider"),
        )
        .with_attribute(
            "loglevel",
            Attribute::optional_string()
                .with_env_default(ENV_LOGLEVEL)
                .with_description("loglevel to be set for the api calls made to GoCD"),
        )
        .with_block(
            "retries",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "count",
                        Attribute::optional_int64()
                            .with_description("number of times an API call is retried"),
                    )
                    .with_attribute(
                        "wait_time",
                        Attribute::optional_int64()
                            .with_description("seconds to wait between retries"),
                    ),
            )
            .with_max_items(1),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_config_from_block() {
        let config = ProviderConfig::from_value_with_env(
            &json!({
                "base_url": "https://gocd.example.com/go",
                "username": "admin",
                "password": "secret",
                "loglevel": "debug",
                "skip_check": true,
                "retries": {"count": 3, "wait_time": 2},
            }),
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.base_url.as_str(), "https://gocd.example.com/go");
        assert_eq!(
            config.auth,
            Auth::Basic {
                username: "admin".to_string(),
                password: "secret".to_string()
            }
        );
        assert!(config.skip_check);
        assert_eq!(config.log_level, LogLevel::Debug);
        assert_eq!(config.retries.count, 3);
        assert_eq!(config.retries.wait, Duration::from_secs(2));
    }

    #[test]
    fn test_config_falls_back_to_env() {
        let config = ProviderConfig::from_value_with_env(
            &json!({}),
            env(&[
                (ENV_BASE_URL, "http://localhost:8153/go"),
                (ENV_AUTH_TOKEN, "token"),
                (ENV_USERNAME, "admin"),
                (ENV_SKIP_CHECK, "true"),
                (ENV_CA_FILE, "-----BEGIN CERTIFICATE-----"),
            ]),
        )
        .unwrap();

        // bearer wins over basic
        assert_eq!(config.auth, Auth::Bearer("token".to_string()));
        assert!(config.skip_check);
        assert_eq!(config.log_level, LogLevel::Info);
        assert!(config.ca_file.is_some());
        assert_eq!(config.retries, RetryPolicy::default());
    }

    #[test]
    fn test_block_wins_over_env() {
        let config = ProviderConfig::from_value_with_env(
            &json!({"base_url": "http://block:8153/go", "skip_check": false}),
            env(&[(ENV_BASE_URL, "http://env:8153/go"), (ENV_SKIP_CHECK, "true")]),
        )
        .unwrap();
        assert_eq!(config.base_url.host_str(), Some("block"));
        assert!(!config.skip_check);
        assert_eq!(config.auth, Auth::None);
    }

    #[test]
    fn test_missing_base_url() {
        let err = ProviderConfig::from_value_with_env(&json!({}), env(&[])).unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("base_url"));
    }

    #[test]
    fn test_invalid_values() {
        let bad_url = ProviderConfig::from_value_with_env(&json!({"base_url": "not a url"}), env(&[]));
        assert!(bad_url.is_err());

        let bad_level = ProviderConfig::from_value_with_env(
            &json!({"base_url": "http://localhost/go", "loglevel": "verbose"}),
            env(&[]),
        );
        assert!(bad_level.is_err());

        let bad_retries = ProviderConfig::from_value_with_env(
            &json!({"base_url": "http://localhost/go", "retries": [{"count": -1}]}),
            env(&[]),
        );
        assert!(bad_retries.is_err());
    }

    #[test]
    fn test_auth_debug_hides_secrets() {
        let auth = Auth::Basic {
            username: "admin".to_string(),
            password: "secret".to_string(),
        };
        assert!(!format!("{:?}", auth).contains("secret"));
        assert!(!format!("{:?}", Auth::Bearer("token".to_string())).contains("token"));
    }

    #[test]
    fn test_provider_config_schema() {
        let schema = provider_config_schema();
        assert!(schema.block.attributes["password"].flags.sensitive);
        assert_eq!(
            schema.block.attributes["loglevel"].env_default.as_deref(),
            Some(ENV_LOGLEVEL)
        );
        assert!(schema.block.blocks.contains_key("retries"));
    }
}
