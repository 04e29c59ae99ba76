//! HTTP client for the GoCD REST API.
//!
//! Every request is logged at debug level. Non-success responses are logged
//! (sanitized and truncated) and mapped through
//! [`ProviderError::from_status`]. Retryable failures are retried according
//! to the provider's retry policy.

mod api;
pub mod models;

use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::{Certificate, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::config::{Auth, ProviderConfig, RetryPolicy};
use crate::error::ProviderError;

pub use models::*;

/// Maximum length of response bodies in log output.
const MAX_LOG_BODY_LENGTH: usize = 200;

const USER_AGENT: &str = concat!("gocd-provider/", env!("CARGO_PKG_VERSION"));

/// Sanitize a response body for logging.
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// The `Accept` header a GoCD endpoint expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    /// Unversioned endpoints such as the health check.
    Json,
    /// `application/vnd.go.cd.v<N>+json`
    V(u8),
}

impl ApiVersion {
    pub fn accept(&self) -> String {
        match self {
            ApiVersion::Json => "application/json".to_string(),
            ApiVersion::V(n) => format!("application/vnd.go.cd.v{}+json", n),
        }
    }
}

/// A request about to be sent to GoCD.
#[derive(Debug, Clone)]
struct ApiRequest<'a> {
    method: Method,
    path: &'a str,
    tail: Vec<&'a str>,
    version: ApiVersion,
    body: Option<Value>,
    etag: Option<&'a str>,
    headers: Vec<(&'static str, String)>,
}

impl<'a> ApiRequest<'a> {
    fn new(method: Method, path: &'a str, version: ApiVersion) -> Self {
        Self {
            method,
            path,
            tail: Vec::new(),
            version,
            body: None,
            etag: None,
            headers: Vec::new(),
        }
    }

    fn segment(mut self, segment: &'a str) -> Self {
        self.tail.push(segment);
        self
    }

    fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    fn if_match(mut self, etag: &'a str) -> Self {
        if !etag.is_empty() {
            self.etag = Some(etag);
        }
        self
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }
}

/// A successful response.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    /// The `ETag` header, empty when absent.
    pub fn etag(&self) -> String {
        self.header(ETAG.as_str()).unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<String> {
        self.headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    }

    /// Decode the body; an empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ProviderError> {
        if self.body.trim().is_empty() {
            return Ok(serde_json::from_value(Value::Null)?);
        }
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Decode the body into a model and stamp it with the response etag.
    pub fn versioned<T: DeserializeOwned + Versioned>(&self) -> Result<T, ProviderError> {
        let mut model: T = self.json()?;
        model.set_etag(self.etag());
        Ok(model)
    }
}

/// Authenticated client for one GoCD server.
#[derive(Clone)]
pub struct GocdClient {
    client: Client,
    base_url: Url,
    auth: Auth,
    retries: RetryPolicy,
    log_bodies: bool,
}

impl std::fmt::Debug for GocdClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GocdClient")
            .field("base_url", &self.base_url.as_str())
            .field("auth", &self.auth)
            .field("retries", &self.retries)
            .finish()
    }
}

impl GocdClient {
    /// Build a client from the resolved provider configuration.
    pub fn new(config: &ProviderConfig) -> Result<Self, ProviderError> {
        let mut builder = Client::builder().user_agent(USER_AGENT);

        if let Some(pem) = &config.ca_file {
            let cert = Certificate::from_pem(pem.as_bytes()).map_err(|err| {
                ProviderError::Configuration(format!("reading 'ca_file' errored with: {}", err))
            })?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder.build().map_err(|err| {
            ProviderError::Configuration(format!("creating HTTP client errored with: {}", err))
        })?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            auth: config.auth.clone(),
            retries: config.retries,
            log_bodies: config.log_level.logs_bodies(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve `path` (slash separated) plus percent-encoded `tail` segments
    /// against the base URL.
    pub fn endpoint(&self, path: &str, tail: &[&str]) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ProviderError::Configuration(format!(
                    "base url '{}' cannot carry a path",
                    self.base_url
                ))
            })?;
            segments
                .pop_if_empty()
                .extend(path.split('/').filter(|s| !s.is_empty()))
                .extend(tail);
        }
        Ok(url)
    }

    async fn execute(&self, request: ApiRequest<'_>) -> Result<ApiResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.send_once(&request).await {
                Err(err) if err.is_retryable() && attempt < self.retries.count => {
                    attempt += 1;
                    tracing::warn!(
                        attempt,
                        max = self.retries.count,
                        error = %err,
                        "retrying {} {}",
                        request.method,
                        request.path
                    );
                    tokio::time::sleep(self.retries.wait).await;
                }
                result => return result,
            }
        }
    }

    async fn send_once(&self, request: &ApiRequest<'_>) -> Result<ApiResponse, ProviderError> {
        let url = self.endpoint(request.path, &request.tail)?;
        tracing::debug!("{} {}", request.method, url);

        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(ACCEPT, request.version.accept());

        builder = match &self.auth {
            Auth::None => builder,
            Auth::Basic { username, password } => builder.basic_auth(username, Some(password)),
            Auth::Bearer(token) => builder.bearer_auth(token),
        };

        if let Some(etag) = request.etag {
            builder = builder.header(IF_MATCH, etag);
        }
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }
        if let Some(body) = &request.body {
            let payload = serde_json::to_string(body)?;
            if self.log_bodies {
                tracing::debug!(body = %sanitize_for_log(&payload), "request body");
            }
            builder = builder
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .body(payload);
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if self.log_bodies {
            tracing::debug!(status = status.as_u16(), body = %sanitize_for_log(&body), "response");
        }

        if !status.is_success() {
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&body));
            return Err(ProviderError::from_status(
                status.as_u16(),
                error_message(status, &body),
            ));
        }

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}

/// The `message` of a GoCD error body, or the body itself.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = map.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    let body = sanitize_for_log(body.trim());
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogLevel;
    use std::time::Duration;

    fn client(base: &str) -> GocdClient {
        GocdClient::new(&ProviderConfig {
            base_url: Url::parse(base).unwrap(),
            auth: Auth::None,
            ca_file: None,
            skip_check: true,
            log_level: LogLevel::Info,
            retries: RetryPolicy {
                count: 0,
                wait: Duration::ZERO,
            },
        })
        .unwrap()
    }

    #[test]
    fn test_endpoint_joins_segments() {
        let c = client("http://localhost:8153/go");
        let url = c.endpoint("api/admin/environments", &["dev"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8153/go/api/admin/environments/dev");

        let c = client("http://localhost:8153/go/");
        let url = c.endpoint("api/admin/environments", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8153/go/api/admin/environments");
    }

    #[test]
    fn test_endpoint_encodes_ids() {
        let c = client("http://localhost:8153/go");
        let url = c.endpoint("api/admin/security/roles", &["team a/b"]).unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8153/go/api/admin/security/roles/team%20a%2Fb"
        );
    }

    #[test]
    fn test_accept_header() {
        assert_eq!(ApiVersion::V(3).accept(), "application/vnd.go.cd.v3+json");
        assert_eq!(ApiVersion::Json.accept(), "application/json");
    }

    #[test]
    fn test_sanitize_for_log() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.contains("truncated, 500 bytes total"));
        assert_eq!(sanitize_for_log("a\nb\tc d"), "abc d");
    }

    #[test]
    fn test_error_message() {
        assert_eq!(
            error_message(StatusCode::NOT_FOUND, r#"{"message": "Either the resource you requested was not found"}"#),
            "Either the resource you requested was not found"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");
        assert_eq!(error_message(StatusCode::CONFLICT, "conflict"), "conflict");
    }

    #[test]
    fn test_debug_hides_credentials() {
        let mut c = client("http://localhost:8153/go");
        c.auth = Auth::Bearer("secret-token".to_string());
        assert!(!format!("{:?}", c).contains("secret-token"));
    }
}
