//! Provider configuration against a fake GoCD server.

use gocd_provider::testing::{assert_error_contains, ProviderTester, TestError};
use gocd_provider::{GocdProvider, ProviderError, ProviderService};
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HEALTH_PATH: &str = "/go/api/v1/health";

fn base_url(server: &MockServer) -> String {
    format!("{}/go", server.uri())
}

#[tokio::test]
async fn test_health_check_uses_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .and(header("Authorization", "Bearer s3cr3t"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"health": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::gocd();
    tester
        .configure(json!({
            "base_url": base_url(&server),
            "username": "admin",
            "password": "badger",
            "auth_token": "s3cr3t",
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_health_check_accepts_plain_text() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_string("OK"))
        .expect(1)
        .mount(&server)
        .await;

    let provider = GocdProvider::new();
    let diagnostics = provider
        .configure(json!({"base_url": base_url(&server)}))
        .await
        .unwrap();
    assert!(diagnostics.is_empty());
}

#[tokio::test]
async fn test_health_check_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("starting up"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"health": "OK"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = ProviderTester::gocd();
    tester
        .configure(json!({
            "base_url": base_url(&server),
            "retries": {"count": 1, "wait_time": 0},
        }))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_failed_health_check() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(HEALTH_PATH))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({"message": "forbidden"})))
        .mount(&server)
        .await;

    let tester = ProviderTester::gocd();
    let err = tester
        .configure(json!({"base_url": base_url(&server), "username": "admin", "password": "wrong"}))
        .await
        .unwrap_err();

    match err {
        TestError::Provider(ProviderError::Configuration(message)) => {
            assert!(message.contains("kindly re-check the baseURL and authorization config"));
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_invalid_provider_config() {
    let provider = GocdProvider::new();
    let diagnostics = provider
        .validate_provider_config(json!({"base_url": "https://ci.example.com/go", "retries": {"count": "three"}}))
        .await
        .unwrap();
    assert_error_contains(&diagnostics, "retries.count");

    let err = provider
        .configure(json!({"base_url": "not a url", "skip_check": true}))
        .await
        .unwrap_err();
    assert!(matches!(err, ProviderError::Configuration(_)));
}

#[tokio::test]
async fn test_operations_require_configure() {
    let tester = ProviderTester::gocd();
    let err = tester
        .read_data_source("gocd_environment", json!({"name": "staging"}))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        TestError::Provider(ProviderError::FailedPrecondition(_))
    ));
}
