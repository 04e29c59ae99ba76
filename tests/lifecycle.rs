//! End-to-end resource lifecycles against a fake GoCD server.

use gocd_provider::testing::{assert_plan_updates_in_place, ProviderTester};
use gocd_provider::{GocdProvider, ProviderError};
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PLUGIN_ID: &str = "cd.go.contrib.elasticagent.kubernetes";
const PROFILE_PATH: &str = "/go/api/admin/elastic/cluster_profiles/k8s";

async fn tester(server: &MockServer) -> ProviderTester<GocdProvider> {
    let tester = ProviderTester::gocd();
    tester
        .configure_unchecked(&format!("{}/go", server.uri()))
        .await
        .unwrap();
    tester
}

fn profile(server_url: &str) -> Value {
    json!({
        "id": "k8s",
        "plugin_id": PLUGIN_ID,
        "properties": [{"key": "go_server_url", "value": server_url}],
    })
}

fn profile_config(server_url: &str) -> Value {
    json!({
        "profile_id": "k8s",
        "plugin_id": PLUGIN_ID,
        "properties": [{"key": "go_server_url", "value": server_url}],
    })
}

#[tokio::test]
async fn test_cluster_profile_crud() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/go/api/admin/elastic/cluster_profiles"))
        .and(body_json(profile("https://gocd/go")))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile("https://gocd/go")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"etag-1\"")
                .set_body_json(profile("https://gocd/go")),
        )
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(PROFILE_PATH))
        .and(header("If-Match", "\"etag-1\""))
        .and(body_json(profile("https://gocd.internal/go")))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile("https://gocd.internal/go")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"etag-2\"")
                .set_body_json(profile("https://gocd.internal/go")),
        )
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path(PROFILE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "deleted"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = tester(&server).await;
    let created = tester
        .lifecycle_create("gocd_cluster_profile", profile_config("https://gocd/go"))
        .await
        .unwrap();
    assert_eq!(created["id"], "k8s");
    assert_eq!(created["etag"], "\"etag-1\"");

    let plan = tester
        .plan_update(
            "gocd_cluster_profile",
            created.clone(),
            profile_config("https://gocd.internal/go"),
        )
        .await
        .unwrap();
    assert_plan_updates_in_place(&plan);

    let updated = tester
        .lifecycle_update(
            "gocd_cluster_profile",
            created,
            profile_config("https://gocd.internal/go"),
        )
        .await
        .unwrap();
    assert_eq!(updated["etag"], "\"etag-2\"");

    tester
        .lifecycle_delete("gocd_cluster_profile", updated)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cluster_profile_import_and_data_source() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(PROFILE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("ETag", "\"etag-1\"")
                .set_body_json(profile("https://gocd/go")),
        )
        .mount(&server)
        .await;

    let tester = tester(&server).await;
    let imported = tester
        .lifecycle_import("gocd_cluster_profile", "k8s")
        .await
        .unwrap();
    assert_eq!(imported["profile_id"], "k8s");
    assert_eq!(imported["plugin_id"], PLUGIN_ID);
    assert_eq!(imported["properties"][0]["value"], "https://gocd/go");

    // an imported profile planned against the same config is up to date
    let plan = tester
        .plan_update("gocd_cluster_profile", imported, profile_config("https://gocd/go"))
        .await
        .unwrap();
    assert!(!plan.has_changes(), "unexpected changes: {:?}", plan.changed_paths());

    let data = tester
        .read_data_source("gocd_cluster_profile", json!({"profile_id": "k8s"}))
        .await
        .unwrap();
    assert_eq!(data["id"], "k8s");
    assert_eq!(data["etag"], "\"etag-1\"");
}

#[tokio::test]
async fn test_create_error_carries_context() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/go/api/admin/elastic/cluster_profiles"))
        .respond_with(
            ResponseTemplate::new(422).set_body_json(json!({"message": "Validations failed for clusterProfile 'k8s'."})),
        )
        .mount(&server)
        .await;

    let tester = tester(&server).await;
    let err = tester
        .create("gocd_cluster_profile", profile_config("https://gocd/go"))
        .await
        .unwrap_err();

    assert!(matches!(err, ProviderError::Validation(_)));
    assert!(err.message().starts_with(&format!(
        "creating cluster profile k8s setting for plugin {} errored with",
        PLUGIN_ID
    )));
}

#[tokio::test]
async fn test_backup_schedule_waits_for_backup() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/go/api/backups"))
        .and(header("X-GoCD-Confirm", "true"))
        .respond_with(
            ResponseTemplate::new(202)
                .insert_header("Location", format!("{}/go/api/backups/12", server.uri()).as_str())
                .insert_header("Retry-After", "0"),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/go/api/backups/12"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"status": "IN_PROGRESS", "progress_status": "BACKUP_DATABASE"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/go/api/backups/12"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "COMPLETED"})))
        .mount(&server)
        .await;

    let tester = tester(&server).await;
    let state = tester
        .lifecycle_create("gocd_backup_schedule", json!({"schedule": true, "retry": 2, "delay": 0}))
        .await
        .unwrap();

    assert_eq!(state["backup_id"], "12");
    assert_eq!(state["schedule"], false);
    assert_eq!(state["retry_after"], 0);
}

#[tokio::test]
async fn test_encrypt_value_lifecycle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/go/api/admin/encrypt"))
        .and(body_json(json!({"value": "hunter2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"encrypted_value": "AES:1:2"})))
        .expect(1)
        .mount(&server)
        .await;

    let tester = tester(&server).await;
    let state = tester
        .lifecycle_create("gocd_encrypt_value", json!({"value": "hunter2"}))
        .await
        .unwrap();
    assert_eq!(state["encrypted_value"], "AES:1:2");

    // delete only forgets the value
    tester
        .lifecycle_delete("gocd_encrypt_value", state)
        .await
        .unwrap();
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}
