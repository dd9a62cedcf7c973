//! Postback protocol tests against a live HTTP server.

use rewst_agent::config::Device;
use rewst_agent::postback::{PostbackClient, PostbackOutcome};
use rewst_agent::AgentError;
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_device(engine_host: &str) -> Device {
    Device {
        device_id: "device-1".to_string(),
        rewst_org_id: "org-1".to_string(),
        rewst_engine_host: engine_host.to_string(),
        shared_access_key: "c2VjcmV0".to_string(),
        azure_iot_hub_host: "hub.example.com".to_string(),
        broker: None,
        logging_level: Default::default(),
        use_syslog: false,
    }
}

fn result_body() -> Vec<u8> {
    serde_json::to_vec(&serde_json::json!({"error": "", "output": "hi\n"})).unwrap()
}

#[tokio::test]
async fn test_delivered_on_200() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhooks/custom/action/post/1"))
        .and(header("content-type", "application/json"))
        .and(header_exists("x-rewst-agent-version"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let client = PostbackClient::new();
    let device = test_device(&server.uri());

    let outcome = client.send("post:1", &device, result_body()).await.unwrap();
    assert_eq!(outcome, PostbackOutcome::Delivered);
}

#[tokio::test]
async fn test_already_fulfilled_is_idempotent_success() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/webhooks/custom/action/post/2"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(serde_json::json!({"error": "webhook already fulfilled"})),
        )
        .expect(2)
        .mount(&server)
        .await;

    let client = PostbackClient::new();
    let device = test_device(&server.uri());

    // Both attempts classify as success; no duplicate failure reported.
    for _ in 0..2 {
        let outcome = client.send("post:2", &device, result_body()).await.unwrap();
        assert_eq!(outcome, PostbackOutcome::AlreadyFulfilled);
    }
}

#[tokio::test]
async fn test_bad_request_without_fulfilled_is_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(serde_json::json!({"error": "bad payload"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = PostbackClient::new();
    let device = test_device(&server.uri());

    let result = client.send("post:3", &device, result_body()).await;
    assert!(matches!(result, Err(AgentError::Postback(_))));
}

#[tokio::test]
async fn test_server_error_is_failure_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let client = PostbackClient::new();
    let device = test_device(&server.uri());

    let result = client.send("post:4", &device, result_body()).await;
    let err = result.unwrap_err();
    assert!(err.to_string().contains("500"));

    // expect(1) on the mock verifies no retry happened, checked on drop.
}

#[tokio::test]
async fn test_empty_post_id_skips_postback() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = PostbackClient::new();
    let device = test_device(&server.uri());

    let outcome = client.send("", &device, result_body()).await.unwrap();
    assert_eq!(outcome, PostbackOutcome::Skipped);
}

#[tokio::test]
async fn test_network_failure_is_postback_error() {
    // Nothing listens here; the request cannot be sent.
    let client = PostbackClient::new();
    let device = test_device("http://127.0.0.1:1");

    let result = client.send("post:5", &device, result_body()).await;
    assert!(matches!(result, Err(AgentError::Postback(_))));
}
