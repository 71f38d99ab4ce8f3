//! `/webhooks/status` (§4.8, §6) is the one route that must stay reachable
//! without a bearer token, and `/observability/history` (§4.5) must not be.

mod support;

use serde_json::json;
use support::{bearer_token, json_request, send, test_app, test_config};

#[tokio::test]
async fn webhook_status_does_not_require_a_bearer_token() {
    let (app, _) = test_app(test_config()).await;
    let body = json!({
        "taskId": uuid::Uuid::now_v7().to_string(),
        "status": "running",
        "context": {
            "orgSlug": "acme",
            "userId": "external-runner",
            "conversationId": uuid::Uuid::now_v7().to_string(),
            "agentSlug": "writer",
            "agentType": "external",
            "provider": "openai",
            "model": "gpt-5",
        },
        "message": "step 2 of 3",
        "progress": 40,
    });
    let req = json_request("POST", "/webhooks/status", None, body);
    let (status, payload) = send(app, req).await;
    assert_eq!(status, 200);
    assert_eq!(payload["accepted"], json!(true));
}

#[tokio::test]
async fn webhook_with_unparseable_task_id_is_still_accepted() {
    // §4.8: the webhook is a best-effort sink onto the bus; a task id it
    // can't resolve to a known task shouldn't fail the whole report.
    let (app, _) = test_app(test_config()).await;
    let body = json!({
        "taskId": "not-a-uuid",
        "status": "running",
        "context": {
            "orgSlug": "acme",
            "userId": "external-runner",
            "conversationId": uuid::Uuid::now_v7().to_string(),
            "agentSlug": "writer",
            "agentType": "external",
            "provider": "openai",
            "model": "gpt-5",
        },
    });
    let req = json_request("POST", "/webhooks/status", None, body);
    let (status, payload) = send(app, req).await;
    assert_eq!(status, 200);
    assert_eq!(payload["accepted"], json!(true));
}

#[tokio::test]
async fn observability_history_requires_authentication() {
    let (app, _) = test_app(test_config()).await;
    let req = json_request("GET", "/observability/history?since=2020-01-01T00:00:00Z", None, serde_json::Value::Null);
    let (status, _) = send(app, req).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn observability_history_returns_events_since_the_given_timestamp() {
    let config = test_config();
    let (app, config) = test_app(config).await;
    let token = bearer_token(&config, "u1");
    let req = json_request("GET", "/observability/history?since=2020-01-01T00:00:00Z", Some(&token), serde_json::Value::Null);
    let (status, payload) = send(app, req).await;
    assert_eq!(status, 200);
    assert!(payload["events"].is_array());
}
