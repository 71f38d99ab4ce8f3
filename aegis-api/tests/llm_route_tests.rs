//! `POST /llm/generate` and `POST /llm/usage` (§6) bypass the Dispatcher
//! entirely, so an unconfigured provider surfaces as `LlmError`'s own error
//! kind rather than being folded into `BadRequest` the way a runner failure
//! is at Dispatcher step 7.

mod support;

use serde_json::json;
use support::{bearer_token, json_request, send, test_app, test_config};

fn capsule_json(org: &str, user: &str, agent_slug: &str) -> serde_json::Value {
    json!({
        "orgSlug": org,
        "userId": user,
        "conversationId": uuid::Uuid::now_v7().to_string(),
        "agentSlug": agent_slug,
        "agentType": "context",
        "provider": "openai",
        "model": "gpt-5",
    })
}

/// No provider adapter is registered by default, so a direct `/llm/generate`
/// call fails at the registry lookup before any network I/O, surfacing as
/// the LLM Gateway's own `Unconfigured` kind (503) rather than the
/// Dispatcher's `BadRequest` collapse.
#[tokio::test]
async fn generate_with_no_configured_provider_is_unconfigured() {
    let config = test_config();
    let (app, config) = test_app(config).await;
    let token = bearer_token(&config, "u1");

    let body = json!({
        "systemPrompt": "You are terse.",
        "userPrompt": "hello",
        "context": capsule_json("acme", "u1", "writer"),
        "options": {},
    });
    let req = json_request("POST", "/llm/generate", Some(&token), body);
    let (status, payload) = send(app, req).await;
    assert_eq!(status, 503);
    assert_eq!(payload["kind"], json!("unconfigured"));
}

#[tokio::test]
async fn generate_requires_authentication() {
    let (app, _) = test_app(test_config()).await;
    let body = json!({
        "systemPrompt": "You are terse.",
        "userPrompt": "hello",
        "context": capsule_json("acme", "u1", "writer"),
        "options": {},
    });
    let req = json_request("POST", "/llm/generate", None, body);
    let (status, _) = send(app, req).await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn usage_report_is_accepted() {
    let config = test_config();
    let (app, config) = test_app(config).await;
    let token = bearer_token(&config, "u1");

    let body = json!({
        "capsule": capsule_json("acme", "u1", "writer"),
        "provider": "openai",
        "model": "gpt-5",
        "callerType": "external",
        "callerName": "llm.generate",
        "promptTokens": 120,
        "completionTokens": 48,
        "cachedInputTokens": null,
        "thinkingTokens": null,
        "costCents": 3,
        "latencyMs": 820,
    });
    let req = json_request("POST", "/llm/usage", Some(&token), body);
    let (status, payload) = send(app, req).await;
    assert_eq!(status, 200);
    assert_eq!(payload["accepted"], json!(true));
}
