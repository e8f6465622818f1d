mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::json;
use std::io::Read;
use std::time::Duration;
use tempfile::NamedTempFile;

use common::{
    OPS_TOKEN, OTHER_ORG_TOKEN, TestContext, VIEWER_TOKEN, body_json, post_test, send,
    test_settings,
};
use rcvtest::notifier::MockDispatcher;
use rcvtest::observability::AuditLogWriter;

fn ad_hoc_webhook() -> serde_json::Value {
    json!({
        "alert": {"labels": {"alertname": "Test"}, "annotations": {}},
        "integration": {
            "type": "webhook",
            "version": "1",
            "settings": {"url": "https://example.com/hook"}
        }
    })
}

#[tokio::test]
async fn test_health_endpoint() {
    let ctx = TestContext::new().await;
    let response = send(
        ctx.router(),
        Request::builder()
            .uri("/v1/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["auth_mode"], "bearer");
    let types = body["integration_types"].as_array().unwrap();
    assert!(types.iter().any(|t| t == "webhook"));
}

#[tokio::test]
async fn test_openapi_and_metrics_are_public() {
    let ctx = TestContext::new().await;

    let response = send(
        ctx.router(),
        Request::builder()
            .uri("/openapi.json")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let doc = body_json(response).await;
    assert!(doc["paths"]["/v1/receivers/test"].is_object());

    let response = send(
        ctx.router(),
        Request::builder()
            .uri("/metrics")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_successful_test_returns_timing() {
    let ctx = TestContext::new().await;
    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), ad_hoc_webhook())).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert!(body["timestamp"].is_string());
    assert!(body["duration"].as_str().unwrap().ends_with('s'));
    assert!(body.get("error").is_none());
    assert_eq!(ctx.dispatcher.call_count(), 1);
}

#[tokio::test]
async fn test_channel_rejection_is_200_with_error() {
    let ctx = TestContext::builder()
        .dispatcher(MockDispatcher::failing_with("webhook returned 500"))
        .build()
        .await;
    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), ad_hoc_webhook())).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["error"], "webhook returned 500");
}

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let ctx = TestContext::new().await;

    let response = send(ctx.router(), post_test(None, ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(body_json(response).await["error"].is_string());

    let response = send(ctx.router(), post_test(Some("nope"), ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(ctx.dispatcher.call_count(), 0);
}

#[tokio::test]
async fn test_caller_without_test_permission_is_forbidden() {
    let ctx = TestContext::new().await;
    let response = send(ctx.router(), post_test(Some(VIEWER_TOKEN), ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(ctx.dispatcher.call_count(), 0);
}

#[tokio::test]
async fn test_unknown_receiver_is_404() {
    let ctx = TestContext::new().await;
    let body = json!({
        "receiver_ref": "missing",
        "integration": {
            "uid": "i-hook",
            "type": "webhook",
            "settings": {"url": "https://example.com/hook", "authorization_scheme": "Bearer"},
            "secureFields": {"authorization_credentials": true}
        }
    });

    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), body)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_stored_secret_is_used() {
    let ctx = TestContext::new().await;
    ctx.seed_ops_receiver().await;
    let body = json!({
        "receiver_ref": "r1",
        "integration": {
            "uid": "i-slack",
            "type": "slack",
            "version": "v1",
            "settings": {"recipient": "#ops"},
            "secureFields": {"token": true}
        }
    });

    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let sent = ctx.dispatcher.sent();
    assert_eq!(sent[0].integration.setting_str("token"), Some("xoxb-stored"));
}

#[tokio::test]
async fn test_bad_requests_are_400() {
    let ctx = TestContext::new().await;

    let bad_label = json!({
        "alert": {"labels": {"bad-name": "x"}},
        "integration": {"type": "webhook", "settings": {"url": "https://example.com/hook"}}
    });
    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), bad_label)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let missing_url = json!({"integration": {"type": "webhook", "settings": {}}});
    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), missing_url)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("settings.url"));

    let response = send(
        ctx.router(),
        Request::builder()
            .method("POST")
            .uri("/v1/receivers/test")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", OPS_TOKEN))
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(ctx.dispatcher.call_count(), 0);
}

#[tokio::test]
async fn test_org_without_dispatcher_is_503() {
    let ctx = TestContext::new().await;
    let response = send(ctx.router(), post_test(Some(OTHER_ORG_TOKEN), ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_deadline_is_504() {
    let ctx = TestContext::builder()
        .settings(test_settings("bearer", 1))
        .dispatcher(MockDispatcher::new().with_latency(Duration::from_secs(3)))
        .build()
        .await;

    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_auth_mode_none_uses_default_org() {
    let ctx = TestContext::builder()
        .settings(test_settings("none", 30))
        .build()
        .await;

    let response = send(ctx.router(), post_test(None, ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(ctx.dispatcher.call_count(), 1);
}

#[tokio::test]
async fn test_audit_entry_written_without_secrets() {
    let file = NamedTempFile::new().unwrap();
    let ctx = TestContext::builder()
        .audit_log(AuditLogWriter::new(file.path()).unwrap())
        .build()
        .await;
    ctx.seed_ops_receiver().await;

    let body = json!({
        "receiver_ref": "r1",
        "integration": {
            "uid": "i-slack",
            "type": "slack",
            "settings": {"recipient": "#ops"},
            "secureFields": {"token": true}
        }
    });
    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), body)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut contents = String::new();
    std::fs::File::open(file.path())
        .unwrap()
        .read_to_string(&mut contents)
        .unwrap();
    let entry: serde_json::Value = serde_json::from_str(contents.lines().next().unwrap()).unwrap();
    assert_eq!(entry["actor_id"], "ops");
    assert_eq!(entry["target_id"], "i-slack");
    assert_eq!(entry["details"]["outcome"], "success");
    assert_eq!(entry["details"]["receiver_ref"], "r1");
    assert!(!contents.contains("xoxb-stored"));
}

#[tokio::test]
async fn test_draining_refuses_new_tests() {
    let ctx = TestContext::new().await;
    ctx.state.trigger_shutdown();

    let response = send(ctx.router(), post_test(Some(OPS_TOKEN), ad_hoc_webhook())).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["error"]
        .as_str()
        .unwrap()
        .contains("shutting down"));
    assert_eq!(ctx.dispatcher.call_count(), 0);

    let response = send(
        ctx.router(),
        Request::builder()
            .uri("/v1/health")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(body_json(response).await["status"], "draining");
}
