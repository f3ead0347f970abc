//! FCM provider against a mocked HTTP v1 endpoint

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use unigo_notification_service::auth::StaticTokenSource;
use unigo_notification_service::notification::{
    BatchDispatcher, NotificationPayload, PushRegistration,
};
use unigo_notification_service::push::{
    ErrorClass, FcmProvider, MulticastMessage, PushError, PushProvider, SendResponse,
};
use unigo_notification_service::store::{MemoryStore, TokenRepository};

const SEND_PATH: &str = "/v1/projects/unigo-app/messages:send";

fn provider(server: &MockServer) -> FcmProvider {
    FcmProvider::new(
        &server.uri(),
        "unigo-app",
        Arc::new(StaticTokenSource::new("access-1")),
        4,
        Duration::from_secs(5),
    )
    .unwrap()
}

async fn fail_token(server: &MockServer, token: &str, status: u16, error: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(body_partial_json(json!({"message": {"token": token}})))
        .respond_with(ResponseTemplate::new(status).set_body_json(json!({ "error": error })))
        .with_priority(1)
        .mount(server)
        .await;
}

async fn accept_rest(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(SEND_PATH))
        .and(header("authorization", "Bearer access-1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"name": "projects/unigo-app/messages/0:1"})),
        )
        .mount(server)
        .await;
}

fn unregistered() -> serde_json::Value {
    json!({
        "code": 404,
        "message": "Requested entity was not found.",
        "status": "NOT_FOUND",
        "details": [{
            "@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError",
            "errorCode": "UNREGISTERED"
        }]
    })
}

#[tokio::test]
async fn test_results_follow_token_order() {
    let server = MockServer::start().await;
    fail_token(&server, "t1", 404, unregistered()).await;
    fail_token(
        &server,
        "t3",
        503,
        json!({"code": 503, "message": "The service is currently unavailable.", "status": "UNAVAILABLE"}),
    )
    .await;
    accept_rest(&server).await;

    let tokens: Vec<String> = (0..5).map(|i| format!("t{}", i)).collect();
    let payload = NotificationPayload::builder("Tomorrow: Quiz", "Course CS101").build();

    let batch = provider(&server)
        .send_multicast(MulticastMessage::new(&tokens, &payload))
        .await
        .unwrap();

    assert_eq!(batch.responses.len(), 5);
    assert_eq!(batch.success_count(), 3);
    assert_eq!(batch.responses[1].error_class(), Some(ErrorClass::NotRegistered));
    assert_eq!(batch.responses[3].error_class(), Some(ErrorClass::ServerUnavailable));
    assert!(matches!(batch.responses[0], SendResponse::Delivered { .. }));
}

#[tokio::test]
async fn test_invalid_token_argument_is_classified_as_token_error() {
    let server = MockServer::start().await;
    fail_token(
        &server,
        "garbled",
        400,
        json!({
            "code": 400,
            "message": "The registration token is not a valid FCM registration token",
            "status": "INVALID_ARGUMENT",
            "details": [{"@type": "type.googleapis.com/google.firebase.fcm.v1.FcmError", "errorCode": "INVALID_ARGUMENT"}]
        }),
    )
    .await;
    fail_token(
        &server,
        "bad-payload",
        400,
        json!({"code": 400, "message": "Invalid value at 'message.data'", "status": "INVALID_ARGUMENT"}),
    )
    .await;

    let tokens = vec!["garbled".to_string(), "bad-payload".to_string()];
    let payload = NotificationPayload::builder("t", "b").build();

    let batch = provider(&server)
        .send_multicast(MulticastMessage::new(&tokens, &payload))
        .await
        .unwrap();

    assert_eq!(
        batch.responses[0].error_class(),
        Some(ErrorClass::InvalidRegistrationToken)
    );
    assert_eq!(batch.responses[1].error_class(), Some(ErrorClass::InvalidArgument));
}

#[tokio::test]
async fn test_oversized_multicast_rejected_before_sending() {
    let server = MockServer::start().await;
    let tokens: Vec<String> = (0..501).map(|i| format!("t{}", i)).collect();
    let payload = NotificationPayload::builder("t", "b").build();

    let err = provider(&server)
        .send_multicast(MulticastMessage::new(&tokens, &payload))
        .await
        .unwrap_err();

    assert!(matches!(err, PushError::InvalidRequest(_)));
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
}

#[tokio::test]
async fn test_dispatch_over_fcm_prunes_unregistered_token() {
    let server = MockServer::start().await;
    fail_token(&server, "stale", 404, unregistered()).await;
    accept_rest(&server).await;

    let store = Arc::new(MemoryStore::new());
    store.register_token("u1", "fresh");
    store.register_token("u1", "stale");

    let dispatcher = BatchDispatcher::new(Arc::new(provider(&server)), store.clone());
    let regs = store.tokens_for("u1").await.unwrap();
    let report = dispatcher
        .dispatch(&regs, &NotificationPayload::builder("Grade updated", "MATH201: Midterm").build())
        .await
        .unwrap();

    assert_eq!(report.delivered, 1);
    assert_eq!(report.pruned, 1);
    assert_eq!(
        store.tokens_for("u1").await.unwrap(),
        vec![PushRegistration::new("u1", "fresh")]
    );
}

#[tokio::test]
async fn test_multicast_runs_on_spawned_task() {
    let server = MockServer::start().await;
    accept_rest(&server).await;

    let provider = Arc::new(provider(&server));
    let batch = tokio::spawn(async move {
        let tokens = vec!["a".to_string(), "b".to_string()];
        let payload = NotificationPayload::builder("t", "b").build();
        provider
            .send_multicast(MulticastMessage::new(&tokens, &payload))
            .await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(batch.success_count(), 2);
}
