mod common;

use ach_onboarding::domain::processor::Operation;
use ach_onboarding::interfaces::http::{AppState, create_router};
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use common::{FakeProcessor, orchestrator};
use serde_json::{Value, json};
use std::time::Duration;
use tower::ServiceExt;

fn app(processor: &FakeProcessor) -> Router {
    let (orchestrator, _) = orchestrator(processor);
    create_router(AppState::new(orchestrator))
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    send(app, request).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
    send(app, request).await
}

fn ana() -> Value {
    json!({ "firstName": "Ana", "lastName": "Lee", "email": "ana@example.com" })
}

fn checking() -> Value {
    json!({ "routingNumber": "222222226", "accountNumber": "123456789", "accountType": "checking" })
}

/// Creates Ana Lee and walks her to `Verified`, returning the funding source id.
async fn onboard(app: &Router) -> String {
    let (status, _) = post(app, "/customers", ana()).await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = post(app, "/customers/c1/funding-sources", checking()).await;
    let fs = body["fundingSourceId"].as_str().unwrap().to_string();
    post(app, &format!("/funding-sources/{fs}/trial-deposits"), json!({})).await;
    let (status, _) = post(
        app,
        &format!("/funding-sources/{fs}/verify"),
        json!({ "amount1": "0.03", "amount2": "0.09" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    fs
}

#[tokio::test]
async fn test_health() {
    let app = app(&FakeProcessor::new());
    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_onboarding_over_http() {
    let processor = FakeProcessor::new();
    let app = app(&processor);

    let (status, body) = post(&app, "/customers", ana()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "customerId": "c1" }));

    let (status, body) = post(&app, "/customers/c1/funding-sources", checking()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "fundingSourceId": "fs1" }));

    let (status, body) = post(&app, "/funding-sources/fs1/trial-deposits", json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "pending" }));

    let (status, body) = post(
        &app,
        "/funding-sources/fs1/verify",
        json!({ "amount1": "0.03", "amount2": "0.09" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "verified" }));

    let (status, body) = post(
        &app,
        "/customers/c1/payments",
        json!({ "amount": "42.50", "idempotencyKey": "inv-1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "transferId": "t1", "status": "accepted", "idempotencyKey": "inv-1" })
    );

    let (status, body) = get(&app, "/customers/c1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "TransferInitiated");
    assert_eq!(body["fundingSource"]["accountMask"], "****6789");
    assert!(body["fundingSource"].get("accountNumber").is_none());

    let (status, body) = get(&app, "/funding-sources/fs1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "Verified");
    assert_eq!(body["customerId"], "c1");

    let (_, body) = get(&app, "/customers").await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_fields_are_a_validation_error() {
    let processor = FakeProcessor::new();
    let app = app(&processor);

    let (status, body) = post(&app, "/customers", json!({ "firstName": "Ana" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "ValidationError");
    assert_eq!(processor.total_calls(), 0);
}

#[tokio::test]
async fn test_amount_mismatch_answers_conflict_with_provider_detail() {
    let processor = FakeProcessor::new();
    processor.set_deposit_amounts("0.04", "0.09");
    let app = app(&processor);
    post(&app, "/customers", ana()).await;
    post(&app, "/customers/c1/funding-sources", checking()).await;
    post(&app, "/funding-sources/fs1/trial-deposits", json!({})).await;

    let (status, body) = post(
        &app,
        "/funding-sources/fs1/verify",
        json!({ "amount1": "0.03", "amount2": "0.09" }),
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorKind"], "RequestRejected");
    assert_eq!(body["providerCode"], "InvalidAmount");
    assert_eq!(body["detail"], "Wrong micro-deposit amount(s).");
    let (_, customer) = get(&app, "/customers/c1").await;
    assert_eq!(customer["status"], "DepositsPending");
}

#[tokio::test]
async fn test_malformed_amount_is_rejected_locally() {
    let processor = FakeProcessor::new();
    let app = app(&processor);
    onboard(&app).await;

    let (status, body) = post(&app, "/customers/c1/payments", json!({ "amount": "1.005" })).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errorKind"], "ValidationError");
    assert_eq!(processor.calls(Operation::CreateTransfer), 0);
}

#[tokio::test]
async fn test_payment_before_verification_is_a_precondition_failure() {
    let app = app(&FakeProcessor::new());
    post(&app, "/customers", ana()).await;

    let (status, body) = post(&app, "/customers/c1/payments", json!({ "amount": "5.00" })).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorKind"], "PreconditionFailed");
}

#[tokio::test]
async fn test_repeated_initiation_answers_conflict() {
    let app = app(&FakeProcessor::new());
    post(&app, "/customers", ana()).await;
    post(&app, "/customers/c1/funding-sources", checking()).await;
    post(&app, "/funding-sources/fs1/trial-deposits", json!({})).await;

    let (status, body) = post(&app, "/funding-sources/fs1/trial-deposits", json!({})).await;

    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["errorKind"], "AlreadyInProgress");
}

#[tokio::test]
async fn test_unknown_resources_are_not_found() {
    let processor = FakeProcessor::new();
    let app = app(&processor);

    let (status, body) = get(&app, "/customers/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["errorKind"], "NotFound");

    let (status, _) = post(&app, "/funding-sources/nope/trial-deposits", json!({})).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(processor.total_calls(), 0);
}

#[tokio::test]
async fn test_idempotency_key_header_dedupes_payments() {
    let processor = FakeProcessor::new();
    let app = app(&processor);
    onboard(&app).await;

    let mut transfer_ids = Vec::new();
    for _ in 0..2 {
        let request = Request::builder()
            .method("POST")
            .uri("/customers/c1/payments")
            .header("content-type", "application/json")
            .header("Idempotency-Key", "hdr-1")
            .body(Body::from(json!({ "amount": "3.00" }).to_string()))
            .unwrap();
        let (status, body) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["idempotencyKey"], "hdr-1");
        transfer_ids.push(body["transferId"].clone());
    }

    assert_eq!(transfer_ids[0], transfer_ids[1]);
    assert_eq!(processor.transfers_created(), 1);
}

#[tokio::test]
async fn test_step_completes_after_client_disconnects() {
    let processor = FakeProcessor::new().with_latency(Duration::from_millis(100));
    let app = app(&processor);
    post(&app, "/customers", ana()).await;

    let request = Request::builder()
        .method("POST")
        .uri("/customers/c1/funding-sources")
        .header("content-type", "application/json")
        .body(Body::from(checking().to_string()))
        .unwrap();
    // The client gives up long before the processor answers.
    let abandoned = tokio::time::timeout(Duration::from_millis(20), app.clone().oneshot(request)).await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(processor.calls(Operation::AttachFundingSource), 1);
    let (_, customer) = get(&app, "/customers/c1").await;
    assert_eq!(customer["status"], "BankLinked");
    assert_eq!(customer["fundingSource"]["id"], "fs1");
}
