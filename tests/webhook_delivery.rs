//! End-to-end webhook delivery: signing, single-attempt send, and the
//! durable retry path through a manager backed by an in-process queue.

use std::collections::HashMap;

use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use x402_solana_toolkit::domain::types::{
    BackoffKind, PaymentNotification, RetryPolicy, WebhookEvent, WebhookPayload, WebhookSubscription,
};
use x402_solana_toolkit::test_utils::MockWebhookQueue;
use x402_solana_toolkit::webhook::{DeliveryLogger, WebhookManager};
use x402_solana_toolkit::webhook::signer;

fn payload() -> WebhookPayload {
    WebhookPayload {
        event: WebhookEvent::PaymentConfirmed,
        timestamp_ms: 1_700_000_000_000,
        payment: PaymentNotification {
            signature: "sig111".to_string(),
            amount_smallest: 1_000,
            amount_usd: 0.001,
            payer: "Payer1111111111111111111111111111111111111".to_string(),
            recipient: "Dest1111111111111111111111111111111111111".to_string(),
            resource: Some("/protected".to_string()),
            block_time: Some(0),
            slot: Some(1),
        },
        metadata: None,
    }
}

fn subscription(url: String, retry_policy: Option<RetryPolicy>) -> WebhookSubscription {
    WebhookSubscription {
        id: uuid::Uuid::new_v4(),
        url,
        secret: "s3cr3t".to_string(),
        subscribed_events: None,
        retry_policy,
        per_delivery_timeout_ms: 5_000,
        extra_headers: HashMap::new(),
    }
}

#[tokio::test]
async fn successful_delivery_carries_a_verifiable_signature_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/hook"))
        .and(header_exists("X-Webhook-Signature"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let backing = std::sync::Arc::new(MockWebhookQueue::new());
    let logger = std::sync::Arc::new(DeliveryLogger::new(16));
    let manager = WebhookManager::new(backing, logger);

    let sub = subscription(format!("{}/hook", server.uri()), None);
    manager.send(&sub, payload()).await;

    assert_eq!(manager.queue_size().await.unwrap(), 0);
}

#[tokio::test]
async fn failed_delivery_with_a_retry_policy_is_enqueued() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).and(path("/hook")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

    let backing = std::sync::Arc::new(MockWebhookQueue::new());
    let logger = std::sync::Arc::new(DeliveryLogger::new(16));
    let manager = WebhookManager::new(std::sync::Arc::clone(&backing) as _, logger);

    let policy = RetryPolicy { max_attempts: 3, initial_delay_ms: 50, max_delay_ms: 1_000, backoff: BackoffKind::Exponential };
    let sub = subscription(format!("{}/hook", server.uri()), Some(policy));
    manager.send(&sub, payload()).await;

    assert_eq!(manager.queue_size().await.unwrap(), 1);
}

#[test]
fn signature_roundtrip_matches_what_the_sender_would_send() {
    let body = serde_json::to_vec(&payload()).unwrap();
    let header = signer::sign("s3cr3t", &body);
    assert!(signer::verify("s3cr3t", &body, &header));
    assert!(!signer::verify("wrong-secret", &body, &header));
}
