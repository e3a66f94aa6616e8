//! Single-attempt webhook delivery (§4.J). Callers requiring retries wrap
//! this in [`crate::webhook::queue`]'s manager.

use std::time::{Duration, Instant};

use reqwest::redirect::Policy;

use crate::domain::types::{DeliveryAttemptResult, WebhookPayload, WebhookSubscription};
use crate::webhook::signer;

pub struct WebhookSender {
    http: reqwest::Client,
}

impl Default for WebhookSender {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookSender {
    pub fn new() -> Self {
        Self {
            // No automatic redirects: a redirected POST could silently retarget
            // a signed delivery at an attacker-controlled host.
            http: reqwest::Client::builder().redirect(Policy::none()).build().expect("client builds"),
        }
    }

    pub async fn send(
        &self,
        subscription: &WebhookSubscription,
        payload: &WebhookPayload,
        attempts: u32,
    ) -> DeliveryAttemptResult {
        let body = match serde_json::to_vec(payload) {
            Ok(body) => body,
            Err(error) => {
                return DeliveryAttemptResult {
                    success: false,
                    status_code: None,
                    error: Some(format!("failed to serialize payload: {error}")),
                    response_time_ms: 0,
                    attempts,
                    url: subscription.url.clone(),
                    event: payload.event,
                };
            }
        };

        let signature_header = signer::sign(&subscription.secret, &body);
        let timeout = Duration::from_millis(subscription.per_delivery_timeout_ms);
        let started = Instant::now();

        let mut request = self
            .http
            .post(&subscription.url)
            .timeout(timeout)
            .header(signer::SIGNATURE_HEADER, signature_header)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::CONTENT_LENGTH, body.len())
            .body(body);

        for (name, value) in &subscription.extra_headers {
            request = request.header(name, value);
        }

        let response = request.send().await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        match response {
            Ok(resp) => {
                let status = resp.status();
                DeliveryAttemptResult {
                    success: status.is_success(),
                    status_code: Some(status.as_u16()),
                    error: if status.is_success() { None } else { Some(format!("http {status}")) },
                    response_time_ms,
                    attempts,
                    url: subscription.url.clone(),
                    event: payload.event,
                }
            }
            Err(error) => DeliveryAttemptResult {
                success: false,
                status_code: None,
                error: Some(error.to_string()),
                response_time_ms,
                attempts,
                url: subscription.url.clone(),
                event: payload.event,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{PaymentNotification, WebhookEvent};
    use std::collections::HashMap;
    use uuid::Uuid;
    use wiremock::matchers::{header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn subscription(url: String) -> WebhookSubscription {
        WebhookSubscription {
            id: Uuid::nil(),
            url,
            secret: "secret".to_string(),
            subscribed_events: None,
            retry_policy: None,
            per_delivery_timeout_ms: 2_000,
            extra_headers: HashMap::new(),
        }
    }

    fn payload() -> WebhookPayload {
        WebhookPayload {
            event: WebhookEvent::PaymentConfirmed,
            timestamp_ms: 0,
            payment: PaymentNotification {
                signature: "sig".to_string(),
                amount_smallest: 1_000,
                amount_usd: 0.001,
                payer: "payer".to_string(),
                recipient: "recipient".to_string(),
                resource: None,
                block_time: None,
                slot: None,
            },
            metadata: None,
        }
    }

    #[tokio::test]
    async fn successful_delivery_carries_the_signature_header() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hook"))
            .and(header_exists(signer::SIGNATURE_HEADER))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sender = WebhookSender::new();
        let result = sender.send(&subscription(format!("{}/hook", server.uri())), &payload(), 1).await;
        assert!(result.success);
        assert_eq!(result.status_code, Some(200));
    }

    #[tokio::test]
    async fn non_2xx_status_is_reported_as_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).respond_with(ResponseTemplate::new(500)).mount(&server).await;

        let sender = WebhookSender::new();
        let result = sender.send(&subscription(server.uri()), &payload(), 1).await;
        assert!(!result.success);
        assert_eq!(result.status_code, Some(500));
    }
}
