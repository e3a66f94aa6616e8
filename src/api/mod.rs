//! The API layer: demo HTTP handlers and routing (§4.O).

pub mod admin;
pub mod handlers;
pub mod router;

pub use admin::{
    AddWebhookRequest, ListWebhooksResponse, WebhookEntryResponse, WebhookRegisteredResponse,
    WebhookRemovedResponse, add_webhook_handler, list_webhooks_handler, remove_webhook_handler,
};
pub use handlers::ApiDoc;
pub use router::{RateLimitConfig, create_router, create_router_with_rate_limit};
