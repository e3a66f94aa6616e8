//! Webhook delivery: signing (§4.I), single-attempt sending (§4.J), the
//! durable retry queue (§4.K), and the bounded delivery log (§4.L).

pub mod logger;
pub mod queue;
pub mod sender;
pub mod signer;

pub use logger::DeliveryLogger;
pub use queue::{InMemoryWebhookQueue, RedisWebhookQueue, WebhookManager};
pub use sender::WebhookSender;
