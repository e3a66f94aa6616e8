//! Test-only mock backings, gated behind the `test-utils` feature.

pub mod mocks;

pub use mocks::{MockConfig, MockReplayCache, MockRpcClient, MockWebhookQueue};
