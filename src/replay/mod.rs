//! Replay prevention (§4.E): an at-most-once cache keyed by transaction
//! signature, backed by either Redis (multi-process) or an in-process map.

pub mod memory;
pub mod shared;

pub use memory::InMemoryReplayCache;
pub use shared::RedisReplayCache;
