//! Application layer: shared state for the demo HTTP surface.

pub mod state;

pub use state::AppState;
