//! Engine configuration (`fastats.toml`).

pub mod engine;

pub use engine::{EngineConfig, Isolation};
