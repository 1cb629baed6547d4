//! Domain layer: pure entities, invariants, and port traits.
//!
//! Nothing under `domain` depends on `sqlx`, `reqwest`, or `tracing` — those
//! concerns live in `adapters`. `application` depends on `domain` only.

pub mod error;
pub mod models;
pub mod ports;

pub use error::{AgentRuntimeError, ConfigError, DomainError, DomainResult, StoreError, TelemetryError};
