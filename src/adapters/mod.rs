//! Adapters: concrete implementations of the domain ports.

pub mod sqlite;
pub mod substrates;
pub mod telemetry;
