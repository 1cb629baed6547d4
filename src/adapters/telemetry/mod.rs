//! `Telemetry` adapter: structured logging plus a live broadcast channel.

mod broadcast_telemetry;

pub use broadcast_telemetry::{TelemetryEvent, TracingTelemetry};
