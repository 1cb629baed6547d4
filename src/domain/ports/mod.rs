//! Domain ports: the boundary traits `application` programs against.
//! Concrete implementations live under `adapters`.

pub mod agent_runtime;
pub mod clock;
pub mod store;
pub mod telemetry;

pub use agent_runtime::{AgentRuntime, AgentRuntimeOutput, RuntimeUsage};
pub use clock::{Clock, SystemClock};
pub use store::{Store, StoreResult, TaskFilter};
pub use telemetry::{AlertSeverity, AlertType, Telemetry};
